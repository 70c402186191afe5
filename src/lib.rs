// lib.rs
pub mod distribute;
pub mod fasta;
pub mod filter;
pub mod input;
pub mod normalize;
pub mod placement;
pub mod placement_io;
pub mod range;
pub mod sequence;
pub mod timer;
pub mod work;
