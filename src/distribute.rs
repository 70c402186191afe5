//! Split and merge of collections that are distributed over workers
//!
//! A collection is cut into a fixed number of parts with [`Split`], each part
//! is handed to a worker through some external transport, and results are
//! folded back together with [`Merge`]. Merging is associative, so parts can
//! be aggregated linearly or along a reduction tree.

use crate::placement::Sample;
use crate::timer::Timer;
use crate::work::Work;
use log::debug;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::num::NonZeroUsize;

pub trait Split: Sized {
    /// Cut `self` into exactly `num_parts` ordered parts. Parts may be empty
    /// when there are fewer items than parts.
    fn split(&self, num_parts: NonZeroUsize) -> Vec<Self>;
}

pub trait Merge {
    /// Fold the content of `other` into `self`
    fn merge(&mut self, other: &Self);
}

/// Merge every part into `dest`, in order
pub fn merge_all<T: Merge>(dest: &mut T, parts: &[T]) {
    for part in parts {
        dest.merge(part);
    }
}

/// Contiguous chunks of `ceil(len / num_parts)` items, padded with empty
/// chunks up to `num_parts`.
fn split_chunks<T: Clone>(items: &[T], num_parts: NonZeroUsize) -> Vec<Vec<T>> {
    let num_parts = num_parts.get();
    let chunk_size = items.len().div_ceil(num_parts).max(1);

    let mut parts: Vec<Vec<T>> = items.chunks(chunk_size).map(<[T]>::to_vec).collect();
    parts.resize_with(num_parts, Vec::new);
    parts
}

impl<T: Clone> Split for Vec<T> {
    fn split(&self, num_parts: NonZeroUsize) -> Vec<Self> {
        split_chunks(self, num_parts)
    }
}

impl<T: Clone> Merge for Vec<T> {
    fn merge(&mut self, other: &Self) {
        self.extend_from_slice(other);
    }
}

impl Split for Sample {
    fn split(&self, num_parts: NonZeroUsize) -> Vec<Self> {
        split_chunks(self.pqueries(), num_parts)
            .into_iter()
            .map(Sample::from_iter)
            .collect()
    }
}

impl Merge for Sample {
    /// Placements of a source query are appended to the first destination
    /// query with the same sequence id. Queries the destination lacks are
    /// appended at its end.
    fn merge(&mut self, other: &Self) {
        let mut index: FxHashMap<u32, usize> = FxHashMap::default();
        for (i, pq) in self.iter().enumerate() {
            index.entry(pq.sequence_id()).or_insert(i);
        }

        for pq in other {
            match index.get(&pq.sequence_id()) {
                Some(&i) => self.pqueries_mut()[i]
                    .placements_mut()
                    .extend_from_slice(pq.placements()),
                None => {
                    index.insert(pq.sequence_id(), self.len());
                    self.push(pq.clone());
                }
            }
        }
    }
}

impl Split for Work {
    /// Pairs are dealt out in iteration order, `ext / num_parts` per part,
    /// where `ext` is the pair count rounded up past the next multiple of
    /// `num_parts`. The last parts may be smaller or empty.
    fn split(&self, num_parts: NonZeroUsize) -> Vec<Self> {
        let num_parts = num_parts.get();
        let size = self.len();
        let ext = size + (num_parts - size % num_parts);
        let chunk = ext / num_parts;

        let mut parts = vec![Work::new(); num_parts];
        for (i, (branch_id, sequence_id)) in self.iter().enumerate() {
            parts[i / chunk].add(branch_id, sequence_id);
        }

        debug!(
            "Split {} work items into {} parts of at most {}",
            size, num_parts, chunk
        );
        parts
    }
}

impl Merge for Work {
    fn merge(&mut self, other: &Self) {
        for branch_id in other.branches() {
            if let Some(sequences) = other.bucket(branch_id) {
                self.bucket_mut(branch_id).extend_from_slice(sequences);
            }
        }
    }
}

impl Merge for Timer {
    fn merge(&mut self, other: &Self) {
        self.extend_samples(other.samples());
    }
}

/// Encode a part for transmission to another worker
pub fn encode_part<T: Serialize>(part: &T) -> io::Result<Vec<u8>> {
    bincode::serde::encode_to_vec(part, bincode::config::standard()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to encode part: {e}"),
        )
    })
}

/// Decode a part produced by [`encode_part`]
pub fn decode_part<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    let (part, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to decode part: {e}"),
            )
        })?;
    Ok(part)
}
