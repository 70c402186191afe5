use clap::Parser;
use log::{info, warn};
use pqkit::distribute::{decode_part, encode_part, merge_all, Split};
use pqkit::fasta::{read_fasta_file, write_fasta};
use pqkit::filter::{
    discard_bottom_x_percent, discard_by_accumulated_threshold, discard_by_support_threshold,
    FilterBounds,
};
use pqkit::normalize::compute_and_set_lwr;
use pqkit::placement::Sample;
use pqkit::placement_io::{read_placement_file, write_entropies, write_placements, write_work};
use pqkit::sequence::find_collapse_equal_sequences;
use pqkit::timer::Timer;
use pqkit::work::Work;
use rayon::ThreadPoolBuilder;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroUsize;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = default_threads())]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

fn default_threads() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

/// Post-processing of phylogenetic placement results.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Normalize placement likelihoods into LWRs and optionally prune each query
    Process {
        #[clap(flatten)]
        common: CommonOpts,

        /// Placement table (sequence_id, branch_id, likelihood), plain or BGZF-compressed
        #[clap(short = 'i', long, value_parser)]
        input: String,

        /// Output placement table (stdout if not given)
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,

        /// Write the per-query entropy to this file
        #[clap(long, value_parser)]
        entropy: Option<String>,

        /// Fraction in [0,1] of each query's lowest-LWR placements to discard (0.25 drops the bottom quarter)
        #[clap(long, value_parser)]
        bottom_fraction: Option<f64>,

        /// Discard placements with an LWR at or below this threshold
        #[clap(long, value_parser)]
        support_threshold: Option<f64>,

        /// Keep the best placements until their accumulated LWR reaches this threshold
        #[clap(long, value_parser)]
        accumulated_threshold: Option<f64>,

        /// Minimum number of placements kept per query by the threshold filters
        #[clap(long, value_parser, default_value_t = 1)]
        min: usize,

        /// Maximum number of placements kept per query by the threshold filters
        #[clap(long, value_parser)]
        max: Option<usize>,
    },
    /// Collapse identical sequences of an alignment into one record
    Dedup {
        #[clap(flatten)]
        common: CommonOpts,

        /// Alignment in FASTA format, plain or BGZF-compressed
        #[clap(short = 'i', long, value_parser)]
        input: String,

        /// Output FASTA (stdout if not given)
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,
    },
    /// Split a placement table into parts for independent workers
    Split {
        #[clap(flatten)]
        common: CommonOpts,

        /// Placement table, plain or BGZF-compressed
        #[clap(short = 'i', long, value_parser)]
        input: String,

        /// Number of parts
        #[clap(short = 'n', long, value_parser)]
        num_parts: NonZeroUsize,

        /// Parts are written to <prefix>.<i>.part
        #[clap(short = 'p', long, value_parser)]
        prefix: String,

        /// Split branch-bucketed work items instead of queries
        #[clap(short = 'w', long, action)]
        work: bool,
    },
    /// Merge parts produced by `split` (or by workers) back together
    Merge {
        #[clap(flatten)]
        common: CommonOpts,

        /// Part files, merged in the given order
        #[clap(required = true)]
        parts: Vec<String>,

        /// Output table (stdout if not given)
        #[clap(short = 'o', long, value_parser)]
        output: Option<String>,

        /// Parts hold work items instead of queries
        #[clap(short = 'w', long, action)]
        work: bool,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Process {
            common,
            input,
            output,
            entropy,
            bottom_fraction,
            support_threshold,
            accumulated_threshold,
            min,
            max,
        } => {
            initialize(&common)?;
            let bounds = FilterBounds::new(min, max.unwrap_or(usize::MAX));

            let mut sample = read_placement_file(&input)?;
            process_sample(
                &mut sample,
                bottom_fraction,
                support_threshold,
                accumulated_threshold,
                bounds,
            )?;

            let mut writer = open_output(output.as_deref())?;
            write_placements(&mut writer, &sample)?;
            writer.flush()?;

            if let Some(entropy_file) = entropy {
                let mut writer = open_output(Some(&entropy_file))?;
                write_entropies(&mut writer, &sample)?;
                writer.flush()?;
            }
        }
        Args::Dedup {
            common,
            input,
            output,
        } => {
            initialize(&common)?;

            let mut msa = read_fasta_file(&input)?;
            match msa.valid_columns() {
                Some(columns) => info!(
                    "Alignment data spans columns {}..{} of {}",
                    columns.begin,
                    columns.end(),
                    msa.width()
                ),
                None => warn!("Alignment {} holds no non-gap symbols", input),
            }
            find_collapse_equal_sequences(&mut msa);

            let mut writer = open_output(output.as_deref())?;
            write_fasta(&mut writer, &msa)?;
            writer.flush()?;
        }
        Args::Split {
            common,
            input,
            num_parts,
            prefix,
            work,
        } => {
            initialize(&common)?;

            let sample = read_placement_file(&input)?;
            let encoded = if work {
                Work::from_sample(&sample)
                    .split(num_parts)
                    .iter()
                    .map(encode_part)
                    .collect::<io::Result<Vec<_>>>()?
            } else {
                sample
                    .split(num_parts)
                    .iter()
                    .map(encode_part)
                    .collect::<io::Result<Vec<_>>>()?
            };

            for (i, bytes) in encoded.iter().enumerate() {
                let part_file = format!("{}.{}.part", prefix, i);
                std::fs::write(&part_file, bytes)?;
            }
            info!("Wrote {} parts with prefix {}", encoded.len(), prefix);
        }
        Args::Merge {
            common,
            parts,
            output,
            work,
        } => {
            initialize(&common)?;

            let mut writer = open_output(output.as_deref())?;
            if work {
                let decoded: Vec<Work> = read_parts(&parts)?;
                let mut merged = Work::new();
                merge_all(&mut merged, &decoded);
                info!("Merged {} work items from {} parts", merged.len(), parts.len());
                write_work(&mut writer, &merged)?;
            } else {
                let decoded: Vec<Sample> = read_parts(&parts)?;
                let mut merged = Sample::new();
                merge_all(&mut merged, &decoded);
                info!("Merged {} queries from {} parts", merged.len(), parts.len());
                write_placements(&mut writer, &merged)?;
            }
            writer.flush()?;
        }
    }

    Ok(())
}

/// Initialize logging and the thread pool based on common options
fn initialize(common: &CommonOpts) -> io::Result<()> {
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {e}")))
}

/// Normalize, then apply the requested filters in a fixed order: bottom
/// fraction, support threshold, accumulated threshold.
fn process_sample(
    sample: &mut Sample,
    bottom_fraction: Option<f64>,
    support_threshold: Option<f64>,
    accumulated_threshold: Option<f64>,
    bounds: FilterBounds,
) -> io::Result<()> {
    let mut normalize_timer = Timer::new();
    normalize_timer.start();
    compute_and_set_lwr(sample);
    normalize_timer.stop();
    info!("Normalized {} queries in {:.0} us", sample.len(), normalize_timer.average());

    let mut filter_timer = Timer::new();
    filter_timer.start();
    if let Some(x) = bottom_fraction {
        discard_bottom_x_percent(sample, x)?;
    }
    if let Some(thresh) = support_threshold {
        discard_by_support_threshold(sample, thresh, bounds)?;
    }
    if let Some(thresh) = accumulated_threshold {
        discard_by_accumulated_threshold(sample, thresh, bounds)?;
    }
    filter_timer.stop();

    if sample.iter().any(|pq| pq.is_empty()) {
        warn!("Some queries have no placements left after filtering");
    }
    info!(
        "Kept {} placements after filtering in {:.0} us",
        sample.placement_count(),
        filter_timer.average()
    );
    Ok(())
}

fn read_parts<T: DeserializeOwned>(paths: &[String]) -> io::Result<Vec<T>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|e| {
                io::Error::new(e.kind(), format!("Failed to read part '{}': {}", path, e))
            })?;
            decode_part(&bytes)
        })
        .collect()
}

fn open_output(path: Option<&str>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                io::Error::new(e.kind(), format!("Failed to create '{}': {}", path, e))
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
