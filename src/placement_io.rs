//! Tab-separated placement tables
//!
//! One placement per line: `sequence_id  branch_id  likelihood  [lwr]`.
//! Blank lines and lines starting with `#` are skipped. Rows sharing a
//! sequence id are gathered into one query, in order of first appearance.

use crate::input::{open_input, parse_error_to_io, ParseErr};
use crate::placement::{PQuery, Placement, Sample};
use crate::work::Work;
use log::info;
use rustc_hash::FxHashMap;
use std::io::{self, BufRead, Write};

fn parse_field<T: std::str::FromStr>(
    value: &str,
    line: usize,
    field: &'static str,
) -> Result<T, ParseErr> {
    value.trim().parse::<T>().map_err(|_| ParseErr::InvalidField {
        line,
        field,
        value: value.to_string(),
    })
}

fn parse_placement_line(line: &str, line_no: usize) -> Result<(u32, Placement), ParseErr> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(ParseErr::NotEnoughFields {
            line: line_no,
            expected: 3,
        });
    }

    let sequence_id = parse_field::<u32>(fields[0], line_no, "sequence id")?;
    let branch_id = parse_field::<u32>(fields[1], line_no, "branch id")?;
    let likelihood = parse_field::<f64>(fields[2], line_no, "likelihood")?;
    // -inf marks an impossible placement, anything else must be a number
    if likelihood.is_nan() || likelihood == f64::INFINITY {
        return Err(ParseErr::InvalidField {
            line: line_no,
            field: "likelihood",
            value: fields[2].to_string(),
        });
    }

    let mut placement = Placement::new(branch_id, likelihood);
    if let Some(lwr) = fields.get(3) {
        placement.set_lwr(parse_field::<f64>(lwr, line_no, "LWR")?);
    }

    Ok((sequence_id, placement))
}

pub fn parse_placements<R: BufRead>(reader: R) -> Result<Sample, ParseErr> {
    let mut pqueries: Vec<PQuery> = Vec::new();
    let mut index: FxHashMap<u32, usize> = FxHashMap::default();

    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (sequence_id, placement) = parse_placement_line(trimmed, i + 1)?;
        let slot = *index.entry(sequence_id).or_insert_with(|| {
            pqueries.push(PQuery::new(sequence_id));
            pqueries.len() - 1
        });
        pqueries[slot].push(placement);
    }

    Ok(pqueries.into_iter().collect())
}

/// Read a placement table, plain or BGZF-compressed
pub fn read_placement_file(path: &str) -> io::Result<Sample> {
    let reader = open_input(path)?;
    let sample = parse_placements(reader).map_err(|e| parse_error_to_io(path, e))?;
    info!(
        "Read {} placements for {} queries from {}",
        sample.placement_count(),
        sample.len(),
        path
    );
    Ok(sample)
}

pub fn write_placements<W: Write>(writer: &mut W, sample: &Sample) -> io::Result<()> {
    for pq in sample {
        for p in pq {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                pq.sequence_id(),
                p.branch_id(),
                p.likelihood(),
                p.lwr()
            )?;
        }
    }
    Ok(())
}

/// One `sequence_id  entropy` row per normalized query
pub fn write_entropies<W: Write>(writer: &mut W, sample: &Sample) -> io::Result<()> {
    for pq in sample {
        if let Some(entropy) = pq.entropy() {
            writeln!(writer, "{}\t{}", pq.sequence_id(), entropy)?;
        }
    }
    Ok(())
}

/// One `branch_id  sequence_id` row per work item
pub fn write_work<W: Write>(writer: &mut W, work: &Work) -> io::Result<()> {
    for (branch_id, sequence_id) in work.iter() {
        writeln!(writer, "{}\t{}", branch_id, sequence_id)?;
    }
    Ok(())
}
