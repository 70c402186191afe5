//! FASTA reading and writing of alignment rows

use crate::input::{open_input, parse_error_to_io, ParseErr};
use crate::sequence::{Msa, Sequence};
use log::{info, warn};
use std::io::{self, BufRead, Write};

/// Separator placed between the headers of a collapsed row
pub const HEADER_SEPARATOR: char = ';';

const LINE_WIDTH: usize = 80;

pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Msa, ParseErr> {
    let mut msa = Msa::new();
    let mut current: Option<(String, String)> = None;

    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, symbols)) = current.take() {
                msa.push(Sequence::new(id, symbols));
            }

            // Everything after the first whitespace is a description
            let id = header.split_whitespace().next().unwrap_or("");
            if id.is_empty() {
                return Err(ParseErr::InvalidFormat(format!(
                    "Empty sequence identifier at line {}",
                    i + 1
                )));
            }
            current = Some((id.to_string(), String::new()));
        } else {
            let Some((_, symbols)) = current.as_mut() else {
                return Err(ParseErr::InvalidFormat(format!(
                    "Sequence without header at line {}",
                    i + 1
                )));
            };
            symbols.extend(line.chars().filter(|c| !c.is_ascii_whitespace()));
        }
    }

    if let Some((id, symbols)) = current {
        msa.push(Sequence::new(id, symbols));
    }

    Ok(msa)
}

/// Read an alignment, plain or BGZF-compressed
pub fn read_fasta_file(path: &str) -> io::Result<Msa> {
    let reader = open_input(path)?;
    let msa = parse_fasta(reader).map_err(|e| parse_error_to_io(path, e))?;

    let width = msa.width();
    if msa.iter().any(|s| s.len() != width) {
        warn!("Rows of {} differ in length, input may not be aligned", path);
    }
    info!("Read {} sequences from {}", msa.len(), path);
    Ok(msa)
}

/// Write one record per row. A row carrying several headers is written
/// under all of them, joined by [`HEADER_SEPARATOR`].
pub fn write_fasta<W: Write>(writer: &mut W, msa: &Msa) -> io::Result<()> {
    let mut header = String::new();
    for sequence in msa {
        header.clear();
        for (i, h) in sequence.headers().iter().enumerate() {
            if i > 0 {
                header.push(HEADER_SEPARATOR);
            }
            header.push_str(h);
        }
        writeln!(writer, ">{}", header)?;

        for line in sequence.sequence().as_bytes().chunks(LINE_WIDTH) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}
