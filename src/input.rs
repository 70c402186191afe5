//! Opening of plain or BGZF-compressed text inputs, and the parse error
//! shared by the text readers.

use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};

#[derive(Debug)]
pub enum ParseErr {
    IoError(io::Error),
    NotEnoughFields { line: usize, expected: usize },
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    InvalidFormat(String),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::NotEnoughFields { line, expected } => {
                write!(f, "Line {}: expected at least {} fields", line, expected)
            }
            ParseErr::InvalidField { line, field, value } => {
                write!(f, "Line {}: invalid {} '{}'", line, field, value)
            }
            ParseErr::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErr {}

impl From<io::Error> for ParseErr {
    fn from(e: io::Error) -> Self {
        ParseErr::IoError(e)
    }
}

/// Wrap a parse failure of `path` into an I/O error
pub fn parse_error_to_io(path: &str, e: ParseErr) -> io::Error {
    match e {
        ParseErr::IoError(e) => e,
        e => io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path, e),
        ),
    }
}

/// gzip magic, DEFLATE method and the FEXTRA flag
const GZIP_EXTRA_PREFIX: [u8; 4] = [0x1f, 0x8b, 0x08, 0x04];
/// XLEN of 6 followed by the `BC` subfield header with SLEN of 2
const BGZF_EXTRA_FIELD: [u8; 6] = [0x06, 0x00, b'B', b'C', 0x02, 0x00];

/// Whether the stream starts with a BGZF block header. Plain gzip, text
/// and streams shorter than a header are not BGZF. The stream is rewound
/// afterwards.
fn has_bgzf_header<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; 16];
    let found = match reader.read_exact(&mut header) {
        Ok(()) => header[..4] == GZIP_EXTRA_PREFIX && header[10..] == BGZF_EXTRA_FIELD,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    reader.rewind()?;
    Ok(found)
}

/// Open `path` for line-oriented reading. Files ending in `.gz` or `.bgz`
/// must be BGZF-compressed.
pub fn open_input(path: &str) -> io::Result<Box<dyn BufRead>> {
    let mut file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("Failed to open '{}': {}", path, e))
    })?;

    if [".gz", ".bgz"].iter().any(|e| path.ends_with(e)) {
        if !has_bgzf_header(&mut file)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.gz",
                    path, path
                ),
            ));
        }
        debug!("Reading {} through a BGZF reader", path);
        Ok(Box::new(BufReader::new(bgzf::io::Reader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
