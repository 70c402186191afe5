use crate::range::{get_valid_range, Range};
use log::{debug, info};
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};
use std::hash::BuildHasher;

/// One alignment row. A row that absorbed identical rows carries all of
/// their headers.
///
/// Two sequences compare equal when their symbols match, whatever their
/// headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    headers: Vec<String>,
    sequence: String,
}

impl Sequence {
    pub fn new(header: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            headers: vec![header.into()],
            sequence: sequence.into(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// First header, the one the row was loaded with
    pub fn header(&self) -> &str {
        self.headers.first().map_or("", String::as_str)
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn valid_range(&self) -> Range {
        get_valid_range(&self.sequence)
    }

    /// Take over the headers of `other`, dropping its symbols
    pub fn merge_headers(&mut self, other: Sequence) {
        self.headers.extend(other.headers);
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for Sequence {}

/// Multiple sequence alignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Msa {
    sequences: Vec<Sequence>,
}

impl Msa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sequence: Sequence) {
        self.sequences.push(sequence);
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sequence> {
        self.sequences.iter()
    }

    /// Alignment width, taken from the first row
    pub fn width(&self) -> usize {
        self.sequences.first().map_or(0, Sequence::len)
    }

    /// Columns between the first and the last non-gap symbol of any row,
    /// `None` if every row is made of gaps
    pub fn valid_columns(&self) -> Option<Range> {
        self.sequences
            .iter()
            .map(Sequence::valid_range)
            .filter(|range| range.span > 0)
            .reduce(|a, b| a.cover(&b))
    }
}

impl FromIterator<Sequence> for Msa {
    fn from_iter<I: IntoIterator<Item = Sequence>>(iter: I) -> Self {
        Self {
            sequences: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Msa {
    type Item = &'a Sequence;
    type IntoIter = std::slice::Iter<'a, Sequence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sequences.iter()
    }
}

/// Collapse rows with identical symbols into a single row.
///
/// The surviving row sits where the symbols first occurred and lists the
/// headers of every identical row in input order. Surviving rows keep their
/// relative order.
pub fn find_collapse_equal_sequences(msa: &mut Msa) {
    let before = msa.len();

    // symbol hash -> indices into `kept` with that hash
    let mut seen: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
    let mut kept: Vec<Sequence> = Vec::with_capacity(before);

    for sequence in msa.sequences.drain(..) {
        let hash = FxBuildHasher.hash_one(sequence.sequence.as_bytes());
        let candidates = seen.entry(hash).or_default();
        match candidates.iter().copied().find(|&i| kept[i] == sequence) {
            Some(target) => kept[target].merge_headers(sequence),
            None => {
                candidates.push(kept.len());
                kept.push(sequence);
            }
        }
    }

    msa.sequences = kept;

    let collapsed = before - msa.len();
    if collapsed > 0 {
        info!(
            "Collapsed {} duplicate sequences, {} unique sequences remain",
            collapsed,
            msa.len()
        );
    } else {
        debug!("No duplicate sequences among {} rows", before);
    }
}
