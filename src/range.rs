use serde::{Deserialize, Serialize};

const GAP: u8 = b'-';

/// Half-open region `[begin, begin + span)` of a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub begin: usize,
    pub span: usize,
}

impl Range {
    pub fn new(begin: usize, span: usize) -> Self {
        Self { begin, span }
    }

    /// First position past the range
    pub fn end(&self) -> usize {
        self.begin + self.span
    }

    /// Smallest range containing both `self` and `other`
    pub fn cover(&self, other: &Range) -> Range {
        let begin = self.begin.min(other.begin);
        Range::new(begin, self.end().max(other.end()) - begin)
    }
}

/// Combine two valid ranges into the earliest begin and the widest span.
///
/// The result is not a covering range: the spans are compared, not the end
/// positions, so `superset((0, 2), (5, 2))` is `(0, 2)`. Use
/// [`Range::cover`] for the true union.
pub fn superset(a: Range, b: Range) -> Range {
    Range::new(a.begin.min(b.begin), a.span.max(b.span))
}

/// Region of `sequence` outside of which there are only gap characters.
///
/// ```text
/// -  -  -  A  T  A  G  C  T  -  -
/// 0  1  2  3  4  5  6  7  8  9 10   => (3, 6)
/// ```
///
/// A sequence made only of gaps yields an empty range starting at its end.
pub fn get_valid_range(sequence: &str) -> Range {
    let bytes = sequence.as_bytes();
    let Some(lower) = bytes.iter().position(|&c| c != GAP) else {
        return Range::new(bytes.len(), 0);
    };
    let upper = bytes
        .iter()
        .rposition(|&c| c != GAP)
        .map_or(bytes.len(), |i| i + 1);

    Range::new(lower, upper - lower)
}
