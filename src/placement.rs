//! Placement data model
//!
//! A [`Sample`] holds one [`PQuery`] per query sequence, and each query holds
//! the candidate [`Placement`]s reported by the placement engine for it.

use serde::{Deserialize, Serialize};

/// One candidate attachment of a query sequence to a reference tree edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    branch_id: u32,
    likelihood: f64,
    lwr: f64,
}

impl Placement {
    /// Create a placement with a raw log-likelihood. The LWR stays at `0.0`
    /// until the owning sample is normalized.
    pub fn new(branch_id: u32, likelihood: f64) -> Self {
        Self {
            branch_id,
            likelihood,
            lwr: 0.0,
        }
    }

    pub fn branch_id(&self) -> u32 {
        self.branch_id
    }

    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    /// Likelihood weight ratio
    pub fn lwr(&self) -> f64 {
        self.lwr
    }

    pub fn set_lwr(&mut self, lwr: f64) {
        self.lwr = lwr;
    }
}

/// Candidate placements of a single query sequence.
///
/// The sequence id is fixed at construction. `entropy` is written by the
/// normalizer and is not updated by later edits of the placement list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PQuery {
    sequence_id: u32,
    placements: Vec<Placement>,
    entropy: Option<f64>,
}

impl PQuery {
    pub fn new(sequence_id: u32) -> Self {
        Self {
            sequence_id,
            placements: Vec::new(),
            entropy: None,
        }
    }

    pub fn with_placements(sequence_id: u32, placements: Vec<Placement>) -> Self {
        Self {
            sequence_id,
            placements,
            entropy: None,
        }
    }

    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    pub fn push(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Placement> {
        self.placements.iter()
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placements_mut(&mut self) -> &mut Vec<Placement> {
        &mut self.placements
    }

    /// Shannon entropy (nats) of the LWR distribution at normalization time
    pub fn entropy(&self) -> Option<f64> {
        self.entropy
    }

    pub fn set_entropy(&mut self, entropy: f64) {
        self.entropy = Some(entropy);
    }

    /// Sort placements by descending LWR. Ties keep their current order.
    pub fn sort_by_lwr(&mut self) {
        self.placements.sort_by(|a, b| b.lwr.total_cmp(&a.lwr));
    }

    /// Drop every placement past the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.placements.truncate(len);
    }
}

impl<'a> IntoIterator for &'a PQuery {
    type Item = &'a Placement;
    type IntoIter = std::slice::Iter<'a, Placement>;

    fn into_iter(self) -> Self::IntoIter {
        self.placements.iter()
    }
}

/// Ordered collection of queries. Sequence ids are only guaranteed unique in
/// a sample that was built through [`crate::distribute::Merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pqueries: Vec<PQuery>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pquery: PQuery) {
        self.pqueries.push(pquery);
    }

    pub fn len(&self) -> usize {
        self.pqueries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pqueries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PQuery> {
        self.pqueries.iter()
    }

    pub fn pqueries(&self) -> &[PQuery] {
        &self.pqueries
    }

    pub fn pqueries_mut(&mut self) -> &mut [PQuery] {
        &mut self.pqueries
    }

    /// Total number of placements over all queries
    pub fn placement_count(&self) -> usize {
        self.pqueries.iter().map(PQuery::len).sum()
    }
}

impl FromIterator<PQuery> for Sample {
    fn from_iter<I: IntoIterator<Item = PQuery>>(iter: I) -> Self {
        Self {
            pqueries: iter.into_iter().collect(),
        }
    }
}

impl Extend<PQuery> for Sample {
    fn extend<I: IntoIterator<Item = PQuery>>(&mut self, iter: I) {
        self.pqueries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Sample {
    type Item = &'a PQuery;
    type IntoIter = std::slice::Iter<'a, PQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.pqueries.iter()
    }
}

impl IntoIterator for Sample {
    type Item = PQuery;
    type IntoIter = std::vec::IntoIter<PQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.pqueries.into_iter()
    }
}
