use crate::placement::Sample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Branch-bucketed unit of work: for every branch, the ids of the query
/// sequences to evaluate against it.
///
/// Buckets are keyed by branch id, so iterating a `Work` always visits all
/// pairs of one branch before moving on to the next branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    buckets: BTreeMap<u32, Vec<u32>>,
}

impl Work {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pair per placement in `sample`
    pub fn from_sample(sample: &Sample) -> Self {
        let mut work = Self::new();
        for pq in sample {
            for p in pq {
                work.add(p.branch_id(), pq.sequence_id());
            }
        }
        work
    }

    pub fn add(&mut self, branch_id: u32, sequence_id: u32) {
        self.bucket_mut(branch_id).push(sequence_id);
    }

    pub fn bucket(&self, branch_id: u32) -> Option<&[u32]> {
        self.buckets.get(&branch_id).map(Vec::as_slice)
    }

    /// Bucket of `branch_id`, created empty if absent
    pub fn bucket_mut(&mut self, branch_id: u32) -> &mut Vec<u32> {
        self.buckets.entry(branch_id).or_default()
    }

    pub fn branches(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.keys().copied()
    }

    /// Number of (branch, sequence) pairs
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// (branch_id, sequence_id) pairs, grouped by ascending branch id
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.buckets
            .iter()
            .flat_map(|(&branch_id, seqs)| seqs.iter().map(move |&seq_id| (branch_id, seq_id)))
    }
}

impl FromIterator<(u32, u32)> for Work {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        let mut work = Self::new();
        for (branch_id, sequence_id) in iter {
            work.add(branch_id, sequence_id);
        }
        work
    }
}
