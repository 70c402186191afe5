//! Pruning of candidate placements
//!
//! Every filter checks its parameters before it touches the sample, so a
//! call either fails without side effects or runs over every query. Queries
//! are pruned independently on the rayon pool; sorting and partitioning are
//! stable, which keeps the output reproducible when LWRs tie.

use crate::placement::{PQuery, Placement, Sample};
use log::debug;
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A probability or threshold outside of [0,1] (or NaN)
    OutOfUnitInterval { name: &'static str, value: f64 },
    MinBelowOne,
    MinAboveMax { min: usize, max: usize },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::OutOfUnitInterval { name, value } => {
                write!(f, "{name} must lie within [0,1], got {value}")
            }
            FilterError::MinBelowOne => {
                write!(f, "Minimum number of retained placements must be at least 1")
            }
            FilterError::MinAboveMax { min, max } => write!(
                f,
                "Minimum number of retained placements ({min}) exceeds the maximum ({max})"
            ),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for std::io::Error {
    fn from(e: FilterError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    }
}

/// Floor and ceiling on the number of placements a threshold filter keeps
/// per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for FilterBounds {
    fn default() -> Self {
        Self {
            min: 1,
            max: usize::MAX,
        }
    }
}

impl FilterBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<(), FilterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FilterError::OutOfUnitInterval { name, value })
    }
}

/// Keep the best `ceil((1 - x) * n)` placements of every query.
pub fn discard_bottom_x_percent(sample: &mut Sample, x: f64) -> Result<(), FilterError> {
    check_unit_interval("x", x)?;

    sample.pqueries_mut().par_iter_mut().for_each(|pq| {
        let num_keep = ((1.0 - x) * pq.len() as f64).ceil() as usize;
        pq.sort_by_lwr();
        pq.truncate(num_keep);
    });

    debug!("Discarded bottom {:.1}% of placements", x * 100.0);
    Ok(())
}

/// Keep the placements whose LWR is strictly above `thresh`, padded up to
/// `bounds.min` from the remaining ones and cut down to `bounds.max`.
///
/// Placements above the threshold keep their relative order and come first,
/// followed by the rest in their original order.
pub fn discard_by_support_threshold(
    sample: &mut Sample,
    thresh: f64,
    bounds: FilterBounds,
) -> Result<(), FilterError> {
    check_unit_interval("thresh", thresh)?;
    if bounds.min < 1 {
        return Err(FilterError::MinBelowOne);
    }

    sample.pqueries_mut().par_iter_mut().for_each(|pq| {
        let above = stable_partition(pq, |p| p.lwr() > thresh);
        let num_keep = if above < bounds.min {
            bounds.min
        } else if above > bounds.max {
            bounds.max
        } else {
            above
        };
        pq.truncate(num_keep);
    });

    debug!("Discarded placements with LWR <= {thresh}");
    Ok(())
}

/// Keep the best placements until their accumulated LWR reaches `thresh`,
/// within `bounds`.
///
/// The placement that makes the sum cross the threshold is kept. The walk
/// also stops once `bounds.max` placements are taken; if fewer than
/// `bounds.min` were taken, the next best ones are added to reach it.
pub fn discard_by_accumulated_threshold(
    sample: &mut Sample,
    thresh: f64,
    bounds: FilterBounds,
) -> Result<(), FilterError> {
    check_unit_interval("thresh", thresh)?;
    if bounds.min < 1 {
        return Err(FilterError::MinBelowOne);
    }
    if bounds.min > bounds.max {
        return Err(FilterError::MinAboveMax {
            min: bounds.min,
            max: bounds.max,
        });
    }

    sample.pqueries_mut().par_iter_mut().for_each(|pq| {
        pq.sort_by_lwr();

        let mut sum = 0.0;
        let mut num_keep = 0;
        for p in pq.iter() {
            if sum >= thresh || num_keep >= bounds.max {
                break;
            }
            sum += p.lwr();
            num_keep += 1;
        }

        pq.truncate(num_keep.max(bounds.min));
    });

    debug!("Discarded placements past accumulated LWR {thresh}");
    Ok(())
}

/// Reorder so that placements matching `pred` come first, both groups in
/// their original order. Returns the size of the matching group.
fn stable_partition<F>(pq: &mut PQuery, pred: F) -> usize
where
    F: Fn(&Placement) -> bool,
{
    let (mut front, back): (Vec<Placement>, Vec<Placement>) =
        pq.placements_mut().drain(..).partition(|p| pred(p));
    let count = front.len();
    front.extend(back);
    *pq.placements_mut() = front;
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::compute_and_set_lwr;

    /// Build a sample whose placements carry the given LWRs directly.
    /// Branch ids number the placements in input order.
    fn sample_with_lwrs(queries: &[&[f64]]) -> Sample {
        queries
            .iter()
            .enumerate()
            .map(|(seq_id, lwrs)| {
                let placements = lwrs
                    .iter()
                    .enumerate()
                    .map(|(branch, &lwr)| {
                        let mut p = Placement::new(branch as u32, lwr.ln());
                        p.set_lwr(lwr);
                        p
                    })
                    .collect();
                PQuery::with_placements(seq_id as u32, placements)
            })
            .collect()
    }

    fn branches(pq: &PQuery) -> Vec<u32> {
        pq.iter().map(Placement::branch_id).collect()
    }

    #[test]
    fn test_bottom_x_percent_worked_example() {
        let mut sample: Sample = vec![PQuery::with_placements(
            0,
            vec![
                Placement::new(10, -2.0),
                Placement::new(11, -1.0),
                Placement::new(12, -3.0),
            ],
        )]
        .into_iter()
        .collect();
        compute_and_set_lwr(&mut sample);

        discard_bottom_x_percent(&mut sample, 0.5).unwrap();

        let pq = &sample.pqueries()[0];
        assert_eq!(branches(pq), vec![11, 10]);
    }

    #[test]
    fn test_bottom_x_percent_extremes() {
        let lwrs: &[&[f64]] = &[&[0.5, 0.3, 0.2], &[1.0], &[]];

        let mut sample = sample_with_lwrs(lwrs);
        discard_bottom_x_percent(&mut sample, 0.0).unwrap();
        assert_eq!(sample.placement_count(), 4);

        discard_bottom_x_percent(&mut sample, 1.0).unwrap();
        assert!(sample.iter().all(PQuery::is_empty));
    }

    #[test]
    fn test_bottom_x_percent_rejects_invalid() {
        let mut sample = sample_with_lwrs(&[&[0.6, 0.4]]);
        let before = sample.clone();

        for x in [-0.1, 1.1, f64::NAN] {
            assert!(matches!(
                discard_bottom_x_percent(&mut sample, x),
                Err(FilterError::OutOfUnitInterval { name: "x", .. })
            ));
        }
        assert_eq!(sample, before);
    }

    #[test]
    fn test_support_threshold_basic() {
        let mut sample = sample_with_lwrs(&[&[0.1, 0.4, 0.05, 0.45]]);
        discard_by_support_threshold(&mut sample, 0.2, FilterBounds::default()).unwrap();

        assert_eq!(branches(&sample.pqueries()[0]), vec![1, 3]);
    }

    #[test]
    fn test_support_threshold_floor_and_ceiling() {
        // Nothing above the threshold: the floor pads from the rest, stably
        let mut sample = sample_with_lwrs(&[&[0.3, 0.3, 0.4]]);
        discard_by_support_threshold(&mut sample, 0.9, FilterBounds::new(2, usize::MAX))
            .unwrap();
        assert_eq!(branches(&sample.pqueries()[0]), vec![0, 1]);

        // Everything above the threshold: the ceiling truncates
        let mut sample = sample_with_lwrs(&[&[0.25, 0.25, 0.25, 0.25]]);
        discard_by_support_threshold(&mut sample, 0.0, FilterBounds::new(1, 3)).unwrap();
        assert_eq!(branches(&sample.pqueries()[0]), vec![0, 1, 2]);

        // A floor above the query size keeps everything
        let mut sample = sample_with_lwrs(&[&[0.7, 0.3]]);
        discard_by_support_threshold(&mut sample, 0.9, FilterBounds::new(5, 10)).unwrap();
        assert_eq!(sample.pqueries()[0].len(), 2);
    }

    #[test]
    fn test_support_threshold_counts_within_bounds() {
        let lwrs: &[&[f64]] = &[
            &[0.5, 0.2, 0.2, 0.1],
            &[0.9, 0.05, 0.05],
            &[0.2, 0.2, 0.2, 0.2, 0.2],
            &[1.0],
        ];
        let bounds = FilterBounds::new(2, 3);
        let mut sample = sample_with_lwrs(lwrs);
        discard_by_support_threshold(&mut sample, 0.15, bounds).unwrap();

        for (pq, original) in sample.iter().zip(lwrs) {
            let upper = bounds.max.min(original.len());
            let lower = bounds.min.min(original.len());
            assert!(pq.len() >= lower && pq.len() <= upper, "{}", pq.len());
        }
    }

    #[test]
    fn test_support_threshold_rejects_invalid() {
        let mut sample = sample_with_lwrs(&[&[0.6, 0.4]]);
        assert!(discard_by_support_threshold(&mut sample, 1.5, FilterBounds::default()).is_err());
        assert!(discard_by_support_threshold(&mut sample, -0.5, FilterBounds::default()).is_err());
        assert_eq!(
            discard_by_support_threshold(&mut sample, 0.5, FilterBounds::new(0, 4)),
            Err(FilterError::MinBelowOne)
        );
        assert_eq!(sample.pqueries()[0].len(), 2);
    }

    #[test]
    fn test_accumulated_threshold_basic() {
        let mut sample = sample_with_lwrs(&[&[0.1, 0.5, 0.15, 0.25]]);
        discard_by_accumulated_threshold(&mut sample, 0.7, FilterBounds::default()).unwrap();

        // 0.5 + 0.25 crosses 0.7
        assert_eq!(branches(&sample.pqueries()[0]), vec![1, 3]);
    }

    #[test]
    fn test_accumulated_threshold_non_positive_keeps_best() {
        let mut sample = sample_with_lwrs(&[&[0.2, 0.5, 0.3], &[0.6, 0.4]]);
        discard_by_accumulated_threshold(&mut sample, 0.0, FilterBounds::default()).unwrap();

        assert_eq!(branches(&sample.pqueries()[0]), vec![1]);
        assert_eq!(branches(&sample.pqueries()[1]), vec![0]);
    }

    #[test]
    fn test_accumulated_threshold_bounds() {
        // Ceiling stops the walk before the threshold is reached
        let mut sample = sample_with_lwrs(&[&[0.2, 0.2, 0.2, 0.2, 0.2]]);
        discard_by_accumulated_threshold(&mut sample, 0.99, FilterBounds::new(1, 2)).unwrap();
        assert_eq!(sample.pqueries()[0].len(), 2);

        // Floor extends past the crossing placement
        let mut sample = sample_with_lwrs(&[&[0.9, 0.05, 0.03, 0.02]]);
        discard_by_accumulated_threshold(&mut sample, 0.5, FilterBounds::new(3, 4)).unwrap();
        assert_eq!(branches(&sample.pqueries()[0]), vec![0, 1, 2]);

        // Threshold of one keeps everything
        let mut sample = sample_with_lwrs(&[&[0.4, 0.35, 0.25]]);
        discard_by_accumulated_threshold(&mut sample, 1.0, FilterBounds::default()).unwrap();
        assert_eq!(sample.pqueries()[0].len(), 3);
    }

    #[test]
    fn test_accumulated_threshold_rejects_invalid() {
        let mut sample = sample_with_lwrs(&[&[0.6, 0.4]]);
        assert!(discard_by_accumulated_threshold(&mut sample, 2.0, FilterBounds::default()).is_err());
        assert_eq!(
            discard_by_accumulated_threshold(&mut sample, 0.5, FilterBounds::new(0, 1)),
            Err(FilterError::MinBelowOne)
        );
        assert_eq!(
            discard_by_accumulated_threshold(&mut sample, 0.5, FilterBounds::new(3, 2)),
            Err(FilterError::MinAboveMax { min: 3, max: 2 })
        );
        // Rejected calls leave the original order untouched
        assert_eq!(branches(&sample.pqueries()[0]), vec![0, 1]);
    }
}
