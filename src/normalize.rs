use crate::placement::{PQuery, Sample};
use log::{debug, warn};
use rayon::prelude::*;

/// Turn raw log-likelihoods into likelihood weight ratios and record the
/// entropy of each query's LWR distribution.
///
/// Queries are processed independently on the rayon pool. Weights are taken
/// relative to the best likelihood of the query, so the result does not
/// depend on a constant shift of all likelihoods.
pub fn compute_and_set_lwr(sample: &mut Sample) {
    sample
        .pqueries_mut()
        .par_iter_mut()
        .for_each(normalize_pquery);

    debug!("Computed LWRs for {} queries", sample.len());
}

/// Weight of a likelihood relative to the query maximum. NaN counts as an
/// impossible placement; with a `+inf` maximum only `+inf` entries weigh.
fn relative_weight(likelihood: f64, max: f64) -> f64 {
    if likelihood.is_nan() {
        0.0
    } else if max == f64::INFINITY {
        if likelihood == f64::INFINITY {
            1.0
        } else {
            0.0
        }
    } else {
        (likelihood - max).exp()
    }
}

fn normalize_pquery(pq: &mut PQuery) {
    if pq.is_empty() {
        return;
    }

    let nan_count = pq.iter().filter(|p| p.likelihood().is_nan()).count();
    if nan_count > 0 {
        warn!(
            "Query {} has {} NaN likelihoods, treated as impossible placements",
            pq.sequence_id(),
            nan_count
        );
    }

    // f64::max ignores NaN operands
    let max = pq
        .iter()
        .map(|p| p.likelihood())
        .fold(f64::NEG_INFINITY, f64::max);

    // Every placement is impossible: fall back to a uniform distribution
    if max == f64::NEG_INFINITY {
        let n = pq.len() as f64;
        for p in pq.placements_mut().iter_mut() {
            p.set_lwr(1.0 / n);
        }
        pq.set_entropy(n.ln());
        return;
    }

    let total: f64 = pq.iter().map(|p| relative_weight(p.likelihood(), max)).sum();

    let mut entropy = 0.0;
    for p in pq.placements_mut().iter_mut() {
        let lwr = relative_weight(p.likelihood(), max) / total;
        p.set_lwr(lwr);
        if lwr > 0.0 {
            entropy -= lwr * lwr.ln();
        }
    }
    pq.set_entropy(entropy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::Placement;

    fn sample_from(likelihoods: &[&[f64]]) -> Sample {
        likelihoods
            .iter()
            .enumerate()
            .map(|(seq_id, lls)| {
                PQuery::with_placements(
                    seq_id as u32,
                    lls.iter()
                        .enumerate()
                        .map(|(branch, &ll)| Placement::new(branch as u32, ll))
                        .collect(),
                )
            })
            .collect()
    }

    fn lwrs(pq: &PQuery) -> Vec<f64> {
        pq.iter().map(Placement::lwr).collect()
    }

    #[test]
    fn test_worked_example() {
        let mut sample = sample_from(&[&[-2.0, -1.0, -3.0]]);
        compute_and_set_lwr(&mut sample);

        let pq = &sample.pqueries()[0];
        let expected = [0.2447, 0.6652, 0.0900];
        for (lwr, want) in lwrs(pq).iter().zip(expected) {
            assert!((lwr - want).abs() < 1e-4, "{lwr} vs {want}");
        }
        assert!((pq.entropy().unwrap() - 0.8324).abs() < 1e-3);
    }

    #[test]
    fn test_sum_to_one_and_shift_invariance() {
        let base: &[f64] = &[-12345.6, -12350.1, -12346.0, -12400.0, -12345.7];
        let shifted: Vec<f64> = base.iter().map(|l| l + 9876.5).collect();
        let mut sample = sample_from(&[base, &shifted]);
        compute_and_set_lwr(&mut sample);

        let a = &sample.pqueries()[0];
        let b = &sample.pqueries()[1];
        let sum: f64 = lwrs(a).iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for (x, y) in lwrs(a).iter().zip(lwrs(b)) {
            assert!((x - y).abs() < 1e-9);
        }
        assert!((a.entropy().unwrap() - b.entropy().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_extremes() {
        let mut sample = sample_from(&[&[-5.0, -5.0, -5.0, -5.0], &[-1.0], &[0.0, -2000.0]]);
        compute_and_set_lwr(&mut sample);

        let uniform = &sample.pqueries()[0];
        assert!((uniform.entropy().unwrap() - 4f64.ln()).abs() < 1e-12);
        assert!(lwrs(uniform).iter().all(|l| (l - 0.25).abs() < 1e-12));

        let single = &sample.pqueries()[1];
        assert_eq!(lwrs(single), vec![1.0]);
        assert_eq!(single.entropy(), Some(0.0));

        // exp(-2000) underflows to zero and contributes nothing
        let underflow = &sample.pqueries()[2];
        assert_eq!(lwrs(underflow), vec![1.0, 0.0]);
        assert_eq!(underflow.entropy(), Some(0.0));
    }

    #[test]
    fn test_empty_and_impossible_queries() {
        let mut sample = sample_from(&[&[], &[f64::NEG_INFINITY, f64::NEG_INFINITY]]);
        compute_and_set_lwr(&mut sample);

        assert!(sample.pqueries()[0].entropy().is_none());

        let impossible = &sample.pqueries()[1];
        assert_eq!(lwrs(impossible), vec![0.5, 0.5]);
        assert!((impossible.entropy().unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_likelihood_takes_all_weight() {
        let inf = f64::INFINITY;
        let mut sample = sample_from(&[&[inf, -1.0], &[inf, -3.0, inf]]);
        compute_and_set_lwr(&mut sample);

        let single = &sample.pqueries()[0];
        assert_eq!(lwrs(single), vec![1.0, 0.0]);
        assert_eq!(single.entropy(), Some(0.0));

        let tied = &sample.pqueries()[1];
        assert_eq!(lwrs(tied), vec![0.5, 0.0, 0.5]);
        assert!((tied.entropy().unwrap() - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_nan_likelihood_is_impossible() {
        let nan = f64::NAN;
        let mut sample = sample_from(&[&[nan, -1.0], &[-2.0, nan, -1.0, -3.0], &[nan, nan]]);
        compute_and_set_lwr(&mut sample);

        let pq = &sample.pqueries()[0];
        assert_eq!(lwrs(pq), vec![0.0, 1.0]);
        assert_eq!(pq.entropy(), Some(0.0));

        // The other placements match the query without the NaN entry
        let pq = &sample.pqueries()[1];
        let expected = [0.2447, 0.0, 0.6652, 0.0900];
        for (lwr, want) in lwrs(pq).iter().zip(expected) {
            assert!((lwr - want).abs() < 1e-4, "{lwr} vs {want}");
        }
        assert!((pq.entropy().unwrap() - 0.8324).abs() < 1e-3);

        let all_nan = &sample.pqueries()[2];
        assert_eq!(lwrs(all_nan), vec![0.5, 0.5]);
        assert!(sample.iter().all(|pq| pq.iter().all(|p| !p.lwr().is_nan())));
    }
}
