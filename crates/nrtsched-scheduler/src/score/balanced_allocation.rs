//! Balanced-allocation zone scoring: favors zones whose usage ratios stay
//! uniform across resources after placement

use nrtsched_core::{Quantity, ResourceList};

use super::{clamp_score, ResourceWeights, ZoneScorer, MAX_NODE_SCORE};

/// Scores a zone as `(1 - variance) * 100` over the requested fractions of
/// capacity. Weights do not apply.
pub struct BalancedAllocation;

impl ZoneScorer for BalancedAllocation {
    fn score_zone(
        &self,
        requested: &ResourceList,
        allocatable: &ResourceList,
        _weights: &ResourceWeights,
    ) -> i64 {
        let mut fractions = Vec::with_capacity(requested.len());
        for (name, request) in requested.iter() {
            match fraction_of_capacity(request, allocatable.get(name)) {
                Some(fraction) => fractions.push(fraction),
                None => return 0,
            }
        }

        let score = (1.0 - variance(&fractions)) * MAX_NODE_SCORE as f64;
        clamp_score(score as i128)
    }

    fn name(&self) -> &'static str {
        "balanced-allocation"
    }
}

/// Requested share of capacity; 1 when the zone has no capacity and `None`
/// when the request exceeds it
fn fraction_of_capacity(request: Quantity, capacity: Option<Quantity>) -> Option<f64> {
    match capacity {
        Some(capacity) if capacity.nanos() > 0 => {
            if request > capacity {
                None
            } else {
                Some(request.as_f64() / capacity.as_f64())
            }
        }
        _ => Some(1.0),
    }
}

/// Population variance; zero for an empty slice
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::tests::list;

    fn score(requested: &[(&str, &str)], allocatable: &[(&str, &str)]) -> i64 {
        BalancedAllocation.score_zone(&list(requested), &list(allocatable), &ResourceWeights::new())
    }

    #[test]
    fn test_perfect_balance() {
        assert_eq!(
            score(&[("cpu", "1"), ("memory", "1Gi")], &[("cpu", "2"), ("memory", "2Gi")]),
            100
        );
    }

    #[test]
    fn test_imbalance_lowers_score() {
        // fractions 0.5 and 1.0: variance 0.0625
        assert_eq!(
            score(&[("cpu", "1"), ("memory", "2Gi")], &[("cpu", "2"), ("memory", "2Gi")]),
            93
        );
    }

    #[test]
    fn test_overcommit_scores_zero() {
        assert_eq!(
            score(&[("cpu", "3"), ("memory", "1Gi")], &[("cpu", "2"), ("memory", "2Gi")]),
            0
        );
    }

    #[test]
    fn test_missing_capacity_counts_as_full() {
        // fractions 1.0 and 0.0: variance 0.25
        assert_eq!(
            score(&[("example.com/nic", "1"), ("cpu", "0")], &[("cpu", "2")]),
            75
        );
    }

    #[test]
    fn test_nothing_requested() {
        assert_eq!(score(&[], &[("cpu", "2")]), 100);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[0.5, 0.5]), 0.0);
        assert_eq!(variance(&[0.0, 1.0]), 0.25);
    }
}
