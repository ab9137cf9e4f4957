//! Node scoring by per-zone resource allocation
//!
//! Every NUMA zone of a node is scored independently with a [`ZoneScorer`],
//! then the zone scores are reduced into a single node score in `0..=100`.

mod balanced_allocation;
mod least_allocatable;
mod most_allocatable;

pub use balanced_allocation::BalancedAllocation;
pub use least_allocatable::LeastAllocatable;
pub use most_allocatable::MostAllocatable;

use nrtsched_core::{
    NrtError, NrtResult, NumaZone, Quantity, ResourceList, ResourceName, ScoreReduction,
    ScoringConfig, ScoringStrategy, Workload,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};
use uuid::Uuid;

use crate::provider::TopologyProvider;

/// Highest score a node can get
pub const MAX_NODE_SCORE: i64 = 100;

/// Weight of a resource with no configured weight
pub const DEFAULT_RESOURCE_WEIGHT: i64 = 1;

/// Per-resource weights for least/most-allocatable scoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceWeights(BTreeMap<ResourceName, i64>);

impl ResourceWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        config
            .weight_table()
            .into_iter()
            .map(|(name, weight)| (ResourceName::new(name), weight))
            .collect()
    }

    /// Configured weight of `name`, or [`DEFAULT_RESOURCE_WEIGHT`]
    pub fn weight(&self, name: &ResourceName) -> i64 {
        self.0.get(name).copied().unwrap_or(DEFAULT_RESOURCE_WEIGHT)
    }

    pub fn set(&mut self, name: impl Into<ResourceName>, weight: i64) {
        self.0.insert(name.into(), weight);
    }
}

impl FromIterator<(ResourceName, i64)> for ResourceWeights {
    fn from_iter<I: IntoIterator<Item = (ResourceName, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Strategy scoring one zone against the requested resources
pub trait ZoneScorer: Send + Sync {
    /// Score in `0..=100` of placing `requested` on a zone offering
    /// `allocatable`
    fn score_zone(
        &self,
        requested: &ResourceList,
        allocatable: &ResourceList,
        weights: &ResourceWeights,
    ) -> i64;

    /// Get the strategy name
    fn name(&self) -> &'static str;
}

/// Scorer implementing `strategy`
pub fn zone_scorer(strategy: ScoringStrategy) -> &'static dyn ZoneScorer {
    match strategy {
        ScoringStrategy::LeastAllocatable => &LeastAllocatable,
        ScoringStrategy::MostAllocatable => &MostAllocatable,
        ScoringStrategy::BalancedAllocation => &BalancedAllocation,
    }
}

/// Weighted average of a per-resource score over every requested resource.
/// Zero when nothing is requested or the weights sum to zero or less.
pub(crate) fn weighted_average(
    requested: &ResourceList,
    allocatable: &ResourceList,
    weights: &ResourceWeights,
    resource_score: impl Fn(Quantity, Quantity) -> i64,
) -> i64 {
    let mut total: i128 = 0;
    let mut weight_sum: i128 = 0;

    for (name, request) in requested.iter() {
        let weight = i128::from(weights.weight(name));
        let score = match allocatable.get(name) {
            Some(capacity) if capacity.nanos() > 0 && request <= capacity => {
                resource_score(request, capacity)
            }
            _ => 0,
        };
        total += i128::from(score) * weight;
        weight_sum += weight;
    }

    if weight_sum <= 0 {
        return 0;
    }
    clamp_score(total / weight_sum)
}

/// `part * 100 / whole` with truncating division, for `0 <= part <= whole`.
/// Near the top of the `Quantity` range the multiply would overflow; both
/// sides are then scaled down first, which can round up by one point.
pub(crate) fn percent_of(part: i128, whole: i128) -> i64 {
    let max = i128::from(MAX_NODE_SCORE);
    let percent = match part.checked_mul(max) {
        Some(scaled) => scaled / whole,
        None => part / (whole / max),
    };
    clamp_score(percent)
}

pub(crate) fn clamp_score(score: i128) -> i64 {
    score.clamp(0, i128::from(MAX_NODE_SCORE)) as i64
}

/// Minimum zone score that skips zero-scoring zones unless every zone
/// scored zero. `None` for an empty list.
pub fn zero_avoidance_min(scores: &[i64]) -> Option<i64> {
    let (first, rest) = scores.split_first()?;
    Some(rest.iter().fold(*first, |min, &score| {
        if min == 0 || (score != 0 && score < min) {
            score
        } else {
            min
        }
    }))
}

/// Plain minimum over all zone scores
pub fn plain_min(scores: &[i64]) -> Option<i64> {
    scores.iter().copied().min()
}

fn reduce(reduction: ScoreReduction, scores: &[i64]) -> Option<i64> {
    match reduction {
        ScoreReduction::ZeroAvoidance => zero_avoidance_min(scores),
        ScoreReduction::PlainMinimum => plain_min(scores),
    }
}

/// Score `requests` against every zone and reduce with the zero-avoidance
/// minimum
pub fn score_zones(
    requests: &ResourceList,
    zones: &[NumaZone],
    strategy: ScoringStrategy,
    weights: &ResourceWeights,
) -> NrtResult<i64> {
    score_zones_with(
        requests,
        zones,
        strategy,
        weights,
        ScoreReduction::ZeroAvoidance,
    )
}

/// Same as [`score_zones`] with an explicit reduction
pub fn score_zones_with(
    requests: &ResourceList,
    zones: &[NumaZone],
    strategy: ScoringStrategy,
    weights: &ResourceWeights,
    reduction: ScoreReduction,
) -> NrtResult<i64> {
    let scorer = zone_scorer(strategy);
    let scores: Vec<i64> = zones
        .iter()
        .map(|zone| {
            let score = scorer.score_zone(requests, &zone.resources, weights);
            debug!(zone = zone.id, score, strategy = scorer.name(), "Zone scored");
            score
        })
        .collect();

    reduce(reduction, &scores).ok_or(NrtError::NoNumaZones)
}

/// Node scorer backed by a topology provider
pub struct ResourceAllocationScorer {
    provider: Arc<dyn TopologyProvider>,
    strategy: ScoringStrategy,
    weights: ResourceWeights,
    reduction: ScoreReduction,
}

impl ResourceAllocationScorer {
    /// Create a scorer from the scoring configuration
    pub fn new(provider: Arc<dyn TopologyProvider>, config: &ScoringConfig) -> Self {
        if config.reduction == ScoreReduction::PlainMinimum {
            warn!("Plain minimum score reduction is deprecated, prefer zero-avoidance");
        }
        Self {
            provider,
            strategy: config.strategy,
            weights: ResourceWeights::from_config(config),
            reduction: config.reduction,
        }
    }

    /// Override the configured strategy
    pub fn with_strategy(mut self, strategy: ScoringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Score `node_name` for `workload`. Unknown nodes score 0.
    pub fn score(&self, workload: &Workload, node_name: &str) -> NrtResult<i64> {
        let span = debug_span!(
            "score",
            log_id = %Uuid::new_v4(),
            workload = %workload.log_id(),
            node = %node_name,
            strategy = %self.strategy
        );
        let _enter = span.enter();

        let Some(topology) = self.provider.node_topology(node_name) else {
            debug!("No topology for node, scoring 0");
            return Ok(0);
        };

        let requests = workload.aggregate_requests()?;
        let score = score_zones_with(
            &requests,
            &topology.zones,
            self.strategy,
            &self.weights,
            self.reduction,
        )?;
        debug!(score, requests = %requests, "Node scored");
        Ok(score)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::TopologyStore;
    use nrtsched_core::{NodeResourceTopology, ResourceInfo, ResourceWeightConfig, Subunit, Zone};

    pub(crate) fn list(entries: &[(&str, &str)]) -> ResourceList {
        entries
            .iter()
            .map(|(name, quantity)| (*name, quantity.parse::<Quantity>().unwrap()))
            .collect()
    }

    fn zone(id: usize, entries: &[(&str, &str)]) -> NumaZone {
        NumaZone::new(id, list(entries))
    }

    #[test]
    fn test_percent_of_near_range_limit() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(i128::MAX, i128::MAX), 100);
        assert_eq!(percent_of(i128::MAX / 2, i128::MAX), 50);
        assert_eq!(percent_of(0, i128::MAX), 0);
    }

    #[test]
    fn test_zero_avoidance_min() {
        assert_eq!(zero_avoidance_min(&[0, 40, 0, 70]), Some(40));
        assert_eq!(zero_avoidance_min(&[70, 0, 40]), Some(40));
        assert_eq!(zero_avoidance_min(&[0, 0]), Some(0));
        assert_eq!(zero_avoidance_min(&[55]), Some(55));
        assert_eq!(zero_avoidance_min(&[]), None);
    }

    #[test]
    fn test_plain_min() {
        assert_eq!(plain_min(&[0, 40, 70]), Some(0));
        assert_eq!(plain_min(&[]), None);
    }

    #[test]
    fn test_default_weight() {
        let mut weights = ResourceWeights::new();
        weights.set("cpu", 3);
        assert_eq!(weights.weight(&ResourceName::cpu()), 3);
        assert_eq!(weights.weight(&ResourceName::memory()), DEFAULT_RESOURCE_WEIGHT);
    }

    #[test]
    fn test_weights_from_config() {
        let config = ScoringConfig {
            resources: vec![ResourceWeightConfig {
                name: "nvidia.com/gpu".to_string(),
                weight: 5,
            }],
            ..Default::default()
        };
        let weights = ResourceWeights::from_config(&config);
        assert_eq!(weights.weight(&ResourceName::new("nvidia.com/gpu")), 5);
        assert_eq!(weights.weight(&ResourceName::cpu()), 1);
    }

    #[test]
    fn test_score_zones_skips_zero_zone() {
        let requests = list(&[("cpu", "2"), ("memory", "20Mi")]);
        let zones = vec![
            zone(0, &[("cpu", "1"), ("memory", "50Mi")]),
            zone(1, &[("cpu", "2"), ("memory", "50Mi")]),
        ];

        let score = score_zones(
            &requests,
            &zones,
            ScoringStrategy::LeastAllocatable,
            &ResourceWeights::new(),
        )
        .unwrap();
        // zone 0 only scores memory: (0 + 40) / 2
        assert_eq!(score, 20);

        let plain = score_zones_with(
            &requests,
            &[zone(0, &[("memory", "1Mi")]), zone(1, &[("cpu", "2"), ("memory", "50Mi")])],
            ScoringStrategy::LeastAllocatable,
            &ResourceWeights::new(),
            ScoreReduction::PlainMinimum,
        )
        .unwrap();
        assert_eq!(plain, 0);
    }

    #[test]
    fn test_score_zones_no_zones() {
        let result = score_zones(
            &list(&[("cpu", "1")]),
            &[],
            ScoringStrategy::BalancedAllocation,
            &ResourceWeights::new(),
        );
        assert!(matches!(result, Err(NrtError::NoNumaZones)));
    }

    #[test]
    fn test_score_is_idempotent() {
        let requests = list(&[("cpu", "3"), ("memory", "1Gi")]);
        let zones = vec![
            zone(0, &[("cpu", "4"), ("memory", "4Gi")]),
            zone(1, &[("cpu", "8"), ("memory", "2Gi")]),
        ];
        for strategy in [
            ScoringStrategy::LeastAllocatable,
            ScoringStrategy::MostAllocatable,
            ScoringStrategy::BalancedAllocation,
        ] {
            let weights = ResourceWeights::new();
            let first = score_zones(&requests, &zones, strategy, &weights).unwrap();
            let second = score_zones(&requests, &zones, strategy, &weights).unwrap();
            assert_eq!(first, second);
            assert!((0..=MAX_NODE_SCORE).contains(&first));
        }
    }

    fn raw_node(name: &str, zones: &[(&str, &str)]) -> NodeResourceTopology {
        NodeResourceTopology {
            name: name.to_string(),
            namespace: "default".to_string(),
            topology_policies: vec!["SingleNUMANodeContainerLevel".to_string()],
            zones: zones
                .iter()
                .map(|(zone_name, cpu)| Zone {
                    name: zone_name.to_string(),
                    zone_type: "Node".to_string(),
                    resources: vec![ResourceInfo {
                        name: "cpu".to_string(),
                        capacity: cpu.to_string(),
                        allocatable: cpu.to_string(),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn test_resource_allocation_scorer() {
        let store = TopologyStore::from_objects(
            vec!["default".to_string()],
            vec![
                raw_node("worker-1", &[("node-0", "4"), ("node-1", "8")]),
                raw_node("worker-2", &[]),
            ],
        );
        let scorer = ResourceAllocationScorer::new(Arc::new(store), &ScoringConfig::default());

        let mut workload = Workload::new(
            "w",
            vec![Subunit::guaranteed("c", list(&[("cpu", "1")]))],
        );
        workload.init_subunits = vec![Subunit::guaranteed("init", list(&[("cpu", "1")]))];

        // aggregate request is 2 cpus: zone 0 scores 50, zone 1 scores 25
        assert_eq!(scorer.score(&workload, "worker-1").unwrap(), 25);
        assert_eq!(scorer.score(&workload, "unknown").unwrap(), 0);
        assert!(matches!(
            scorer.score(&workload, "worker-2"),
            Err(NrtError::NoNumaZones)
        ));

        let scorer = scorer.with_strategy(ScoringStrategy::MostAllocatable);
        assert_eq!(scorer.strategy(), ScoringStrategy::MostAllocatable);
        assert_eq!(scorer.score(&workload, "worker-1").unwrap(), 50);
    }

    #[test]
    fn test_scorer_reports_request_overflow() {
        let store = TopologyStore::from_objects(
            vec!["default".to_string()],
            vec![raw_node("worker-1", &[("node-0", "4")])],
        );
        let scorer = ResourceAllocationScorer::new(Arc::new(store), &ScoringConfig::default());

        let huge = list(&[("cpu", "1e29")]);
        let workload = Workload::new(
            "w",
            vec![Subunit::guaranteed("a", huge.clone()), Subunit::guaranteed("b", huge)],
        );
        assert!(matches!(
            scorer.score(&workload, "worker-1"),
            Err(NrtError::QuantityOverflow(_))
        ));
    }
}
