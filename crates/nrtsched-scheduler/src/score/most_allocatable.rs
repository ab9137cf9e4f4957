//! Most-allocatable zone scoring: favors the zone left with most headroom

use nrtsched_core::ResourceList;

use super::{percent_of, weighted_average, ResourceWeights, ZoneScorer};

/// Scores each resource as `(capacity - requested) * 100 / capacity`
pub struct MostAllocatable;

impl ZoneScorer for MostAllocatable {
    fn score_zone(
        &self,
        requested: &ResourceList,
        allocatable: &ResourceList,
        weights: &ResourceWeights,
    ) -> i64 {
        weighted_average(requested, allocatable, weights, |request, capacity| {
            percent_of(capacity.nanos() - request.nanos(), capacity.nanos())
        })
    }

    fn name(&self) -> &'static str {
        "most-allocatable"
    }
}
