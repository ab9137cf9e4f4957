//! Least-allocatable zone scoring: favors the zone a request fills most

use nrtsched_core::ResourceList;

use super::{percent_of, weighted_average, ResourceWeights, ZoneScorer};

/// Scores each resource as `requested * 100 / capacity`
pub struct LeastAllocatable;

impl ZoneScorer for LeastAllocatable {
    fn score_zone(
        &self,
        requested: &ResourceList,
        allocatable: &ResourceList,
        weights: &ResourceWeights,
    ) -> i64 {
        weighted_average(requested, allocatable, weights, |request, capacity| {
            percent_of(request.nanos(), capacity.nanos())
        })
    }

    fn name(&self) -> &'static str {
        "least-allocatable"
    }
}
