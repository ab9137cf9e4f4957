//! nrtsched-scheduler: NUMA-aware filtering and scoring for nrtsched
//!
//! This crate decides where a workload may run and how good each node is:
//! - Zone eligibility masks
//! - Topology providers and the in-memory topology store
//! - Single NUMA zone feasibility filter with per-policy handlers
//! - Per-zone scoring strategies and node score reduction

pub mod filter;
pub mod mask;
pub mod provider;
pub mod score;

pub use filter::{
    can_align, eligible_zones, filter_topology, FilterVerdict, PolicyHandler, PolicyHandlerMap,
    TopologyMatch,
};
pub use mask::ZoneMask;
pub use provider::{require_topology, TopologyProvider, TopologyStore};
pub use score::{
    score_zones, score_zones_with, zone_scorer, ResourceAllocationScorer, ResourceWeights,
    ZoneScorer, MAX_NODE_SCORE,
};
