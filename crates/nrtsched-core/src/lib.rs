//! nrtsched-core: Core types for NUMA-aware scheduling decisions
//!
//! This crate provides the fundamental types used throughout nrtsched:
//! - Exact resource quantities and resource lists
//! - Workloads, subunits and QoS classification
//! - Node resource topology objects and their normalization into NUMA zones
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod quantity;
pub mod resources;
pub mod topology;
pub mod workload;

pub use config::*;
pub use error::*;
pub use quantity::*;
pub use resources::*;
pub use topology::*;
pub use workload::*;
