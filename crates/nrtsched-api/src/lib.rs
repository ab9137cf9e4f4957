//! nrtsched-api: REST API server for nrtsched
//!
//! This crate provides the HTTP evaluation API:
//! - Node filtering and scoring for a workload
//! - Topology listing
//! - System status

pub mod rest;

pub use rest::{create_router, AppState, FilterResponse, NodeScore, StatusResponse};
