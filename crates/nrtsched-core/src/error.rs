//! Error types for nrtsched

use thiserror::Error;

/// Main error type for nrtsched
#[derive(Error, Debug)]
pub enum NrtError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Quantity string could not be parsed
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Zone name or id is not usable as a NUMA zone
    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    /// Summing quantities left the representable range
    #[error("Quantity overflow summing {0}")]
    QuantityOverflow(String),

    /// Scoring was asked to reduce over a node without NUMA zones
    #[error("No NUMA zones to score")]
    NoNumaZones,

    /// Topology not found
    #[error("Topology not found: {0}")]
    TopologyNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for nrtsched operations
pub type NrtResult<T> = Result<T, NrtError>;

impl From<serde_json::Error> for NrtError {
    fn from(err: serde_json::Error) -> Self {
        NrtError::Serialization(err.to_string())
    }
}
