//! Error types for InterGraph
//!
//! Defines all error types used throughout the library.

use thiserror::Error;

use crate::core::canonical::NodeId;
use crate::core::interval::Side;

/// Main error type for graph construction
///
/// Construction either fully succeeds or fails with one of these; no
/// partial graph is ever returned alongside an error.
#[derive(Debug, Error)]
pub enum InterGraphError {
    /// Malformed interval or record at ingestion
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Node or endpoint lookup failure
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Whole-build abort
    #[error("Construction aborted: {0}")]
    ConstructionAborted(#[from] ConstructionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when an interval, record or option is malformed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// End must exceed start
    #[error("Empty or inverted range {chrom}:{start}-{end} (end must exceed start)")]
    EmptyRange { chrom: String, start: u64, end: u64 },

    /// Negative coordinate from a signed source
    #[error("Negative coordinate {value} on {chrom}")]
    NegativeCoordinate { chrom: String, value: i64 },

    /// Chromosome token is empty or contains whitespace
    #[error("Invalid chromosome token: {0:?}")]
    InvalidChromosome(String),

    /// Chromosome is not in the configured allow-list
    #[error("Unknown chromosome: {0}")]
    UnknownChromosome(String),

    /// Strand token other than '+', '-', '.', '*'
    #[error("Invalid strand token: {0:?}")]
    InvalidStrand(String),

    /// Weight must be finite and non-negative
    #[error("Invalid weight: {0}")]
    InvalidWeight(f64),

    /// Provenance tag is empty, `.`, or contains a tab, newline or comma
    #[error("Invalid provenance tag: {0:?}")]
    InvalidTag(String),

    /// Unrecognised or out-of-range configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised when an identifier or endpoint cannot be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Node id not present in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Interaction endpoint maps to no canonical node
    #[error("No canonical node for {side} endpoint {interval} of record {record}")]
    UnmappedEndpoint {
        record: usize,
        side: Side,
        interval: String,
    },
}

/// Errors that abort a whole construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// A partition task failed
    #[error("Partition {partition} failed: {reason}")]
    PartitionFailed { partition: String, reason: String },

    /// Too many interaction records could not be mapped onto nodes
    #[error("Rejected {rejected} of {total} records (rate {rate:.4} exceeds threshold {threshold:.4})")]
    RejectionRateExceeded {
        rejected: usize,
        total: usize,
        rate: f64,
        threshold: f64,
    },

    /// Worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// More canonical nodes than node ids can address
    #[error("Node id space exhausted ({0} nodes)")]
    NodeIdOverflow(usize),
}

/// Result type alias for InterGraph operations
pub type Result<T> = std::result::Result<T, InterGraphError>;

/// Result type alias for validation
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Result type alias for lookups
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Result type alias for construction stages
pub type ConstructionResult<T> = std::result::Result<T, ConstructionError>;
