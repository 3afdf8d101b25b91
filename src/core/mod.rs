//! Core graph construction
//!
//! This module contains the interval model, the interval index, interval
//! canonicalization, edge resolution and the graph itself.

pub mod canonical;
pub mod config;
pub mod edges;
mod error;
pub mod graph;
pub mod index;
pub mod interval;
pub mod io;
pub mod pipeline;

pub use canonical::{CanonicalNode, CanonicalStats, Canonicalizer, NodeId, NodeTable, PartitionClusters};
pub use config::{BuildConfig, MergeStrategy, UnknownStrandPolicy, DEFAULT_MAX_REJECTION_RATE};
pub use edges::{Edge, EdgeKind, EdgeResolution, EdgeResolver, NodeLocator};
pub use error::{
    ConstructionError, ConstructionResult, InterGraphError, LookupError, LookupResult, Result, ValidationError,
    ValidationResult,
};
pub use graph::{Components, Degree, GraphSummary, InteractionGraph, ProvenanceStats};
pub use index::{IndexEntry, IntervalIndex, Partition};
pub use interval::{ranges_overlap, EndpointRef, GenomicInterval, PartitionKey, RawInteractionRecord, Side, Strand};
pub use io::{detect_compression, open_reader, CompressionFormat, LineIterator, OutputWriter, DEFAULT_BUFFER_SIZE};
pub use pipeline::{build_graph, resolve_onto, ConstructionReport, GraphBuilder};
