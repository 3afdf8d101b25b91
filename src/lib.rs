//! InterGraph - interaction graphs from genomic interval pairs
//!
//! Builds a deduplicated, undirected interaction graph from pairs of
//! genomic intervals (Hi-C contacts, RNA-chromatin and RNA-RNA pairs, ...).
//!
//! # Features
//!
//! - Overlapping intervals collapse into canonical nodes (union-span or
//!   strict-exact merging, strand-aware)
//! - Repeated observations merge into weighted edges with provenance
//! - Parallel per-partition construction with rayon
//! - Connected components, neighbourhoods, degree and subgraph queries
//! - Compressed pairs input (gzip, bzip2) and node/edge table output
//!
//! # Example
//!
//! ```
//! use intergraph::{build_graph, BuildConfig, GenomicInterval, RawInteractionRecord, Strand};
//!
//! let a = GenomicInterval::new("chr1", 100, 200, Strand::Plus)?;
//! let b = GenomicInterval::new("chr2", 10, 20, Strand::Plus)?;
//! let records = vec![RawInteractionRecord::new(a.clone(), b.clone()), RawInteractionRecord::new(a, b)];
//!
//! let (graph, report) = build_graph(records, &BuildConfig::default())?;
//! assert_eq!(report.node_count, 2);
//! assert_eq!(graph.edges()[0].weight, 2.0);
//! # Ok::<(), intergraph::InterGraphError>(())
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    build_graph, resolve_onto, BuildConfig, CanonicalNode, ConstructionError, ConstructionReport, Degree, Edge,
    EdgeKind, GenomicInterval, GraphBuilder, InterGraphError, InteractionGraph, LookupError, MergeStrategy, NodeId,
    RawInteractionRecord, Strand, UnknownStrandPolicy, ValidationError,
};
pub use formats::{pairs, tables};
