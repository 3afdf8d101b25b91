//! File format collaborators
//!
//! Readers and writers around the core: the interaction pairs table that
//! feeds construction, and the node/edge tables a built graph is stored in.

pub mod pairs;
pub mod tables;

pub use pairs::{parse_pairs_line, read_pairs, read_pairs_file, PairsParseError, PairsRecordView};
pub use tables::{
    read_edges, read_graph, read_nodes, table_paths, write_edges, write_graph, write_nodes, TableError,
    EDGE_HEADER, NODE_HEADER,
};
