//! Node and edge tables
//!
//! Tab-separated serialization of a built graph. The two tables together
//! round-trip to an identical `InteractionGraph`.
//!
//! Nodes: `id chrom start end strand members sources`
//! Edges: `source target weight observations kind provenance`
//!
//! Tag lists are comma-separated; `.` stands for an empty list. Output is
//! gzip-compressed when the path ends in `.gz`.

use crate::core::canonical::{CanonicalNode, NodeId};
use crate::core::edges::{Edge, EdgeKind};
use crate::core::{LookupError, ValidationError};
use crate::core::graph::InteractionGraph;
use crate::core::interval::{validate_tag, GenomicInterval, Strand};
use crate::core::io::{open_reader, LineIterator, OutputWriter};
use memchr::memchr_iter;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const NODE_HEADER: &str = "#id\tchrom\tstart\tend\tstrand\tmembers\tsources";
pub const EDGE_HEADER: &str = "#source\ttarget\tweight\tobservations\tkind\tprovenance";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount { line: usize, expected: usize, found: usize },

    #[error("line {line}: invalid {field}: {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Inconsistent tables: {0}")]
    Graph(#[from] LookupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_tags(tags: &BTreeSet<String>) -> std::io::Result<String> {
    if tags.is_empty() {
        return Ok(".".to_string());
    }
    for tag in tags {
        validate_tag(tag).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    }
    Ok(tags.iter().map(String::as_str).collect::<Vec<_>>().join(","))
}

fn split_tags(field: &str) -> BTreeSet<String> {
    if field == "." || field.is_empty() {
        BTreeSet::new()
    } else {
        field.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect()
    }
}

/// Split a row on tabs, checking the column count
fn split_row(line: &str, expected: usize, line_no: usize) -> Result<Vec<&str>, TableError> {
    let mut fields = Vec::with_capacity(expected);
    let mut start = 0;
    for tab in memchr_iter(b'\t', line.as_bytes()) {
        fields.push(&line[start..tab]);
        start = tab + 1;
    }
    fields.push(&line[start..]);

    if fields.len() != expected {
        return Err(TableError::FieldCount {
            line: line_no,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &'static str, line_no: usize) -> Result<T, TableError> {
    value.parse().map_err(|_| TableError::InvalidField {
        line: line_no,
        field,
        value: value.to_string(),
    })
}

/// Visit data rows, skipping `#` headers and blank lines
fn for_each_row<R, F>(reader: R, mut f: F) -> Result<(), TableError>
where
    R: BufRead,
    F: FnMut(&str, usize) -> Result<(), TableError>,
{
    let mut lines = LineIterator::new(reader);
    loop {
        let line_no = lines.line_no() + 1;
        let Some(line) = lines.next_line() else {
            break;
        };
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        f(line, line_no)?;
    }
    Ok(())
}

pub fn write_nodes<W: Write>(mut out: W, nodes: &[CanonicalNode]) -> std::io::Result<()> {
    writeln!(out, "{}", NODE_HEADER)?;
    for node in nodes {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            node.id,
            node.interval.chrom(),
            node.interval.start(),
            node.interval.end(),
            node.interval.strand(),
            node.member_count,
            join_tags(&node.sources)?
        )?;
    }
    Ok(())
}

pub fn write_edges<W: Write>(mut out: W, edges: &[Edge]) -> std::io::Result<()> {
    writeln!(out, "{}", EDGE_HEADER)?;
    for edge in edges {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            edge.source,
            edge.target,
            edge.weight,
            edge.observations,
            edge.kind,
            join_tags(&edge.provenance)?
        )?;
    }
    Ok(())
}

pub fn read_nodes<R: BufRead>(reader: R) -> Result<Vec<CanonicalNode>, TableError> {
    let mut nodes = Vec::new();
    for_each_row(reader, |line, line_no| {
        let fields = split_row(line, 7, line_no)?;
        let strand = Strand::parse(fields[4]).map_err(|source| TableError::InvalidRecord { line: line_no, source })?;
        let interval = GenomicInterval::new(
            fields[1],
            parse_field(fields[2], "start", line_no)?,
            parse_field(fields[3], "end", line_no)?,
            strand,
        )
        .map_err(|source| TableError::InvalidRecord { line: line_no, source })?;
        nodes.push(CanonicalNode {
            id: NodeId(parse_field(fields[0], "id", line_no)?),
            interval,
            member_count: parse_field(fields[5], "members", line_no)?,
            sources: split_tags(fields[6]),
        });
        Ok(())
    })?;
    Ok(nodes)
}

pub fn read_edges<R: BufRead>(reader: R) -> Result<Vec<Edge>, TableError> {
    let mut edges = Vec::new();
    for_each_row(reader, |line, line_no| {
        let fields = split_row(line, 6, line_no)?;
        let weight: f64 = parse_field(fields[2], "weight", line_no)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(TableError::InvalidRecord {
                line: line_no,
                source: ValidationError::InvalidWeight(weight),
            });
        }
        let kind = EdgeKind::parse(fields[4]).ok_or_else(|| TableError::InvalidField {
            line: line_no,
            field: "kind",
            value: fields[4].to_string(),
        })?;
        let source = NodeId(parse_field(fields[0], "source", line_no)?);
        let target = NodeId(parse_field(fields[1], "target", line_no)?);
        if (source == target) != (kind == EdgeKind::SelfLoop) {
            return Err(TableError::InvalidField {
                line: line_no,
                field: "kind",
                value: fields[4].to_string(),
            });
        }
        edges.push(
            Edge::new(source, target, weight)
                .with_observations(parse_field(fields[3], "observations", line_no)?)
                .with_provenance(split_tags(fields[5])),
        );
        Ok(())
    })?;
    Ok(edges)
}

/// `<prefix>.nodes.tsv` and `<prefix>.edges.tsv`, keeping a `.gz` suffix
pub fn table_paths(prefix: &Path, compress: bool) -> (PathBuf, PathBuf) {
    let suffix = if compress { ".gz" } else { "" };
    let base = prefix.as_os_str().to_string_lossy();
    (
        PathBuf::from(format!("{}.nodes.tsv{}", base, suffix)),
        PathBuf::from(format!("{}.edges.tsv{}", base, suffix)),
    )
}

/// Write both tables of a graph
pub fn write_graph(graph: &InteractionGraph, nodes_path: &Path, edges_path: &Path) -> Result<(), TableError> {
    let mut out = OutputWriter::create(nodes_path)?;
    write_nodes(&mut out, graph.nodes())?;
    out.finish()?;

    let mut out = OutputWriter::create(edges_path)?;
    write_edges(&mut out, graph.edges())?;
    out.finish()?;

    log::info!(
        "Wrote {} nodes to {} and {} edges to {}",
        graph.node_count(),
        nodes_path.display(),
        graph.edge_count(),
        edges_path.display()
    );
    Ok(())
}

/// Load a graph from its node and edge tables
pub fn read_graph(nodes_path: &Path, edges_path: &Path) -> Result<InteractionGraph, TableError> {
    let nodes = read_nodes(open_reader(nodes_path)?)?;
    let edges = read_edges(open_reader(edges_path)?)?;
    Ok(InteractionGraph::from_parts(nodes, edges)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nodes() -> Vec<CanonicalNode> {
        vec![
            CanonicalNode {
                id: NodeId(0),
                interval: GenomicInterval::new("chr1", 100, 250, Strand::Plus).unwrap(),
                member_count: 2,
                sources: ["A".to_string(), "B".to_string()].into_iter().collect(),
            },
            CanonicalNode {
                id: NodeId(1),
                interval: GenomicInterval::new("chr2", 10, 20, Strand::Unknown).unwrap(),
                member_count: 1,
                sources: BTreeSet::new(),
            },
        ]
    }

    #[test]
    fn test_node_rows_round_trip() {
        let mut buf = Vec::new();
        write_nodes(&mut buf, &sample_nodes()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(NODE_HEADER));
        assert!(text.contains("0\tchr1\t100\t250\t+\t2\tA,B"));
        assert!(text.contains("1\tchr2\t10\t20\t.\t1\t."));

        assert_eq!(read_nodes(buf.as_slice()).unwrap(), sample_nodes());
    }

    #[test]
    fn test_edge_rows_round_trip() {
        let edges = vec![
            Edge::new(NodeId(0), NodeId(0), 1.0),
            Edge::new(NodeId(0), NodeId(1), 0.1 + 0.2)
                .with_observations(2)
                .with_provenance(["hic", "ric"]),
        ];
        let mut buf = Vec::new();
        write_edges(&mut buf, &edges).unwrap();
        assert_eq!(read_edges(buf.as_slice()).unwrap(), edges);
    }

    #[test]
    fn test_rejects_malformed_rows() {
        let err = read_nodes("0\tchr1\t100\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::FieldCount { line: 1, expected: 7, found: 3 }));

        let err = read_nodes("#h\n0\tchr1\t200\t100\t+\t1\t.\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::InvalidRecord { line: 2, .. }));

        let err = read_edges("0\t1\t1.0\t1\tself-loop\t.\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::InvalidField { field: "kind", .. }));

        let err = read_edges("0\t1\tNaN\t1\tinteraction\t.\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::InvalidRecord { .. }));
    }

    #[test]
    fn test_table_paths() {
        let (nodes, edges) = table_paths(Path::new("out/graph"), true);
        assert_eq!(nodes, PathBuf::from("out/graph.nodes.tsv.gz"));
        assert_eq!(edges, PathBuf::from("out/graph.edges.tsv.gz"));
    }
}
