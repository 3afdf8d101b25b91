//! Edge resolution
//!
//! Maps interaction records onto canonical node pairs and merges repeated
//! observations of the same unordered pair into one weighted edge.

use crate::core::canonical::{CanonicalNode, NodeId, NodeTable};
use crate::core::error::LookupError;
use crate::core::interval::{EndpointRef, GenomicInterval, PartitionKey, RawInteractionRecord, Side, Strand};
use log::{debug, warn};
use rayon::prelude::*;
use rust_lapper::{Interval, Lapper};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Records per parallel work unit
const CHUNK_SIZE: usize = 4096;

/// Rejections logged individually before falling back to a summary line
const MAX_REJECTION_WARNINGS: usize = 20;

/// Category of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Interaction between two distinct nodes
    Interaction,
    /// Both endpoints canonicalized to the same node
    SelfLoop,
}

impl EdgeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interaction" => Some(EdgeKind::Interaction),
            "self-loop" | "self_loop" => Some(EdgeKind::SelfLoop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Interaction => "interaction",
            EdgeKind::SelfLoop => "self-loop",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undirected, weighted edge between two canonical nodes
///
/// `source <= target` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Sum of record weights (1 per record unless a score was given)
    pub weight: f64,
    /// Number of records merged into this edge
    pub observations: usize,
    pub provenance: BTreeSet<String>,
    pub kind: EdgeKind,
}

impl Edge {
    /// Edge between `a` and `b`, normalised to min-id first
    pub fn new(a: NodeId, b: NodeId, weight: f64) -> Self {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        Self {
            source,
            target,
            weight,
            observations: 1,
            provenance: BTreeSet::new(),
            kind: if source == target {
                EdgeKind::SelfLoop
            } else {
                EdgeKind::Interaction
            },
        }
    }

    pub fn with_provenance<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provenance = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_observations(mut self, observations: usize) -> Self {
        self.observations = observations;
        self
    }

    #[inline]
    pub fn pair(&self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }

    #[inline]
    pub fn is_self_loop(&self) -> bool {
        self.kind == EdgeKind::SelfLoop
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    /// Opposite endpoint of `id`, if the edge touches it
    pub fn other(&self, id: NodeId) -> Option<NodeId> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Interval lookup over canonical node spans
///
/// Used for endpoints that were not canonicalized together with the node
/// set, e.g. when mapping a new dataset onto a stored node table.
#[derive(Debug)]
pub struct NodeLocator {
    partitions: HashMap<PartitionKey, Lapper<u64, usize>>,
    nodes: Vec<(NodeId, GenomicInterval)>,
}

impl NodeLocator {
    pub fn new(nodes: &[CanonicalNode]) -> Self {
        let mut grouped: HashMap<PartitionKey, Vec<Interval<u64, usize>>> = HashMap::new();
        let mut spans = Vec::with_capacity(nodes.len());

        for (pos, node) in nodes.iter().enumerate() {
            grouped
                .entry(node.interval.partition_key())
                .or_default()
                .push(Interval {
                    start: node.interval.start(),
                    stop: node.interval.end(),
                    val: pos,
                });
            spans.push((node.id, node.interval.clone()));
        }

        let partitions = grouped
            .into_iter()
            .map(|(key, intervals)| (key, Lapper::new(intervals)))
            .collect();

        Self {
            partitions,
            nodes: spans,
        }
    }

    /// Best node for an interval
    ///
    /// Preference: identical span, then the smallest containing node, then
    /// the largest overlap; ties go to the lowest id. Overlaps shorter than
    /// `min_overlap` (at least 1 bp) do not count.
    pub fn locate(&self, interval: &GenomicInterval, min_overlap: u64) -> Option<NodeId> {
        let threshold = min_overlap.max(1);
        let strands: &[Strand] = match interval.strand() {
            Strand::Plus => &[Strand::Plus, Strand::Unknown],
            Strand::Minus => &[Strand::Minus, Strand::Unknown],
            Strand::Unknown => &[Strand::Plus, Strand::Minus, Strand::Unknown],
        };

        let mut best: Option<(u8, u64, NodeId)> = None;
        for &strand in strands {
            let key = PartitionKey::new(interval.chrom(), strand);
            let Some(lapper) = self.partitions.get(&key) else {
                continue;
            };
            for hit in lapper.find(interval.start(), interval.end()) {
                let (id, span) = &self.nodes[hit.val];
                let overlap = span.overlap_len(interval);
                if overlap < threshold {
                    continue;
                }
                let rank = if span.same_span(interval) {
                    (0, 0, *id)
                } else if span.contains(interval) {
                    (1, span.len(), *id)
                } else {
                    (2, u64::MAX - overlap, *id)
                };
                if best.map_or(true, |b| rank < b) {
                    best = Some(rank);
                }
            }
        }
        best.map(|(_, _, id)| id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One record mapped onto a node pair
#[derive(Debug)]
struct Observation {
    pair: (NodeId, NodeId),
    weight: f64,
    source: Option<String>,
}

/// Outcome of resolving one record
#[derive(Debug)]
enum RecordOutcome {
    Mapped(Observation),
    Rejected(LookupError),
}

/// Result of an edge resolution pass
#[derive(Debug, Clone, Default)]
pub struct EdgeResolution {
    /// Merged edges sorted by (source, target)
    pub edges: Vec<Edge>,
    /// One entry per rejected record, in record order
    pub rejected: Vec<LookupError>,
    pub record_count: usize,
    /// Records whose self-loop was discarded by configuration
    pub dropped_self_loops: usize,
}

impl EdgeResolution {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn self_loop_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_self_loop()).count()
    }

    /// Fraction of records that could not be mapped
    pub fn rejection_rate(&self) -> f64 {
        if self.record_count == 0 {
            0.0
        } else {
            self.rejected.len() as f64 / self.record_count as f64
        }
    }
}

/// Maps records onto canonical node pairs
pub struct EdgeResolver<'a> {
    table: &'a NodeTable,
    locator: NodeLocator,
    min_overlap: u64,
    include_self_loops: bool,
}

impl<'a> EdgeResolver<'a> {
    pub fn new(table: &'a NodeTable, min_overlap: u64, include_self_loops: bool) -> Self {
        Self {
            table,
            locator: NodeLocator::new(table.nodes()),
            min_overlap,
            include_self_loops,
        }
    }

    /// Node for one endpoint of record `record`
    pub fn endpoint_node(&self, record: usize, side: Side, interval: &GenomicInterval) -> Result<NodeId, LookupError> {
        self.table
            .node_of(EndpointRef::new(record, side))
            .or_else(|| self.locator.locate(interval, self.min_overlap))
            .ok_or_else(|| LookupError::UnmappedEndpoint {
                record,
                side,
                interval: interval.to_string(),
            })
    }

    fn resolve_record(&self, record: usize, rec: &RawInteractionRecord) -> RecordOutcome {
        let left = match self.endpoint_node(record, Side::Left, rec.left()) {
            Ok(id) => id,
            Err(e) => return RecordOutcome::Rejected(e),
        };
        let right = match self.endpoint_node(record, Side::Right, rec.right()) {
            Ok(id) => id,
            Err(e) => return RecordOutcome::Rejected(e),
        };
        let pair = if left <= right { (left, right) } else { (right, left) };
        RecordOutcome::Mapped(Observation {
            pair,
            weight: rec.effective_weight(),
            source: rec.source().map(str::to_string),
        })
    }

    /// Resolve every record and merge edges
    ///
    /// Chunks are resolved in parallel on the current rayon pool and
    /// merged in record order.
    pub fn resolve(&self, records: &[RawInteractionRecord]) -> EdgeResolution {
        let outcomes: Vec<Vec<RecordOutcome>> = records
            .par_chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let base = chunk_idx * CHUNK_SIZE;
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, rec)| self.resolve_record(base + i, rec))
                    .collect()
            })
            .collect();

        let mut rejected = Vec::new();
        let mut dropped_self_loops = 0;
        let mut grouped: BTreeMap<(NodeId, NodeId), (Vec<f64>, BTreeSet<String>)> = BTreeMap::new();

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                RecordOutcome::Mapped(obs) => {
                    if obs.pair.0 == obs.pair.1 && !self.include_self_loops {
                        dropped_self_loops += 1;
                        continue;
                    }
                    let (weights, provenance) = grouped.entry(obs.pair).or_default();
                    weights.push(obs.weight);
                    if let Some(source) = obs.source {
                        provenance.insert(source);
                    }
                }
                RecordOutcome::Rejected(err) => {
                    if rejected.len() < MAX_REJECTION_WARNINGS {
                        warn!("Dropping interaction: {}", err);
                    }
                    rejected.push(err);
                }
            }
        }

        if rejected.len() > MAX_REJECTION_WARNINGS {
            warn!(
                "{} further interactions dropped with unmapped endpoints",
                rejected.len() - MAX_REJECTION_WARNINGS
            );
        }

        let edges: Vec<Edge> = grouped
            .into_iter()
            .map(|((a, b), (mut weights, provenance))| {
                weights.sort_by(f64::total_cmp);
                let observations = weights.len();
                let mut edge = Edge::new(a, b, weights.iter().sum()).with_observations(observations);
                edge.provenance = provenance;
                edge
            })
            .collect();

        debug!(
            "Resolved {} records into {} edges ({} rejected, {} self-loops dropped)",
            records.len(),
            edges.len(),
            rejected.len(),
            dropped_self_loops
        );

        EdgeResolution {
            edges,
            rejected,
            record_count: records.len(),
            dropped_self_loops,
        }
    }
}
