//! Graph construction pipeline
//!
//! ```text
//! records -> IntervalIndex -> (parallel) cluster partitions
//!         -> reduce to NodeTable -> resolve edges -> InteractionGraph
//! ```
//!
//! Construction is all-or-nothing: any failure aborts with an error and
//! no partial graph is returned.

use crate::core::canonical::{Canonicalizer, NodeTable, PartitionClusters};
use crate::core::config::BuildConfig;
use crate::core::edges::{EdgeResolution, EdgeResolver};
use crate::core::error::{ConstructionError, ConstructionResult, Result, ValidationResult};
use crate::core::graph::InteractionGraph;
use crate::core::index::{IntervalIndex, Partition};
use crate::core::interval::{validate_tag, RawInteractionRecord};
use log::{debug, info};
use rayon::prelude::*;
use std::fmt;

/// Counters reported after a successful construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructionReport {
    pub node_count: usize,
    pub edge_count: usize,
    /// Records dropped because an endpoint mapped to no node
    pub rejected_edge_count: usize,
    /// Self-loop edges present in the graph
    pub self_loop_count: usize,
    pub record_count: usize,
    pub interval_count: usize,
    /// Self-loop records discarded because self-loops were disabled
    pub dropped_self_loop_count: usize,
    /// Strand-unknown clusters folded into stranded nodes
    pub unknown_strand_merged: usize,
}

impl fmt::Display for ConstructionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records:            {}", self.record_count)?;
        writeln!(f, "Intervals:          {}", self.interval_count)?;
        writeln!(f, "Nodes:              {}", self.node_count)?;
        writeln!(f, "Edges:              {}", self.edge_count)?;
        writeln!(f, "Self-loops:         {}", self.self_loop_count)?;
        writeln!(f, "Self-loops dropped: {}", self.dropped_self_loop_count)?;
        writeln!(f, "Rejected records:   {}", self.rejected_edge_count)?;
        write!(f, "Unknown strand merged: {}", self.unknown_strand_merged)
    }
}

/// Accumulates interaction records and builds the graph
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: BuildConfig,
    records: Vec<RawInteractionRecord>,
}

impl GraphBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn records(&self) -> &[RawInteractionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ingest one record
    ///
    /// Records on chromosomes outside the allow-list, or with a malformed
    /// provenance tag, are rejected here.
    pub fn add_record(&mut self, record: RawInteractionRecord) -> ValidationResult<()> {
        self.check_record(&record)?;
        self.records.push(record);
        Ok(())
    }

    fn check_record(&self, record: &RawInteractionRecord) -> ValidationResult<()> {
        self.config.check_chromosome(record.left().chrom())?;
        self.config.check_chromosome(record.right().chrom())?;
        record.validate_source()
    }

    /// Ingest a dataset, tagging untagged records with `tag`
    ///
    /// Returns the number of records added. Nothing is added on error.
    pub fn add_dataset<I>(&mut self, tag: &str, records: I) -> ValidationResult<usize>
    where
        I: IntoIterator<Item = RawInteractionRecord>,
    {
        validate_tag(tag)?;
        let mut staged = Vec::new();
        for record in records {
            self.check_record(&record)?;
            let record = if record.source().is_none() {
                record.with_source(tag)
            } else {
                record
            };
            staged.push(record);
        }
        let added = staged.len();
        self.records.extend(staged);
        debug!("Dataset {}: {} records", tag, added);
        Ok(added)
    }

    /// Build the graph from all ingested records
    pub fn build(&self) -> Result<(InteractionGraph, ConstructionReport)> {
        self.config.validate()?;
        let pool = thread_pool(self.config.threads)?;
        let result = pool.install(|| self.build_in_pool())?;
        Ok(result)
    }

    fn build_in_pool(&self) -> ConstructionResult<(InteractionGraph, ConstructionReport)> {
        let index = IntervalIndex::from_records(&self.records);
        info!(
            "Indexed {} intervals from {} records in {} partitions",
            index.len(),
            self.records.len(),
            index.partition_count()
        );

        let canonicalizer = Canonicalizer::new(&self.config);
        let partitions: Vec<&Partition> = index.partitions().collect();
        let clustered = partitions
            .par_iter()
            .map(|p| canonicalizer.cluster_partition(p))
            .collect::<ConstructionResult<Vec<PartitionClusters>>>()?;

        let table = canonicalizer.reduce(&partitions, clustered)?;
        info!(
            "Canonicalized into {} nodes ({})",
            table.len(),
            canonicalizer.strategy().as_str()
        );

        let resolution = EdgeResolver::new(&table, self.config.min_overlap, self.config.include_self_loops)
            .resolve(&self.records);
        check_rejection_rate(&resolution, self.config.max_rejection_rate)?;

        let unknown_strand_merged = table.stats().unknown_merged;
        let interval_count = table.stats().intervals;
        let (graph, report) = finish(table, resolution);
        let report = ConstructionReport {
            interval_count,
            unknown_strand_merged,
            ..report
        };
        info!(
            "Built graph: {} nodes, {} edges, {} rejected",
            report.node_count, report.edge_count, report.rejected_edge_count
        );
        Ok((graph, report))
    }
}

/// Map records onto an existing node set
///
/// Endpoints are located by overlap against the stored node spans; no new
/// nodes are created. Unmatched records count as rejected.
pub fn resolve_onto(
    table: NodeTable,
    records: &[RawInteractionRecord],
    config: &BuildConfig,
) -> Result<(InteractionGraph, ConstructionReport)> {
    config.validate()?;
    for record in records {
        record.validate_source()?;
    }
    let pool = thread_pool(config.threads)?;
    let resolution = pool.install(|| {
        EdgeResolver::new(&table, config.min_overlap, config.include_self_loops).resolve(records)
    });
    check_rejection_rate(&resolution, config.max_rejection_rate)?;
    let (graph, report) = finish(table, resolution);
    info!(
        "Mapped {} records onto {} nodes: {} edges, {} rejected",
        report.record_count, report.node_count, report.edge_count, report.rejected_edge_count
    );
    Ok((graph, report))
}

/// Build a graph from records in one call
pub fn build_graph(
    records: Vec<RawInteractionRecord>,
    config: &BuildConfig,
) -> Result<(InteractionGraph, ConstructionReport)> {
    let mut builder = GraphBuilder::new(config.clone());
    for record in records {
        builder.add_record(record)?;
    }
    builder.build()
}

fn thread_pool(threads: usize) -> ConstructionResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ConstructionError::ThreadPool(e.to_string()))
}

fn check_rejection_rate(resolution: &EdgeResolution, threshold: f64) -> ConstructionResult<()> {
    let rate = resolution.rejection_rate();
    if rate > threshold {
        return Err(ConstructionError::RejectionRateExceeded {
            rejected: resolution.rejected_count(),
            total: resolution.record_count,
            rate,
            threshold,
        });
    }
    Ok(())
}

fn finish(table: NodeTable, resolution: EdgeResolution) -> (InteractionGraph, ConstructionReport) {
    let report = ConstructionReport {
        node_count: table.len(),
        edge_count: resolution.edges.len(),
        rejected_edge_count: resolution.rejected_count(),
        self_loop_count: resolution.self_loop_count(),
        record_count: resolution.record_count,
        interval_count: 0,
        dropped_self_loop_count: resolution.dropped_self_loops,
        unknown_strand_merged: 0,
    };
    let graph = InteractionGraph::assemble(table.into_nodes(), resolution.edges);
    (graph, report)
}
