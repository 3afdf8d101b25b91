//! InterGraph CLI entry point
//!
//! Builds interaction graphs from pairs tables and inspects stored graphs.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use intergraph::core::{BuildConfig, GraphBuilder, MergeStrategy, UnknownStrandPolicy, DEFAULT_MAX_REJECTION_RATE};
use intergraph::formats::{pairs, tables};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Merge relation for overlapping intervals (CLI enum)
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum MergeArg {
    /// Overlapping intervals merge into their union span
    #[default]
    #[value(name = "union-span")]
    UnionSpan,
    /// Only identical coordinates merge
    #[value(name = "strict-exact")]
    StrictExact,
}

impl From<MergeArg> for MergeStrategy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::UnionSpan => MergeStrategy::UnionSpan,
            MergeArg::StrictExact => MergeStrategy::StrictExact,
        }
    }
}

/// Handling of strand-unknown intervals (CLI enum)
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum UnknownStrandArg {
    /// Merge into overlapping stranded nodes, `+` before `-`
    #[default]
    #[value(name = "first-explored")]
    FirstExplored,
    /// Keep as separate nodes
    #[value(name = "isolate")]
    Isolate,
}

impl From<UnknownStrandArg> for UnknownStrandPolicy {
    fn from(arg: UnknownStrandArg) -> Self {
        match arg {
            UnknownStrandArg::FirstExplored => UnknownStrandPolicy::FirstExplored,
            UnknownStrandArg::Isolate => UnknownStrandPolicy::Isolate,
        }
    }
}

#[derive(Parser)]
#[command(name = "intergraph")]
#[command(about = "Build interaction graphs from genomic interval pairs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from one or more pairs tables
    Build {
        /// Pairs tables (plain, .gz or .bz2); untagged records are tagged with the file name
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output prefix for <prefix>.nodes.tsv and <prefix>.edges.tsv
        #[arg(short = 'o', long)]
        output: PathBuf,
        /// Merge strategy
        #[arg(long, default_value = "union-span")]
        merge: MergeArg,
        /// Minimum shared bases to count as overlap (0 joins book-ended intervals)
        #[arg(long, default_value = "1")]
        min_overlap: u64,
        /// Drop self-loop edges
        #[arg(long)]
        no_self_loops: bool,
        /// Abort when the fraction of unmappable records exceeds this value
        #[arg(long, default_value_t = DEFAULT_MAX_REJECTION_RATE)]
        max_rejection_rate: f64,
        /// Strand-unknown interval policy
        #[arg(long, default_value = "first-explored")]
        unknown_strand: UnknownStrandArg,
        /// Only accept these chromosomes (comma-separated)
        #[arg(long, value_delimiter = ',')]
        chromosomes: Option<Vec<String>>,
        /// Number of threads (0: number of CPUs)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
        /// Keep only the largest connected component
        #[arg(long)]
        largest_component: bool,
        /// Drop nodes with fewer incident edges
        #[arg(long)]
        min_degree: Option<usize>,
        /// Gzip the output tables
        #[arg(long)]
        gzip: bool,
    },
    /// Print summary and per-source statistics of a stored graph
    Describe {
        /// Node table
        nodes: PathBuf,
        /// Edge table
        edges: PathBuf,
    },
    /// List connected components of a stored graph
    Components {
        /// Node table
        nodes: PathBuf,
        /// Edge table
        edges: PathBuf,
        /// Skip components with fewer nodes
        #[arg(long, default_value = "1")]
        min_size: usize,
    },
}

fn dataset_tag(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("dataset");
    let mut tag = name;
    for ext in [".gz", ".bz2", ".tsv", ".txt", ".pairs"] {
        tag = tag.strip_suffix(ext).unwrap_or(tag);
    }
    tag.to_string()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Build {
            inputs,
            output,
            merge,
            min_overlap,
            no_self_loops,
            max_rejection_rate,
            unknown_strand,
            chromosomes,
            threads,
            largest_component,
            min_degree,
            gzip,
        } => {
            let mut config = BuildConfig::new()
                .with_merge_strategy(merge.into())
                .with_min_overlap(min_overlap)
                .with_self_loops(!no_self_loops)
                .with_max_rejection_rate(max_rejection_rate)
                .with_unknown_strand_policy(unknown_strand.into())
                .with_threads(threads);
            if let Some(chromosomes) = chromosomes {
                config = config.with_chromosomes(chromosomes);
            }
            config.validate()?;

            let mut builder = GraphBuilder::new(config);
            for input in &inputs {
                let records = pairs::read_pairs_file(input).with_context(|| format!("Failed to read {}", input.display()))?;
                let tag = dataset_tag(input);
                let added = builder
                    .add_dataset(&tag, records)
                    .with_context(|| format!("Rejected record in {}", input.display()))?;
                eprintln!("Loaded {} records from {:?} (tag {})", added, input, tag);
            }

            let (mut graph, report) = builder.build()?;
            if let Some(min_degree) = min_degree {
                graph = graph.subgraph_by_degree(min_degree);
            }
            if largest_component {
                graph = graph.largest_component();
            }

            let (nodes_path, edges_path) = tables::table_paths(&output, gzip);
            tables::write_graph(&graph, &nodes_path, &edges_path)?;

            eprintln!("\n=== Construction Report ===");
            eprintln!("{}", report);
            if min_degree.is_some() || largest_component {
                eprintln!("Written nodes:      {}", graph.node_count());
                eprintln!("Written edges:      {}", graph.edge_count());
            }
            eprintln!("Time elapsed:       {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Describe { nodes, edges } => {
            let graph = tables::read_graph(&nodes, &edges)?;
            println!("{}", graph.summary());

            let stats = graph.provenance_stats();
            if !stats.is_empty() {
                println!("\nsource\tedges\tnodes\tweight");
                for (tag, s) in &stats {
                    println!("{}\t{}\t{}\t{}", tag, s.edges, s.nodes, s.weight);
                }
            }
        }

        Commands::Components { nodes, edges, min_size } => {
            let graph = tables::read_graph(&nodes, &edges)?;
            println!("#component\tsize\tnodes");
            for (i, component) in graph
                .connected_components()
                .filter(|c| c.len() >= min_size)
                .enumerate()
            {
                let ids: Vec<String> = component.iter().map(|id| id.to_string()).collect();
                println!("{}\t{}\t{}", i, component.len(), ids.join(","));
            }
        }
    }

    Ok(())
}
