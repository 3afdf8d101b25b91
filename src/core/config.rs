//! Construction options
//!
//! `BuildConfig` carries every recognised option of a graph build. It is a
//! plain value: callers start from `Default` and adjust with `with_*`.

use crate::core::error::{ValidationError, ValidationResult};
use std::collections::BTreeSet;

/// Merge relation used by canonicalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Overlapping intervals are connected; a node spans its members'
    /// union (min start, max end), possibly covering unobserved gaps
    #[default]
    UnionSpan,
    /// Only literally identical coordinates merge
    StrictExact,
}

impl MergeStrategy {
    /// Parse from an option token
    ///
    /// # Examples
    /// ```
    /// use intergraph::core::MergeStrategy;
    /// assert_eq!(MergeStrategy::parse("union-span"), Some(MergeStrategy::UnionSpan));
    /// assert_eq!(MergeStrategy::parse("strict-exact"), Some(MergeStrategy::StrictExact));
    /// assert_eq!(MergeStrategy::parse("fuzzy"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "union-span" | "union" => Some(MergeStrategy::UnionSpan),
            "strict-exact" | "exact" => Some(MergeStrategy::StrictExact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::UnionSpan => "union-span",
            MergeStrategy::StrictExact => "strict-exact",
        }
    }
}

/// How strand-unknown components are reconciled with stranded ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownStrandPolicy {
    /// Merge into the first side explored in chromosome order (`+`
    /// before `-`) that the component overlaps
    #[default]
    FirstExplored,
    /// Keep strand-unknown components as their own nodes
    Isolate,
}

impl UnknownStrandPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "first-explored" | "first" => Some(UnknownStrandPolicy::FirstExplored),
            "isolate" | "separate" => Some(UnknownStrandPolicy::Isolate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownStrandPolicy::FirstExplored => "first-explored",
            UnknownStrandPolicy::Isolate => "isolate",
        }
    }
}

/// Default ceiling on the fraction of records whose endpoints fail to map
pub const DEFAULT_MAX_REJECTION_RATE: f64 = 0.05;

/// Options for one graph construction
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub merge_strategy: MergeStrategy,
    /// Keep edges whose endpoints canonicalize to the same node
    pub include_self_loops: bool,
    /// Minimum shared base pairs to count as overlap (0 = book-ended)
    pub min_overlap: u64,
    /// Abort when rejected / total records exceeds this fraction
    pub max_rejection_rate: f64,
    pub unknown_strand_policy: UnknownStrandPolicy,
    /// Worker threads; 0 uses the rayon default
    pub threads: usize,
    /// Optional chromosome allow-list applied at ingestion
    pub chromosomes: Option<BTreeSet<String>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::default(),
            include_self_loops: true,
            min_overlap: 1,
            max_rejection_rate: DEFAULT_MAX_REJECTION_RATE,
            unknown_strand_policy: UnknownStrandPolicy::default(),
            threads: 0,
            chromosomes: None,
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    pub fn with_self_loops(mut self, include: bool) -> Self {
        self.include_self_loops = include;
        self
    }

    pub fn with_min_overlap(mut self, min_overlap: u64) -> Self {
        self.min_overlap = min_overlap;
        self
    }

    pub fn with_max_rejection_rate(mut self, rate: f64) -> Self {
        self.max_rejection_rate = rate;
        self
    }

    pub fn with_unknown_strand_policy(mut self, policy: UnknownStrandPolicy) -> Self {
        self.unknown_strand_policy = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_chromosomes<I, S>(mut self, chromosomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chromosomes = Some(chromosomes.into_iter().map(Into::into).collect());
        self
    }

    /// Check option ranges
    pub fn validate(&self) -> ValidationResult<()> {
        if !(0.0..=1.0).contains(&self.max_rejection_rate) {
            return Err(ValidationError::InvalidConfig(format!(
                "max_rejection_rate must be within [0, 1], got {}",
                self.max_rejection_rate
            )));
        }
        if let Some(chromosomes) = &self.chromosomes {
            if chromosomes.is_empty() {
                return Err(ValidationError::InvalidConfig(
                    "chromosome allow-list is empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Apply the chromosome allow-list
    pub fn check_chromosome(&self, chrom: &str) -> ValidationResult<()> {
        match &self.chromosomes {
            Some(allowed) if !allowed.contains(chrom) => {
                Err(ValidationError::UnknownChromosome(chrom.to_string()))
            }
            _ => Ok(()),
        }
    }
}
