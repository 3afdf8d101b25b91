//! Genomic interval and interaction record types
//!
//! All coordinates are 0-based, half-open `[start, end)`. Intervals are
//! validated once at construction and are immutable afterwards.

use crate::core::error::{ValidationError, ValidationResult};
use std::cmp::Ordering;
use std::fmt;

/// Strand orientation
///
/// `Unknown` acts as a wildcard at overlap-query time: it is compatible
/// with both `Plus` and `Minus`, but it is never folded into either
/// partition of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Strand {
    Plus,
    Minus,
    #[default]
    Unknown,
}

impl Strand {
    /// Parse strand from char
    ///
    /// # Examples
    /// ```
    /// use intergraph::core::Strand;
    /// assert_eq!(Strand::from_char('+'), Some(Strand::Plus));
    /// assert_eq!(Strand::from_char('-'), Some(Strand::Minus));
    /// assert_eq!(Strand::from_char('.'), Some(Strand::Unknown));
    /// assert_eq!(Strand::from_char('x'), None);
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            '.' | '*' | '?' => Some(Strand::Unknown),
            _ => None,
        }
    }

    /// Parse a strand token, rejecting anything unrecognised
    pub fn parse(token: &str) -> ValidationResult<Self> {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_char(c).ok_or_else(|| ValidationError::InvalidStrand(token.to_string()))
            }
            _ => Err(ValidationError::InvalidStrand(token.to_string())),
        }
    }

    /// Convert to char
    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
            Strand::Unknown => '.',
        }
    }

    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Strand::Unknown)
    }

    /// Whether two strands may overlap
    ///
    /// # Examples
    /// ```
    /// use intergraph::core::Strand;
    /// assert!(Strand::Plus.is_compatible(Strand::Unknown));
    /// assert!(Strand::Unknown.is_compatible(Strand::Minus));
    /// assert!(!Strand::Plus.is_compatible(Strand::Minus));
    /// ```
    #[inline]
    pub fn is_compatible(&self, other: Strand) -> bool {
        *self == other || self.is_unknown() || other.is_unknown()
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Check a chromosome token: non-empty, no whitespace
pub fn validate_chrom(chrom: &str) -> ValidationResult<()> {
    if chrom.is_empty() || chrom.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidChromosome(chrom.to_string()));
    }
    Ok(())
}

/// Check a provenance tag
///
/// Tags are written as comma-separated lists inside tab-separated tables,
/// with `.` for an empty list, so those characters cannot appear in a tag.
pub fn validate_tag(tag: &str) -> ValidationResult<()> {
    if tag.is_empty() || tag == "." || tag.contains(['\t', '\n', '\r', ',']) {
        return Err(ValidationError::InvalidTag(tag.to_string()));
    }
    Ok(())
}

/// A validated genomic interval
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    chrom: String,
    start: u64,
    end: u64,
    strand: Strand,
}

impl GenomicInterval {
    /// Create a new interval
    ///
    /// Fails with `ValidationError` if `end <= start` or the chromosome
    /// token is malformed.
    ///
    /// # Examples
    /// ```
    /// use intergraph::core::{GenomicInterval, Strand};
    /// assert!(GenomicInterval::new("chr1", 100, 200, Strand::Plus).is_ok());
    /// assert!(GenomicInterval::new("chr1", 100, 100, Strand::Plus).is_err());
    /// assert!(GenomicInterval::new("", 100, 200, Strand::Plus).is_err());
    /// ```
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Strand) -> ValidationResult<Self> {
        let chrom = chrom.into();
        validate_chrom(&chrom)?;
        if end <= start {
            return Err(ValidationError::EmptyRange { chrom, start, end });
        }
        Ok(Self {
            chrom,
            start,
            end,
            strand,
        })
    }

    /// Create an interval from signed coordinates, rejecting negatives
    pub fn from_signed(chrom: impl Into<String>, start: i64, end: i64, strand: Strand) -> ValidationResult<Self> {
        let chrom = chrom.into();
        for value in [start, end] {
            if value < 0 {
                return Err(ValidationError::NegativeCoordinate { chrom, value });
            }
        }
        Self::new(chrom, start as u64, end as u64, strand)
    }

    #[inline]
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Length in base pairs (always > 0)
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Never true for a validated interval
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Partition this interval belongs to
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.chrom.clone(), self.strand)
    }

    /// Shared base pairs with another interval on the same chromosome
    ///
    /// Strand is ignored; callers decide strand compatibility.
    #[inline]
    pub fn overlap_len(&self, other: &GenomicInterval) -> u64 {
        if self.chrom != other.chrom {
            return 0;
        }
        self.end.min(other.end).saturating_sub(self.start.max(other.start))
    }

    /// Overlap test with a minimum shared length
    ///
    /// With `min_overlap == 0` book-ended intervals (`a.end == b.start`)
    /// count as adjacent; otherwise at least `min_overlap` shared base
    /// pairs are required.
    #[inline]
    pub fn overlaps_by(&self, other: &GenomicInterval, min_overlap: u64) -> bool {
        self.chrom == other.chrom && ranges_overlap(self.start, self.end, other.start, other.end, min_overlap)
    }

    /// Whether `other` lies fully inside this interval
    #[inline]
    pub fn contains(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start <= other.start && other.end <= self.end
    }

    /// Jaccard index of two intervals (intersection over union span)
    ///
    /// # Examples
    /// ```
    /// use intergraph::core::{GenomicInterval, Strand};
    /// let a = GenomicInterval::new("chr1", 0, 100, Strand::Plus).unwrap();
    /// let b = GenomicInterval::new("chr1", 50, 150, Strand::Plus).unwrap();
    /// assert!((a.jaccard(&b) - 1.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn jaccard(&self, other: &GenomicInterval) -> f64 {
        let intersection = self.overlap_len(other);
        if intersection == 0 {
            return 0.0;
        }
        let union = self.end.max(other.end) - self.start.min(other.start);
        intersection as f64 / union as f64
    }

    /// Same chromosome and coordinates; strand is not compared
    #[inline]
    pub fn same_span(&self, other: &GenomicInterval) -> bool {
        self.chrom == other.chrom && self.start == other.start && self.end == other.end
    }

    /// Copy with a different strand
    pub fn with_strand(&self, strand: Strand) -> Self {
        Self {
            chrom: self.chrom.clone(),
            start: self.start,
            end: self.end,
            strand,
        }
    }

    /// Build from trusted, already validated parts
    pub(crate) fn from_span(chrom: &str, start: u64, end: u64, strand: Strand) -> Self {
        debug_assert!(end > start);
        Self {
            chrom: chrom.to_string(),
            start,
            end,
            strand,
        }
    }
}

/// Half-open range overlap with a minimum shared length
#[inline]
pub fn ranges_overlap(start1: u64, end1: u64, start2: u64, end2: u64, min_overlap: u64) -> bool {
    let lo = start1.max(start2);
    let hi = end1.min(end2);
    if min_overlap == 0 {
        hi >= lo
    } else {
        hi > lo && hi - lo >= min_overlap
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.chrom, self.start, self.end, self.strand)
    }
}

/// Canonical order: chromosome, strand, start, end
impl Ord for GenomicInterval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then(self.strand.cmp(&other.strand))
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for GenomicInterval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// (chromosome, strand) group key
///
/// Ordered by chromosome name, then `+`, `-`, unknown.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub chrom: String,
    pub strand: Strand,
}

impl PartitionKey {
    pub fn new(chrom: impl Into<String>, strand: Strand) -> Self {
        Self {
            chrom: chrom.into(),
            strand,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.chrom, self.strand)
    }
}

/// Which end of an interaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Reference from an indexed interval back to its record endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointRef {
    pub record: usize,
    pub side: Side,
}

impl EndpointRef {
    pub fn new(record: usize, side: Side) -> Self {
        Self { record, side }
    }
}

/// An observed pairing of two genomic intervals
#[derive(Debug, Clone, PartialEq)]
pub struct RawInteractionRecord {
    left: GenomicInterval,
    right: GenomicInterval,
    source: Option<String>,
    weight: Option<f64>,
}

impl RawInteractionRecord {
    pub fn new(left: GenomicInterval, right: GenomicInterval) -> Self {
        Self {
            left,
            right,
            source: None,
            weight: None,
        }
    }

    /// Attach a provenance tag (experiment or dataset identifier)
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach an explicit score; must be finite and non-negative
    pub fn with_weight(mut self, weight: f64) -> ValidationResult<Self> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::InvalidWeight(weight));
        }
        self.weight = Some(weight);
        Ok(self)
    }

    #[inline]
    pub fn left(&self) -> &GenomicInterval {
        &self.left
    }

    #[inline]
    pub fn right(&self) -> &GenomicInterval {
        &self.right
    }

    #[inline]
    pub fn endpoint(&self, side: Side) -> &GenomicInterval {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Check the provenance tag, if any
    pub fn validate_source(&self) -> ValidationResult<()> {
        match &self.source {
            Some(tag) => validate_tag(tag),
            None => Ok(()),
        }
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Weight contributed to an edge: the explicit score, or 1
    #[inline]
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}
