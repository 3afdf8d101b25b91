//! Interaction pairs table reader
//!
//! Tab-separated, one interaction per line:
//!
//! ```text
//! chrom1  start1  end1  strand1  chrom2  start2  end2  strand2  [source]  [score]
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. Coordinates are
//! 0-based half-open. `.` in the source or score column means absent.

use crate::core::ValidationError;
use crate::core::interval::{validate_tag, GenomicInterval, RawInteractionRecord, Strand};
use crate::core::io::{open_reader, LineIterator};
use memchr::memchr_iter;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Required columns
const MIN_FIELDS: usize = 8;

#[derive(Debug, Error)]
pub enum PairsParseError {
    #[error("line {line}: too few fields: expected at least {expected}, found {found}")]
    TooFewFields { line: usize, expected: usize, found: usize },

    #[error("line {line}: invalid number in field {field}: {value:?}")]
    InvalidNumber {
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

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PairsParseError {
    /// Line number of a parse failure
    pub fn line(&self) -> Option<usize> {
        match self {
            PairsParseError::TooFewFields { line, .. }
            | PairsParseError::InvalidNumber { line, .. }
            | PairsParseError::InvalidRecord { line, .. } => Some(*line),
            PairsParseError::Io(_) => None,
        }
    }
}

/// Borrowed view of one pairs line, split on tabs
pub struct PairsRecordView<'a> {
    line: &'a str,
    bounds: Vec<(usize, usize)>,
}

impl<'a> PairsRecordView<'a> {
    pub fn new(line: &'a str) -> Self {
        let bytes = line.as_bytes();
        let mut bounds = Vec::with_capacity(10);
        let mut start = 0;
        for tab in memchr_iter(b'\t', bytes) {
            bounds.push((start, tab));
            start = tab + 1;
        }
        bounds.push((start, bytes.len()));
        Self { line, bounds }
    }

    pub fn field_count(&self) -> usize {
        self.bounds.len()
    }

    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.bounds.get(index).map(|&(s, e)| &self.line[s..e])
    }

    /// Optional column: missing, empty and `.` all mean absent
    fn optional(&self, index: usize) -> Option<&'a str> {
        self.field(index).map(str::trim).filter(|v| !v.is_empty() && *v != ".")
    }
}

fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_coord(view: &PairsRecordView<'_>, index: usize, field: &'static str, line_no: usize) -> Result<i64, PairsParseError> {
    let value = view.field(index).unwrap_or("").trim();
    value.parse().map_err(|_| PairsParseError::InvalidNumber {
        line: line_no,
        field,
        value: value.to_string(),
    })
}

fn parse_interval(
    view: &PairsRecordView<'_>,
    offset: usize,
    names: [&'static str; 2],
    line_no: usize,
) -> Result<GenomicInterval, PairsParseError> {
    let invalid = |source| PairsParseError::InvalidRecord { line: line_no, source };
    let chrom = view.field(offset).unwrap_or("").trim();
    let start = parse_coord(view, offset + 1, names[0], line_no)?;
    let end = parse_coord(view, offset + 2, names[1], line_no)?;
    let strand = Strand::parse(view.field(offset + 3).unwrap_or("").trim()).map_err(invalid)?;
    GenomicInterval::from_signed(chrom, start, end, strand).map_err(invalid)
}

/// Parse one line; `Ok(None)` for comments and blank lines
pub fn parse_pairs_line(line: &str, line_no: usize) -> Result<Option<RawInteractionRecord>, PairsParseError> {
    if is_skippable(line) {
        return Ok(None);
    }

    let view = PairsRecordView::new(line);
    if view.field_count() < MIN_FIELDS {
        return Err(PairsParseError::TooFewFields {
            line: line_no,
            expected: MIN_FIELDS,
            found: view.field_count(),
        });
    }

    let left = parse_interval(&view, 0, ["start1", "end1"], line_no)?;
    let right = parse_interval(&view, 4, ["start2", "end2"], line_no)?;
    let mut record = RawInteractionRecord::new(left, right);

    if let Some(source) = view.optional(8) {
        validate_tag(source).map_err(|source| PairsParseError::InvalidRecord { line: line_no, source })?;
        record = record.with_source(source);
    }
    if let Some(score) = view.optional(9) {
        let weight: f64 = score.parse().map_err(|_| PairsParseError::InvalidNumber {
            line: line_no,
            field: "score",
            value: score.to_string(),
        })?;
        record = record
            .with_weight(weight)
            .map_err(|source| PairsParseError::InvalidRecord { line: line_no, source })?;
    }

    Ok(Some(record))
}

/// Read every record from a pairs stream
///
/// Stops at the first malformed line.
pub fn read_pairs<R: BufRead>(reader: R) -> Result<Vec<RawInteractionRecord>, PairsParseError> {
    let mut lines = LineIterator::new(reader);
    let mut records = Vec::new();
    loop {
        let line_no = lines.line_no() + 1;
        let Some(line) = lines.next_line() else {
            break;
        };
        let line = line?;
        if let Some(record) = parse_pairs_line(line, line_no)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Read a pairs file, plain or compressed
pub fn read_pairs_file(path: &Path) -> Result<Vec<RawInteractionRecord>, PairsParseError> {
    let records = read_pairs(open_reader(path)?)?;
    log::debug!("Read {} interaction records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_line() {
        let record = parse_pairs_line("chr1\t100\t200\t+\tchr2\t10\t20\t-", 1).unwrap().unwrap();
        assert_eq!(record.left().to_string(), "chr1:100-200(+)");
        assert_eq!(record.right().to_string(), "chr2:10-20(-)");
        assert_eq!(record.source(), None);
        assert_eq!(record.effective_weight(), 1.0);
    }

    #[test]
    fn test_parse_optional_columns() {
        let record = parse_pairs_line("chr1\t100\t200\t.\tchr2\t10\t20\t*\thic\t2.5", 1)
            .unwrap()
            .unwrap();
        assert_eq!(record.left().strand(), Strand::Unknown);
        assert_eq!(record.right().strand(), Strand::Unknown);
        assert_eq!(record.source(), Some("hic"));
        assert_eq!(record.weight(), Some(2.5));

        let dotted = parse_pairs_line("chr1\t1\t2\t+\tchr1\t5\t6\t+\t.\t.", 1).unwrap().unwrap();
        assert_eq!(dotted.source(), None);
        assert_eq!(dotted.weight(), None);
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        assert!(parse_pairs_line("# header", 1).unwrap().is_none());
        assert!(parse_pairs_line("   ", 2).unwrap().is_none());
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_pairs_line("chr1\t100\t200\t+", 7).unwrap_err();
        assert!(matches!(err, PairsParseError::TooFewFields { line: 7, found: 4, .. }));

        let err = parse_pairs_line("chr1\tabc\t200\t+\tchr2\t10\t20\t+", 3).unwrap_err();
        assert!(matches!(err, PairsParseError::InvalidNumber { line: 3, field: "start1", .. }));

        let err = parse_pairs_line("chr1\t-5\t200\t+\tchr2\t10\t20\t+", 4).unwrap_err();
        assert!(matches!(
            err,
            PairsParseError::InvalidRecord {
                line: 4,
                source: ValidationError::NegativeCoordinate { .. }
            }
        ));

        let err = parse_pairs_line("chr1\t100\t100\t+\tchr2\t10\t20\t+", 5).unwrap_err();
        assert!(matches!(
            err,
            PairsParseError::InvalidRecord {
                source: ValidationError::EmptyRange { .. },
                ..
            }
        ));

        let err = parse_pairs_line("chr1\t100\t200\tx\tchr2\t10\t20\t+", 6).unwrap_err();
        assert!(matches!(
            err,
            PairsParseError::InvalidRecord {
                source: ValidationError::InvalidStrand(_),
                ..
            }
        ));
        assert_eq!(err.line(), Some(6));

        let err = parse_pairs_line("chr1\t1\t2\t+\tchr1\t5\t6\t+\tA\t-1", 8).unwrap_err();
        assert!(matches!(
            err,
            PairsParseError::InvalidRecord {
                source: ValidationError::InvalidWeight(_),
                ..
            }
        ));
    }

    #[test]
    fn test_comma_in_source_column_rejected() {
        let err = parse_pairs_line("chr1\t1\t2\t+\tchr1\t5\t6\t+\tRed-C,RedChIP", 3).unwrap_err();
        assert!(matches!(
            err,
            PairsParseError::InvalidRecord {
                line: 3,
                source: ValidationError::InvalidTag(_),
            }
        ));
    }

    #[test]
    fn test_read_pairs_stream() {
        let data = "#chrom1\tstart1\tend1\tstrand1\tchrom2\tstart2\tend2\tstrand2\n\
                    chr1\t100\t200\t+\tchr2\t10\t20\t+\n\
                    \n\
                    chr1\t150\t250\t+\tchr3\t10\t20\t+\tA\n";
        let records = read_pairs(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source(), Some("A"));

        let broken = "chr1\t100\t200\t+\tchr2\t10\t20\t+\nchr1\t1\n";
        let err = read_pairs(broken.as_bytes()).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}
