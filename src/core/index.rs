//! Interval index for overlap queries
//!
//! Uses rust-lapper for O(log n + k) point queries and a sorted sweep with
//! an end-ordered active set for bulk overlap grouping.
//!
//! Intervals are grouped by (chromosome, strand). Strand-unknown intervals
//! live in their own partition and are only mixed with stranded ones at
//! query time, never stored in a stranded partition.

use crate::core::interval::{
    ranges_overlap, EndpointRef, GenomicInterval, PartitionKey, RawInteractionRecord, Side, Strand,
};
use rust_lapper::{Interval, Lapper};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Lapper interval whose value is a position in the partition entry list
pub type IndexedInterval = Interval<u64, usize>;

/// An indexed interval with a reference to the record endpoint it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub interval: GenomicInterval,
    pub endpoint: EndpointRef,
    /// Provenance tag of the originating record
    pub source: Option<String>,
}

impl IndexEntry {
    pub fn new(interval: GenomicInterval, endpoint: EndpointRef) -> Self {
        Self {
            interval,
            endpoint,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

/// All intervals of one (chromosome, strand) group
pub struct Partition {
    key: PartitionKey,
    entries: Vec<IndexEntry>,
    lapper: Lapper<u64, usize>,
}

impl Partition {
    /// Create an empty partition
    pub fn new(key: PartitionKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
            lapper: Lapper::new(Vec::new()),
        }
    }

    /// Build a partition from entries already known to share `key`
    pub fn from_entries(key: PartitionKey, entries: Vec<IndexEntry>) -> Self {
        let intervals: Vec<IndexedInterval> = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| Interval {
                start: entry.interval.start(),
                stop: entry.interval.end(),
                val: pos,
            })
            .collect();

        Self {
            key,
            entries,
            lapper: Lapper::new(intervals),
        }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, pos: usize) -> Option<&IndexEntry> {
        self.entries.get(pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one interval; returns its entry position
    pub fn insert(&mut self, entry: IndexEntry) -> usize {
        let pos = self.entries.len();
        self.lapper.insert(Interval {
            start: entry.interval.start(),
            stop: entry.interval.end(),
            val: pos,
        });
        self.entries.push(entry);
        pos
    }

    /// Entry positions overlapping `[start, end)` by at least `min_overlap`
    ///
    /// Results are in ascending entry-position order.
    pub fn find(&self, start: u64, end: u64, min_overlap: u64) -> Vec<usize> {
        // Widen by one base so book-ended intervals reach the filter
        let (lo, hi) = if min_overlap == 0 {
            (start.saturating_sub(1), end.saturating_add(1))
        } else {
            (start, end)
        };

        let mut hits: Vec<usize> = self
            .lapper
            .find(lo, hi)
            .filter(|iv| ranges_overlap(iv.start, iv.stop, start, end, min_overlap))
            .map(|iv| iv.val)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Entry positions sorted by (start, end, endpoint)
    fn sorted_positions(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            let ea = &self.entries[a];
            let eb = &self.entries[b];
            ea.interval
                .start()
                .cmp(&eb.interval.start())
                .then(ea.interval.end().cmp(&eb.interval.end()))
                .then(ea.endpoint.cmp(&eb.endpoint))
        });
        order
    }

    /// Connected components of the overlap relation
    ///
    /// Sweeps entries in start order keeping an active set ordered by end.
    /// Before visiting an interval, actives ending before
    /// `start + min_overlap` are retired: they cannot reach this interval
    /// or any later one. Every remaining active overlaps the current
    /// interval (when it is long enough) and all of them already share one
    /// component, so a single component id per active set suffices.
    ///
    /// Components are returned in order of their first (lowest-start)
    /// member; member positions keep sweep order.
    pub fn overlap_components(&self, min_overlap: u64) -> Vec<Vec<usize>> {
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut active: BinaryHeap<Reverse<u64>> = BinaryHeap::new();
        let mut current: Option<usize> = None;

        for pos in self.sorted_positions() {
            let interval = &self.entries[pos].interval;
            let threshold = interval.start().saturating_add(min_overlap);

            while let Some(&Reverse(end)) = active.peek() {
                if end >= threshold {
                    break;
                }
                active.pop();
            }
            if active.is_empty() {
                current = None;
            }

            if interval.end() < threshold {
                // Too short to share min_overlap bases with anything
                components.push(vec![pos]);
                continue;
            }

            match current {
                Some(component) => components[component].push(pos),
                None => {
                    current = Some(components.len());
                    components.push(vec![pos]);
                }
            }
            active.push(Reverse(interval.end()));
        }

        components
    }

    /// Groups of entries with literally identical coordinates
    pub fn exact_groups(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut last: Option<(u64, u64)> = None;

        for pos in self.sorted_positions() {
            let interval = &self.entries[pos].interval;
            let span = (interval.start(), interval.end());
            match groups.last_mut() {
                Some(group) if last == Some(span) => group.push(pos),
                _ => groups.push(vec![pos]),
            }
            last = Some(span);
        }

        groups
    }
}

/// Interval index organized by (chromosome, strand)
pub struct IntervalIndex {
    partitions: BTreeMap<PartitionKey, Partition>,
    len: usize,
}

impl IntervalIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
            len: 0,
        }
    }

    /// Build an index from both endpoints of every record
    pub fn from_records(records: &[RawInteractionRecord]) -> Self {
        let mut grouped: BTreeMap<PartitionKey, Vec<IndexEntry>> = BTreeMap::new();

        for (record_idx, record) in records.iter().enumerate() {
            for side in [Side::Left, Side::Right] {
                let interval = record.endpoint(side).clone();
                let entry = IndexEntry::new(interval, EndpointRef::new(record_idx, side))
                    .with_source(record.source().map(str::to_string));
                grouped.entry(entry.interval.partition_key()).or_default().push(entry);
            }
        }

        let len = grouped.values().map(Vec::len).sum();
        let partitions = grouped
            .into_iter()
            .map(|(key, entries)| (key.clone(), Partition::from_entries(key, entries)))
            .collect();

        Self { partitions, len }
    }

    /// Insert a single interval
    pub fn insert(&mut self, entry: IndexEntry) {
        let key = entry.interval.partition_key();
        self.partitions
            .entry(key.clone())
            .or_insert_with(|| Partition::new(key))
            .insert(entry);
        self.len += 1;
    }

    /// Partitions a query on `strand` must search
    fn strands_for(strand: Strand) -> &'static [Strand] {
        match strand {
            Strand::Plus => &[Strand::Plus, Strand::Unknown],
            Strand::Minus => &[Strand::Minus, Strand::Unknown],
            Strand::Unknown => &[Strand::Plus, Strand::Minus, Strand::Unknown],
        }
    }

    /// Find all indexed intervals overlapping `query`
    ///
    /// Unknown strand is a wildcard on either side of the comparison.
    /// Results are ordered by (interval, endpoint).
    pub fn find_overlaps(&self, query: &GenomicInterval, min_overlap: u64) -> Vec<&IndexEntry> {
        let mut results = Vec::new();

        for &strand in Self::strands_for(query.strand()) {
            let key = PartitionKey::new(query.chrom(), strand);
            if let Some(partition) = self.partitions.get(&key) {
                for pos in partition.find(query.start(), query.end(), min_overlap) {
                    results.push(&partition.entries[pos]);
                }
            }
        }

        results.sort_by(|a, b| a.interval.cmp(&b.interval).then(a.endpoint.cmp(&b.endpoint)));
        results
    }

    /// Count overlapping intervals
    pub fn count_overlaps(&self, query: &GenomicInterval, min_overlap: u64) -> usize {
        self.find_overlaps(query, min_overlap).len()
    }

    /// Check if any interval overlaps the query
    pub fn has_overlap(&self, query: &GenomicInterval, min_overlap: u64) -> bool {
        Self::strands_for(query.strand()).iter().any(|&strand| {
            self.partitions
                .get(&PartitionKey::new(query.chrom(), strand))
                .map(|p| !p.find(query.start(), query.end(), min_overlap).is_empty())
                .unwrap_or(false)
        })
    }

    pub fn partition(&self, key: &PartitionKey) -> Option<&Partition> {
        self.partitions.get(key)
    }

    /// Partitions in (chromosome, strand) order
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    /// Hand the partitions over for per-partition processing
    pub fn into_partitions(self) -> Vec<Partition> {
        self.partitions.into_values().collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Distinct chromosome names, sorted
    pub fn chromosomes(&self) -> Vec<&str> {
        let mut chroms: Vec<&str> = self.partitions.keys().map(|k| k.chrom.as_str()).collect();
        chroms.dedup();
        chroms
    }

    /// Total number of indexed intervals
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for IntervalIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(chrom: &str, start: u64, end: u64, strand: Strand) -> GenomicInterval {
        GenomicInterval::new(chrom, start, end, strand).unwrap()
    }

    fn partition_of(spans: &[(u64, u64)]) -> Partition {
        let key = PartitionKey::new("chr1", Strand::Plus);
        let entries = spans
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| IndexEntry::new(iv("chr1", s, e, Strand::Plus), EndpointRef::new(i, Side::Left)))
            .collect();
        Partition::from_entries(key, entries)
    }

    fn spans(partition: &Partition, groups: &[Vec<usize>]) -> Vec<Vec<(u64, u64)>> {
        groups
            .iter()
            .map(|g| {
                g.iter()
                    .map(|&p| {
                        let i = &partition.entries()[p].interval;
                        (i.start(), i.end())
                    })
                    .collect()
            })
            .collect()
    }

    fn sample_index() -> IntervalIndex {
        let mut index = IntervalIndex::new();
        let intervals = [
            iv("chr1", 100, 200, Strand::Plus),
            iv("chr1", 150, 250, Strand::Plus),
            iv("chr1", 300, 400, Strand::Plus),
            iv("chr1", 120, 180, Strand::Minus),
            iv("chr1", 160, 170, Strand::Unknown),
            iv("chr2", 100, 200, Strand::Plus),
        ];
        for (i, interval) in intervals.into_iter().enumerate() {
            index.insert(IndexEntry::new(interval, EndpointRef::new(i, Side::Left)));
        }
        index
    }

    #[test]
    fn test_build_index() {
        let index = sample_index();
        assert_eq!(index.len(), 6);
        assert_eq!(index.partition_count(), 4);
        assert_eq!(index.chromosomes(), vec!["chr1", "chr2"]);
    }

    #[test]
    fn test_from_records_indexes_both_endpoints() {
        let records = vec![RawInteractionRecord::new(
            iv("chr1", 100, 200, Strand::Plus),
            iv("chr2", 10, 20, Strand::Minus),
        )];
        let index = IntervalIndex::from_records(&records);
        assert_eq!(index.len(), 2);

        let hits = index.find_overlaps(&iv("chr2", 15, 16, Strand::Minus), 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].endpoint, EndpointRef::new(0, Side::Right));
    }

    #[test]
    fn test_find_overlaps_plus_sees_unknown() {
        let index = sample_index();
        let hits = index.find_overlaps(&iv("chr1", 165, 175, Strand::Plus), 1);
        // two plus intervals + the unknown one, never the minus one
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.interval.strand() != Strand::Minus));
    }

    #[test]
    fn test_find_overlaps_unknown_is_wildcard() {
        let index = sample_index();
        let hits = index.find_overlaps(&iv("chr1", 165, 175, Strand::Unknown), 1);
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_no_overlap() {
        let index = sample_index();
        let query = iv("chr1", 500, 600, Strand::Plus);
        assert_eq!(index.count_overlaps(&query, 1), 0);
        assert!(!index.has_overlap(&query, 1));
    }

    #[test]
    fn test_different_chrom() {
        let index = sample_index();
        assert_eq!(index.count_overlaps(&iv("chr3", 100, 200, Strand::Plus), 1), 0);
    }

    #[test]
    fn test_min_overlap_filters() {
        let index = sample_index();
        let query = iv("chr1", 190, 260, Strand::Plus);
        // overlaps [100,200) by 10 and [150,250) by 60
        assert_eq!(index.count_overlaps(&query, 1), 2);
        assert_eq!(index.count_overlaps(&query, 11), 1);
        assert_eq!(index.count_overlaps(&query, 61), 0);
    }

    #[test]
    fn test_book_ended_with_zero_min_overlap() {
        let index = sample_index();
        let query = iv("chr1", 400, 450, Strand::Plus);
        assert!(!index.has_overlap(&query, 1));
        assert!(index.has_overlap(&query, 0));
    }

    #[test]
    fn test_overlap_components_chain() {
        let partition = partition_of(&[(300, 400), (100, 200), (150, 250), (240, 260), (500, 600)]);
        let groups = partition.overlap_components(1);
        assert_eq!(
            spans(&partition, &groups),
            vec![vec![(100, 200), (150, 250), (240, 260)], vec![(300, 400)], vec![(500, 600)]]
        );
    }

    #[test]
    fn test_overlap_components_book_ended() {
        let partition = partition_of(&[(100, 200), (200, 300), (301, 400)]);
        assert_eq!(partition.overlap_components(1).len(), 3);
        assert_eq!(partition.overlap_components(0).len(), 2);
    }

    #[test]
    fn test_overlap_components_min_overlap() {
        // [0,100) and [95,200) share 5 bases; [96,300) shares 104 with the second
        let partition = partition_of(&[(0, 100), (95, 200), (96, 300)]);
        let groups = partition.overlap_components(10);
        assert_eq!(spans(&partition, &groups), vec![vec![(0, 100)], vec![(95, 200), (96, 300)]]);
    }

    #[test]
    fn test_overlap_components_short_interval_isolated() {
        let partition = partition_of(&[(0, 100), (50, 55), (60, 150)]);
        let groups = partition.overlap_components(10);
        assert_eq!(spans(&partition, &groups), vec![vec![(0, 100), (60, 150)], vec![(50, 55)]]);
    }

    #[test]
    fn test_exact_groups() {
        let partition = partition_of(&[(100, 200), (150, 250), (100, 200), (100, 201)]);
        let groups = partition.exact_groups();
        assert_eq!(
            spans(&partition, &groups),
            vec![vec![(100, 200), (100, 200)], vec![(100, 201)], vec![(150, 250)]]
        );
    }

    #[test]
    fn test_partition_insert_then_find() {
        let mut partition = Partition::new(PartitionKey::new("chr1", Strand::Plus));
        assert!(partition.is_empty());
        partition.insert(IndexEntry::new(iv("chr1", 10, 20, Strand::Plus), EndpointRef::new(0, Side::Left)));
        let pos = partition.insert(IndexEntry::new(iv("chr1", 15, 30, Strand::Plus), EndpointRef::new(0, Side::Right)));
        assert_eq!(pos, 1);
        assert_eq!(partition.find(18, 19, 1), vec![0, 1]);
        assert_eq!(partition.find(25, 40, 1), vec![1]);
    }
}
