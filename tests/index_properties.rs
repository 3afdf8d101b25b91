//! Property-based tests for IntervalIndex overlap queries
//!
//! Checks the lapper-backed queries and the sweep clustering against
//! brute-force pairwise comparison.

use intergraph::core::{
    ranges_overlap, EndpointRef, GenomicInterval, IndexEntry, IntervalIndex, Partition, PartitionKey,
    RawInteractionRecord, Side, Strand,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn arb_strand() -> impl Strategy<Value = Strand> {
    prop_oneof![Just(Strand::Plus), Just(Strand::Minus), Just(Strand::Unknown)]
}

/// Intervals on two chromosomes, densely packed so overlaps are common
fn arb_interval() -> impl Strategy<Value = GenomicInterval> {
    (
        prop_oneof![Just("chr1"), Just("chr2")],
        0u64..2000,
        1u64..200,
        arb_strand(),
    )
        .prop_map(|(chrom, start, len, strand)| GenomicInterval::new(chrom, start, start + len, strand).unwrap())
}

fn arb_spans() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((0u64..1000, 1u64..80), 0..60)
        .prop_map(|v| v.into_iter().map(|(s, l)| (s, s + l)).collect())
}

fn partition_of(spans: &[(u64, u64)]) -> Partition {
    let key = PartitionKey::new("chr1", Strand::Plus);
    let entries = spans
        .iter()
        .enumerate()
        .map(|(i, &(s, e))| {
            IndexEntry::new(
                GenomicInterval::new("chr1", s, e, Strand::Plus).unwrap(),
                EndpointRef::new(i, Side::Left),
            )
        })
        .collect();
    Partition::from_entries(key, entries)
}

/// Connected components by naive union-find over all pairs
fn brute_components(spans: &[(u64, u64)], min_overlap: u64) -> BTreeSet<BTreeSet<usize>> {
    let mut parent: Vec<usize> = (0..spans.len()).collect();
    fn find(parent: &mut Vec<usize>, x: usize) -> usize {
        if parent[x] != x {
            let root = find(parent, parent[x]);
            parent[x] = root;
        }
        parent[x]
    }
    for i in 0..spans.len() {
        for j in (i + 1)..spans.len() {
            let (a, b) = (spans[i], spans[j]);
            if ranges_overlap(a.0, a.1, b.0, b.1, min_overlap) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                parent[ri] = rj;
            }
        }
    }
    let mut groups: std::collections::BTreeMap<usize, BTreeSet<usize>> = Default::default();
    for i in 0..spans.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().insert(i);
    }
    groups.into_values().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// find_overlaps returns all and only compatible intervals sharing
    /// at least `min_overlap` bases with the query
    #[test]
    fn prop_find_overlaps_matches_brute_force(
        intervals in prop::collection::vec(arb_interval(), 1..40),
        query in arb_interval(),
        min_overlap in 0u64..20,
    ) {
        let records: Vec<RawInteractionRecord> = intervals
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| RawInteractionRecord::new(c[0].clone(), c[1].clone()))
            .collect();
        let index = IntervalIndex::from_records(&records);

        let expected: BTreeSet<EndpointRef> = records
            .iter()
            .enumerate()
            .flat_map(|(i, r)| {
                [(Side::Left, r.left()), (Side::Right, r.right())]
                    .into_iter()
                    .map(move |(side, iv)| (EndpointRef::new(i, side), iv))
            })
            .filter(|(_, iv)| {
                iv.chrom() == query.chrom()
                    && iv.strand().is_compatible(query.strand())
                    && ranges_overlap(iv.start(), iv.end(), query.start(), query.end(), min_overlap)
            })
            .map(|(ep, _)| ep)
            .collect();

        let found: BTreeSet<EndpointRef> = index
            .find_overlaps(&query, min_overlap)
            .into_iter()
            .map(|e| e.endpoint)
            .collect();

        prop_assert_eq!(found, expected);
    }

    /// The sweep produces exactly the connected components of the
    /// pairwise overlap relation
    #[test]
    fn prop_sweep_components_match_brute_force(
        spans in arb_spans(),
        min_overlap in 0u64..30,
    ) {
        let partition = partition_of(&spans);
        let swept: BTreeSet<BTreeSet<usize>> = partition
            .overlap_components(min_overlap)
            .into_iter()
            .map(|c| c.into_iter().collect())
            .collect();

        prop_assert_eq!(swept, brute_components(&spans, min_overlap));
    }

    /// Incremental insertion answers the same queries as bulk loading
    #[test]
    fn prop_insert_matches_bulk(
        spans in arb_spans(),
        query_start in 0u64..1000,
        query_len in 1u64..200,
    ) {
        let bulk = partition_of(&spans);
        let mut incremental = Partition::new(PartitionKey::new("chr1", Strand::Plus));
        for entry in bulk.entries() {
            incremental.insert(entry.clone());
        }

        let query_end = query_start + query_len;
        prop_assert_eq!(
            bulk.find(query_start, query_end, 1),
            incremental.find(query_start, query_end, 1)
        );
    }

    /// Exact groups hold identical spans only, and every entry once
    #[test]
    fn prop_exact_groups_partition_entries(spans in arb_spans()) {
        let partition = partition_of(&spans);
        let groups = partition.exact_groups();

        let mut seen = BTreeSet::new();
        for group in &groups {
            let first = spans[group[0]];
            for &pos in group {
                prop_assert_eq!(spans[pos], first);
                prop_assert!(seen.insert(pos));
            }
        }
        prop_assert_eq!(seen.len(), spans.len());
        let distinct: BTreeSet<(u64, u64)> = spans.iter().copied().collect();
        prop_assert_eq!(groups.len(), distinct.len());
    }
}
