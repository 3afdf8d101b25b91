//! Interval canonicalization
//!
//! Turns the overlap relation of the interval index into canonical nodes.
//!
//! The work is split in two passes so partitions can be clustered
//! independently:
//! 1. `cluster_partition` groups the entries of one (chromosome, strand)
//!    partition under the configured merge relation (local ids).
//! 2. `reduce` reconciles strand-unknown clusters with stranded ones,
//!    restores the non-overlap postcondition and renumbers every node
//!    globally by (chromosome, strand, start, end).

use crate::core::config::{BuildConfig, MergeStrategy, UnknownStrandPolicy};
use crate::core::error::{ConstructionError, ConstructionResult};
use crate::core::index::{IntervalIndex, Partition};
use crate::core::interval::{ranges_overlap, EndpointRef, GenomicInterval, PartitionKey, Side, Strand};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a canonical node, stable within one construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deduplicated representation of one or more raw intervals
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalNode {
    pub id: NodeId,
    /// Merged span of all members
    pub interval: GenomicInterval,
    /// Number of raw intervals merged into this node
    pub member_count: usize,
    /// Provenance tags of the records whose endpoints fell into this node
    pub sources: BTreeSet<String>,
}

/// Counters describing one canonicalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalStats {
    pub partitions: usize,
    pub intervals: usize,
    /// Strand-unknown clusters folded into a stranded node
    pub unknown_merged: usize,
    /// Of those, clusters that overlapped both `+` and `-`
    pub unknown_ambiguous: usize,
    /// Clusters coalesced to keep spans non-overlapping
    pub coalesced: usize,
}

/// Local clustering of one partition: entry positions per cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionClusters {
    pub key: PartitionKey,
    pub clusters: Vec<Vec<usize>>,
}

/// Canonical nodes plus the endpoint-to-node assignment
///
/// Nodes are stored arena-style, sorted by id. The assignment table is
/// indexed by record position and side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    nodes: Vec<CanonicalNode>,
    assignments: Vec<[Option<NodeId>; 2]>,
    stats: CanonicalStats,
}

impl NodeTable {
    /// Wrap an existing node set (e.g. loaded from a node table)
    ///
    /// Nodes are sorted by id; there are no endpoint assignments.
    pub fn from_nodes(mut nodes: Vec<CanonicalNode>) -> Self {
        nodes.sort_by_key(|n| n.id);
        nodes.dedup_by_key(|n| n.id);
        Self {
            nodes,
            assignments: Vec::new(),
            stats: CanonicalStats::default(),
        }
    }

    pub fn nodes(&self) -> &[CanonicalNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<CanonicalNode> {
        self.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&CanonicalNode> {
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|pos| &self.nodes[pos])
    }

    /// Node a record endpoint was merged into, if it was canonicalized here
    pub fn node_of(&self, endpoint: EndpointRef) -> Option<NodeId> {
        let slot = match endpoint.side {
            Side::Left => 0,
            Side::Right => 1,
        };
        self.assignments.get(endpoint.record).and_then(|a| a[slot])
    }

    pub fn stats(&self) -> &CanonicalStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Disjoint-set forest over global cluster handles
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Union; the smaller root wins
    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// A cluster member: (partition position, entry position)
type MemberRef = (usize, usize);

/// A group of clusters on one chromosome/strand with its union span
struct Group {
    chrom: String,
    strand: Strand,
    start: u64,
    end: u64,
    members: Vec<MemberRef>,
}

/// Computes canonical nodes from indexed intervals
#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    strategy: MergeStrategy,
    min_overlap: u64,
    policy: UnknownStrandPolicy,
}

impl Canonicalizer {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            strategy: config.merge_strategy,
            min_overlap: config.min_overlap,
            policy: config.unknown_strand_policy,
        }
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Cluster one partition under the merge relation
    ///
    /// Pure function of the partition; safe to run for many partitions
    /// at once.
    pub fn cluster_partition(&self, partition: &Partition) -> ConstructionResult<PartitionClusters> {
        let clusters = match self.strategy {
            MergeStrategy::UnionSpan => partition.overlap_components(self.min_overlap),
            MergeStrategy::StrictExact => partition.exact_groups(),
        };

        let assigned: usize = clusters.iter().map(Vec::len).sum();
        if assigned != partition.len() {
            return Err(ConstructionError::PartitionFailed {
                partition: partition.key().to_string(),
                reason: format!("{} of {} intervals assigned to clusters", assigned, partition.len()),
            });
        }

        debug!(
            "Partition {}: {} intervals -> {} clusters",
            partition.key(),
            partition.len(),
            clusters.len()
        );

        Ok(PartitionClusters {
            key: partition.key().clone(),
            clusters,
        })
    }

    /// Sequential canonicalization of a whole index
    pub fn canonicalize(&self, index: &IntervalIndex) -> ConstructionResult<NodeTable> {
        let partitions: Vec<&Partition> = index.partitions().collect();
        let clustered = partitions
            .iter()
            .map(|p| self.cluster_partition(p))
            .collect::<ConstructionResult<Vec<_>>>()?;
        self.reduce(&partitions, clustered)
    }

    /// Merge per-partition clusters into the global node table
    ///
    /// `partitions` and `clustered` must be in the same order.
    pub fn reduce(&self, partitions: &[&Partition], clustered: Vec<PartitionClusters>) -> ConstructionResult<NodeTable> {
        if partitions.len() != clustered.len() {
            return Err(ConstructionError::PartitionFailed {
                partition: "*".to_string(),
                reason: format!("{} partitions but {} cluster sets", partitions.len(), clustered.len()),
            });
        }

        // Pass 1: flatten local clusters into global handles
        let mut cluster_members: Vec<Vec<MemberRef>> = Vec::new();
        let mut membership: Vec<Vec<usize>> = Vec::with_capacity(partitions.len());

        for (p_idx, (partition, local)) in partitions.iter().zip(clustered).enumerate() {
            if partition.key() != &local.key {
                return Err(ConstructionError::PartitionFailed {
                    partition: local.key.to_string(),
                    reason: format!("cluster set does not belong to partition {}", partition.key()),
                });
            }
            let mut owner = vec![usize::MAX; partition.len()];
            for members in local.clusters {
                let handle = cluster_members.len();
                for &pos in &members {
                    owner[pos] = handle;
                }
                cluster_members.push(members.into_iter().map(|pos| (p_idx, pos)).collect());
            }
            membership.push(owner);
        }

        let mut stats = CanonicalStats {
            partitions: partitions.len(),
            intervals: partitions.iter().map(|p| p.len()).sum(),
            ..CanonicalStats::default()
        };

        let mut dsu = DisjointSet::new(cluster_members.len());
        if self.policy == UnknownStrandPolicy::FirstExplored {
            self.resolve_unknown_strand(partitions, &cluster_members, &membership, &mut dsu, &mut stats);
        }

        // Collect DSU groups; a group holds at most one stranded strand
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for handle in 0..cluster_members.len() {
            by_root.entry(dsu.find(handle)).or_default().push(handle);
        }

        let mut groups: Vec<Group> = by_root
            .into_values()
            .map(|handles| {
                let members: Vec<MemberRef> = handles
                    .iter()
                    .flat_map(|&h| cluster_members[h].iter().copied())
                    .collect();
                group_from_members(partitions, members)
            })
            .collect();

        if self.strategy == MergeStrategy::UnionSpan {
            let before = groups.len();
            groups = coalesce_overlapping(groups, self.min_overlap);
            stats.coalesced = before - groups.len();
            if stats.coalesced > 0 {
                debug!("Coalesced {} clusters with overlapping spans", stats.coalesced);
            }
            if self.policy == UnknownStrandPolicy::FirstExplored {
                groups = self.settle_unknown_groups(partitions, groups, &mut stats);
            }
        }

        groups.sort_by(|a, b| {
            a.chrom
                .cmp(&b.chrom)
                .then(a.strand.cmp(&b.strand))
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
        });

        if groups.len() > u32::MAX as usize {
            return Err(ConstructionError::NodeIdOverflow(groups.len()));
        }

        // Pass 2: global ids in canonical order
        let record_count = partitions
            .iter()
            .flat_map(|p| p.entries().iter().map(|e| e.endpoint.record + 1))
            .max()
            .unwrap_or(0);
        let mut assignments: Vec<[Option<NodeId>; 2]> = vec![[None, None]; record_count];
        let mut nodes = Vec::with_capacity(groups.len());

        for (idx, group) in groups.into_iter().enumerate() {
            let id = NodeId(idx as u32);
            let mut sources = BTreeSet::new();
            for &(p_idx, pos) in &group.members {
                let entry = &partitions[p_idx].entries()[pos];
                let slot = match entry.endpoint.side {
                    Side::Left => 0,
                    Side::Right => 1,
                };
                assignments[entry.endpoint.record][slot] = Some(id);
                if let Some(source) = &entry.source {
                    sources.insert(source.clone());
                }
            }
            nodes.push(CanonicalNode {
                id,
                interval: GenomicInterval::from_span(&group.chrom, group.start, group.end, group.strand),
                member_count: group.members.len(),
                sources,
            });
        }

        debug!(
            "Canonicalized {} intervals in {} partitions into {} nodes",
            stats.intervals,
            stats.partitions,
            nodes.len()
        );
        Ok(NodeTable {
            nodes,
            assignments,
            stats,
        })
    }

    /// Fold strand-unknown clusters into the first explored stranded side
    ///
    /// Partitions are visited in (chromosome, strand) order, so for each
    /// unknown cluster the `+` side is explored before `-`. A cluster that
    /// touches clusters on the chosen side is united with all of them.
    fn resolve_unknown_strand(
        &self,
        partitions: &[&Partition],
        cluster_members: &[Vec<MemberRef>],
        membership: &[Vec<usize>],
        dsu: &mut DisjointSet,
        stats: &mut CanonicalStats,
    ) {
        let position: BTreeMap<&PartitionKey, usize> =
            partitions.iter().enumerate().map(|(i, p)| (p.key(), i)).collect();

        for (p_idx, partition) in partitions.iter().enumerate() {
            if !partition.key().strand.is_unknown() {
                continue;
            }
            let chrom = partition.key().chrom.as_str();
            let handles: BTreeSet<usize> = membership[p_idx].iter().copied().collect();

            for handle in handles {
                let mut touched_by_side: Vec<(Strand, BTreeSet<usize>)> = Vec::with_capacity(2);
                for side in [Strand::Plus, Strand::Minus] {
                    let key = PartitionKey::new(chrom, side);
                    let Some(&q_idx) = position.get(&key) else {
                        continue;
                    };
                    let touched = self.touched_clusters(partitions[q_idx], &membership[q_idx], &cluster_members[handle], partitions);
                    if !touched.is_empty() {
                        touched_by_side.push((side, touched));
                    }
                }

                let Some((side, touched)) = touched_by_side.first() else {
                    continue;
                };
                if touched_by_side.len() > 1 {
                    stats.unknown_ambiguous += 1;
                    warn!(
                        "Strand-unknown cluster on {} overlaps both strands; merged into {} side",
                        chrom, side
                    );
                }
                for &other in touched {
                    dsu.union(handle, other);
                }
                stats.unknown_merged += 1;
            }
        }
    }

    /// Fold strand-unknown groups into the stranded groups their span reaches
    ///
    /// Coalescing widens spans, so an unknown group can reach a stranded
    /// group that none of its members reached. Repeats until no unknown
    /// group touches a stranded group on its chromosome.
    fn settle_unknown_groups(
        &self,
        partitions: &[&Partition],
        mut groups: Vec<Group>,
        stats: &mut CanonicalStats,
    ) -> Vec<Group> {
        loop {
            // groups are sorted by (chrom, strand, start) and disjoint per block
            let mut blocks: BTreeMap<(&str, Strand), (usize, usize)> = BTreeMap::new();
            for (idx, group) in groups.iter().enumerate() {
                let block = blocks.entry((group.chrom.as_str(), group.strand)).or_insert((idx, idx));
                block.1 = idx + 1;
            }

            let mut dsu = DisjointSet::new(groups.len());
            let mut merged = 0;
            for (idx, group) in groups.iter().enumerate() {
                if !group.strand.is_unknown() {
                    continue;
                }
                let mut touched_by_side: Vec<(Strand, Vec<usize>)> = Vec::with_capacity(2);
                for side in [Strand::Plus, Strand::Minus] {
                    let Some(&(lo, hi)) = blocks.get(&(group.chrom.as_str(), side)) else {
                        continue;
                    };
                    let block = &groups[lo..hi];
                    let first = block.partition_point(|g| g.end < group.start);
                    let touched: Vec<usize> = block[first..]
                        .iter()
                        .enumerate()
                        .take_while(|(_, g)| g.start <= group.end)
                        .filter(|(_, g)| ranges_overlap(g.start, g.end, group.start, group.end, self.min_overlap))
                        .map(|(offset, _)| lo + first + offset)
                        .collect();
                    if !touched.is_empty() {
                        touched_by_side.push((side, touched));
                    }
                }

                let Some((side, touched)) = touched_by_side.first() else {
                    continue;
                };
                if touched_by_side.len() > 1 {
                    stats.unknown_ambiguous += 1;
                    warn!(
                        "Strand-unknown span {}:{}-{} overlaps both strands; merged into {} side",
                        group.chrom, group.start, group.end, side
                    );
                }
                for &other in touched {
                    dsu.union(idx, other);
                }
                stats.unknown_merged += 1;
                merged += 1;
            }

            if merged == 0 {
                return groups;
            }
            debug!("Folded {} strand-unknown spans into stranded nodes", merged);

            let mut by_root: BTreeMap<usize, Vec<MemberRef>> = BTreeMap::new();
            for (idx, group) in groups.into_iter().enumerate() {
                by_root.entry(dsu.find(idx)).or_default().extend(group.members);
            }
            groups = coalesce_overlapping(
                by_root
                    .into_values()
                    .map(|members| group_from_members(partitions, members))
                    .collect(),
                self.min_overlap,
            );
        }
    }

    /// Clusters of a stranded partition touched by any of `members`
    fn touched_clusters(
        &self,
        stranded: &Partition,
        owner: &[usize],
        members: &[MemberRef],
        partitions: &[&Partition],
    ) -> BTreeSet<usize> {
        let mut touched = BTreeSet::new();
        for &(p_idx, pos) in members {
            let interval = &partitions[p_idx].entries()[pos].interval;
            let hits = match self.strategy {
                MergeStrategy::UnionSpan => stranded.find(interval.start(), interval.end(), self.min_overlap),
                MergeStrategy::StrictExact => stranded
                    .find(interval.start(), interval.end(), 1)
                    .into_iter()
                    .filter(|&hit| stranded.entries()[hit].interval.same_span(interval))
                    .collect(),
            };
            touched.extend(hits.into_iter().map(|hit| owner[hit]));
        }
        touched
    }
}

fn group_from_members(partitions: &[&Partition], members: Vec<MemberRef>) -> Group {
    let mut strand = Strand::Unknown;
    let mut start = u64::MAX;
    let mut end = 0;
    let mut chrom = String::new();

    for &(p_idx, pos) in &members {
        let key = partitions[p_idx].key();
        if !key.strand.is_unknown() {
            strand = key.strand;
        }
        if chrom.is_empty() {
            chrom = key.chrom.clone();
        }
        let interval = &partitions[p_idx].entries()[pos].interval;
        start = start.min(interval.start());
        end = end.max(interval.end());
    }

    Group {
        chrom,
        strand,
        start,
        end,
        members,
    }
}

/// Merge groups whose spans overlap on the same chromosome and strand
///
/// With `min_overlap == 0` book-ended spans are merged as well.
fn coalesce_overlapping(mut groups: Vec<Group>, min_overlap: u64) -> Vec<Group> {
    groups.sort_by(|a, b| {
        a.chrom
            .cmp(&b.chrom)
            .then(a.strand.cmp(&b.strand))
            .then(a.start.cmp(&b.start))
            .then(a.end.cmp(&b.end))
    });

    let mut merged: Vec<Group> = Vec::with_capacity(groups.len());
    for group in groups {
        match merged.last_mut() {
            Some(last)
                if last.chrom == group.chrom
                    && last.strand == group.strand
                    && (group.start < last.end || (min_overlap == 0 && group.start == last.end)) =>
            {
                last.end = last.end.max(group.end);
                last.members.extend(group.members);
            }
            _ => merged.push(group),
        }
    }
    merged
}
