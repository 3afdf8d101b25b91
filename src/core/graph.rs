//! Interaction graph and queries
//!
//! Nodes live in an id-sorted arena; adjacency stores positions into the
//! edge list, so neighbour and degree queries never copy edges.

use crate::core::canonical::{CanonicalNode, NodeId};
use crate::core::edges::{Edge, EdgeKind};
use crate::core::error::{LookupError, LookupResult};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Unweighted and weighted degree of a node
///
/// A self-loop contributes once to both.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Degree {
    pub count: usize,
    pub weighted: f64,
}

/// Immutable undirected interaction graph
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    nodes: Vec<CanonicalNode>,
    edges: Vec<Edge>,
    /// Edge positions incident to each node position
    adjacency: Vec<Vec<usize>>,
}

impl InteractionGraph {
    /// Assemble from resolved parts
    ///
    /// Nodes must be sorted by id and every edge endpoint must exist; the
    /// construction pipeline guarantees both.
    pub(crate) fn assemble(nodes: Vec<CanonicalNode>, mut edges: Vec<Edge>) -> Self {
        edges.sort_by_key(|e| e.pair());
        let mut adjacency = vec![Vec::new(); nodes.len()];
        let position = |id: NodeId| nodes.binary_search_by_key(&id, |n| n.id).ok();

        for (e_idx, edge) in edges.iter().enumerate() {
            if let Some(pos) = position(edge.source) {
                adjacency[pos].push(e_idx);
            }
            if edge.target != edge.source {
                if let Some(pos) = position(edge.target) {
                    adjacency[pos].push(e_idx);
                }
            }
        }

        Self {
            nodes,
            edges,
            adjacency,
        }
    }

    /// Re-assemble a graph from public node and edge tables
    ///
    /// Edge pairs are normalised and repeated pairs merged. An edge naming
    /// an absent node fails with `NodeNotFound`.
    pub fn from_parts(mut nodes: Vec<CanonicalNode>, edges: Vec<Edge>) -> LookupResult<Self> {
        nodes.sort_by_key(|n| n.id);
        nodes.dedup_by_key(|n| n.id);

        let mut merged: BTreeMap<(NodeId, NodeId), (Edge, Vec<f64>)> = BTreeMap::new();
        for edge in edges {
            for id in [edge.source, edge.target] {
                if nodes.binary_search_by_key(&id, |n| n.id).is_err() {
                    return Err(LookupError::NodeNotFound(id));
                }
            }
            let (source, target) = if edge.source <= edge.target {
                (edge.source, edge.target)
            } else {
                (edge.target, edge.source)
            };
            let kind = if source == target {
                EdgeKind::SelfLoop
            } else {
                EdgeKind::Interaction
            };
            match merged.get_mut(&(source, target)) {
                Some((existing, weights)) => {
                    weights.push(edge.weight);
                    existing.observations += edge.observations;
                    existing.provenance.extend(edge.provenance);
                }
                None => {
                    let weights = vec![edge.weight];
                    merged.insert(
                        (source, target),
                        (
                            Edge {
                                source,
                                target,
                                kind,
                                ..edge
                            },
                            weights,
                        ),
                    );
                }
            }
        }

        // sorted sums keep the result independent of edge order
        let edges = merged
            .into_values()
            .map(|(mut edge, mut weights)| {
                weights.sort_by(f64::total_cmp);
                edge.weight = weights.iter().sum();
                edge
            })
            .collect();
        Ok(Self::assemble(nodes, edges))
    }

    #[inline]
    fn position(&self, id: NodeId) -> LookupResult<usize> {
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .map_err(|_| LookupError::NodeNotFound(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order
    pub fn nodes(&self) -> &[CanonicalNode] {
        &self.nodes
    }

    /// Edges in ascending (source, target) order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> LookupResult<&CanonicalNode> {
        self.position(id).map(|pos| &self.nodes[pos])
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.position(id).is_ok()
    }

    /// Edge between two nodes, in either order
    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.edges
            .binary_search_by_key(&pair, |e| e.pair())
            .ok()
            .map(|pos| &self.edges[pos])
    }

    /// Edges incident to `id`
    pub fn incident_edges(&self, id: NodeId) -> LookupResult<impl Iterator<Item = &Edge> + '_> {
        let pos = self.position(id)?;
        Ok(self.adjacency[pos].iter().map(move |&e| &self.edges[e]))
    }

    /// Node ids sharing an edge with `id`
    ///
    /// Includes `id` itself when it carries a self-loop.
    pub fn neighbors(&self, id: NodeId) -> LookupResult<BTreeSet<NodeId>> {
        Ok(self
            .incident_edges(id)?
            .filter_map(|e| e.other(id))
            .collect())
    }

    pub fn degree(&self, id: NodeId) -> LookupResult<Degree> {
        let mut degree = Degree::default();
        for edge in self.incident_edges(id)? {
            degree.count += 1;
            degree.weighted += edge.weight;
        }
        Ok(degree)
    }

    /// Nodes adjacent to both `a` and `b`, excluding `a` and `b`
    pub fn common_neighbors(&self, a: NodeId, b: NodeId) -> LookupResult<BTreeSet<NodeId>> {
        let na = self.neighbors(a)?;
        let nb = self.neighbors(b)?;
        Ok(na
            .intersection(&nb)
            .copied()
            .filter(|&n| n != a && n != b)
            .collect())
    }

    /// Lazy iterator over connected components
    ///
    /// Components come out in ascending order of their smallest node id;
    /// isolated nodes form singletons. Each call starts a fresh traversal.
    pub fn connected_components(&self) -> Components<'_> {
        Components {
            graph: self,
            visited: vec![false; self.nodes.len()],
            cursor: 0,
        }
    }

    pub fn component_count(&self) -> usize {
        self.connected_components().count()
    }

    /// Induced subgraph on the nodes accepted by `predicate`
    ///
    /// Node ids are preserved.
    pub fn subgraph<F>(&self, predicate: F) -> InteractionGraph
    where
        F: Fn(&CanonicalNode) -> bool,
    {
        let keep: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .filter(|n| predicate(n))
            .map(|n| n.id)
            .collect();
        self.induced(&keep)
    }

    fn induced(&self, keep: &BTreeSet<NodeId>) -> InteractionGraph {
        let nodes = self
            .nodes
            .iter()
            .filter(|n| keep.contains(&n.id))
            .cloned()
            .collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| keep.contains(&e.source) && keep.contains(&e.target))
            .cloned()
            .collect();
        InteractionGraph::assemble(nodes, edges)
    }

    /// Subgraph of the largest connected component
    ///
    /// Among equally large components the one with the smallest id wins.
    pub fn largest_component(&self) -> InteractionGraph {
        let mut best: Option<BTreeSet<NodeId>> = None;
        for component in self.connected_components() {
            if best.as_ref().map_or(true, |b| component.len() > b.len()) {
                best = Some(component);
            }
        }
        match best {
            Some(keep) => self.induced(&keep),
            None => InteractionGraph::default(),
        }
    }

    /// Node `id` together with its neighbours
    pub fn ego_subgraph(&self, id: NodeId) -> LookupResult<InteractionGraph> {
        let mut keep = self.neighbors(id)?;
        keep.insert(id);
        Ok(self.induced(&keep))
    }

    /// Drop nodes whose unweighted degree is below `min_degree`
    ///
    /// Degrees are taken in this graph, before any node is removed.
    pub fn subgraph_by_degree(&self, min_degree: usize) -> InteractionGraph {
        let keep: BTreeSet<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(pos, _)| self.adjacency[*pos].len() >= min_degree)
            .map(|(_, n)| n.id)
            .collect();
        self.induced(&keep)
    }

    /// Edge listing with one row per provenance tag
    ///
    /// Untagged edges are listed under an empty tag.
    pub fn edges_by_provenance(&self) -> Vec<(&str, &Edge)> {
        let mut rows = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            if edge.provenance.is_empty() {
                rows.push(("", edge));
            }
            for tag in &edge.provenance {
                rows.push((tag.as_str(), edge));
            }
        }
        rows
    }

    /// Per-tag edge and node counts
    pub fn provenance_stats(&self) -> BTreeMap<String, ProvenanceStats> {
        let mut touched: BTreeMap<&str, (usize, f64, BTreeSet<NodeId>)> = BTreeMap::new();
        for (tag, edge) in self.edges_by_provenance() {
            if tag.is_empty() {
                continue;
            }
            let entry = touched.entry(tag).or_default();
            entry.0 += 1;
            entry.1 += edge.weight;
            entry.2.insert(edge.source);
            entry.2.insert(edge.target);
        }
        touched
            .into_iter()
            .map(|(tag, (edges, weight, nodes))| {
                (
                    tag.to_string(),
                    ProvenanceStats {
                        edges,
                        nodes: nodes.len(),
                        weight,
                    },
                )
            })
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let mut degrees: Vec<usize> = self.adjacency.iter().map(Vec::len).collect();
        degrees.sort_unstable();

        let mut component_count = 0;
        let mut largest_component = 0;
        for component in self.connected_components() {
            component_count += 1;
            largest_component = largest_component.max(component.len());
        }

        let median_degree = match degrees.len() {
            0 => 0.0,
            n if n % 2 == 1 => degrees[n / 2] as f64,
            n => (degrees[n / 2 - 1] + degrees[n / 2]) as f64 / 2.0,
        };
        let mean_degree = if degrees.is_empty() {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
        };

        GraphSummary {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            self_loop_count: self.edges.iter().filter(|e| e.is_self_loop()).count(),
            isolated_count: degrees.iter().take_while(|&&d| d == 0).count(),
            component_count,
            largest_component,
            total_weight: self.edges.iter().map(|e| e.weight).sum(),
            min_degree: degrees.first().copied().unwrap_or(0),
            max_degree: degrees.last().copied().unwrap_or(0),
            mean_degree,
            median_degree,
        }
    }
}

/// Connected component iterator
///
/// Breadth-first from each unvisited node in ascending id order.
#[derive(Debug, Clone)]
pub struct Components<'a> {
    graph: &'a InteractionGraph,
    visited: Vec<bool>,
    cursor: usize,
}

impl Iterator for Components<'_> {
    type Item = BTreeSet<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.visited.len() && self.visited[self.cursor] {
            self.cursor += 1;
        }
        if self.cursor >= self.visited.len() {
            return None;
        }

        let graph = self.graph;
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([self.cursor]);
        self.visited[self.cursor] = true;

        while let Some(pos) = queue.pop_front() {
            let id = graph.nodes[pos].id;
            component.insert(id);
            for &e in &graph.adjacency[pos] {
                let Some(other) = graph.edges[e].other(id) else {
                    continue;
                };
                if let Ok(next) = graph.position(other) {
                    if !self.visited[next] {
                        self.visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        Some(component)
    }
}

/// Per-tag contribution to the graph
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProvenanceStats {
    pub edges: usize,
    /// Distinct nodes touched by the tag's edges
    pub nodes: usize,
    pub weight: f64,
}

/// Whole-graph statistics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub self_loop_count: usize,
    pub isolated_count: usize,
    pub component_count: usize,
    pub largest_component: usize,
    pub total_weight: f64,
    pub min_degree: usize,
    pub max_degree: usize,
    pub mean_degree: f64,
    pub median_degree: f64,
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:              {}", self.node_count)?;
        writeln!(f, "Edges:              {}", self.edge_count)?;
        writeln!(f, "Self-loops:         {}", self.self_loop_count)?;
        writeln!(f, "Isolated nodes:     {}", self.isolated_count)?;
        writeln!(f, "Components:         {}", self.component_count)?;
        writeln!(f, "Largest component:  {}", self.largest_component)?;
        writeln!(f, "Total weight:       {:.2}", self.total_weight)?;
        write!(
            f,
            "Degree:             min {} / max {} / mean {:.2} / median {:.1}",
            self.min_degree, self.max_degree, self.mean_degree, self.median_degree
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interval::{GenomicInterval, Strand};

    fn node(id: u32) -> CanonicalNode {
        let start = id as u64 * 1000;
        CanonicalNode {
            id: NodeId(id),
            interval: GenomicInterval::new("chr1", start, start + 100, Strand::Plus).unwrap(),
            member_count: 1,
            sources: BTreeSet::new(),
        }
    }

    fn graph(node_ids: &[u32], edges: &[(u32, u32, f64, &str)]) -> InteractionGraph {
        let nodes = node_ids.iter().map(|&id| node(id)).collect();
        let edges = edges
            .iter()
            .map(|&(a, b, w, tag)| Edge::new(NodeId(a), NodeId(b), w).with_provenance([tag]))
            .collect();
        InteractionGraph::from_parts(nodes, edges).unwrap()
    }

    fn ids(values: &[u32]) -> BTreeSet<NodeId> {
        values.iter().map(|&v| NodeId(v)).collect()
    }

    #[test]
    fn test_neighbors_and_degree() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1, 2.0, "A"), (1, 2, 1.0, "A"), (1, 1, 0.5, "B")]);

        assert_eq!(g.neighbors(NodeId(1)).unwrap(), ids(&[0, 1, 2]));
        assert_eq!(g.neighbors(NodeId(3)).unwrap(), BTreeSet::new());
        assert_eq!(
            g.degree(NodeId(1)).unwrap(),
            Degree {
                count: 3,
                weighted: 3.5
            }
        );
        assert_eq!(g.degree(NodeId(9)), Err(LookupError::NodeNotFound(NodeId(9))));
    }

    #[test]
    fn test_components_ordered_and_restartable() {
        let g = graph(&[0, 1, 2, 3, 4], &[(3, 4, 1.0, "A"), (0, 2, 1.0, "A")]);
        let first: Vec<BTreeSet<NodeId>> = g.connected_components().collect();
        assert_eq!(first, vec![ids(&[0, 2]), ids(&[1]), ids(&[3, 4])]);

        let again: Vec<BTreeSet<NodeId>> = g.connected_components().collect();
        assert_eq!(first, again);

        let mut partial = g.connected_components();
        partial.next();
        let resumed: Vec<_> = partial.clone().collect();
        assert_eq!(resumed, partial.collect::<Vec<_>>());
    }

    #[test]
    fn test_subgraph_keeps_ids() {
        let g = graph(&[0, 1, 2], &[(0, 1, 1.0, "A"), (1, 2, 1.0, "A")]);
        let sub = g.subgraph(|n| n.id != NodeId(1));
        assert_eq!(sub.node_count(), 2);
        assert_eq!(sub.edge_count(), 0);
        assert!(sub.contains_node(NodeId(2)));

        let all = g.subgraph(|_| true);
        assert_eq!(all.nodes(), g.nodes());
        assert_eq!(all.edges(), g.edges());
    }

    #[test]
    fn test_largest_component_tie_goes_to_lowest_id() {
        let g = graph(&[0, 1, 2, 3, 4], &[(2, 3, 1.0, "A"), (0, 4, 1.0, "A")]);
        let largest = g.largest_component();
        assert_eq!(largest.nodes().iter().map(|n| n.id).collect::<BTreeSet<_>>(), ids(&[0, 4]));
        assert!(InteractionGraph::default().largest_component().is_empty());
    }

    #[test]
    fn test_ego_and_common_neighbors() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1, 1.0, "A"), (0, 2, 1.0, "A"), (1, 2, 1.0, "A"), (2, 3, 1.0, "A")]);
        let ego = g.ego_subgraph(NodeId(0)).unwrap();
        assert_eq!(ego.node_count(), 3);
        assert_eq!(ego.edge_count(), 3);
        assert_eq!(g.common_neighbors(NodeId(0), NodeId(3)).unwrap(), ids(&[2]));
        assert!(g.ego_subgraph(NodeId(7)).is_err());
    }

    #[test]
    fn test_subgraph_by_degree() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1, 1.0, "A"), (0, 2, 1.0, "A"), (1, 2, 1.0, "A"), (2, 3, 1.0, "A")]);
        let pruned = g.subgraph_by_degree(2);
        assert_eq!(pruned.nodes().iter().map(|n| n.id).collect::<BTreeSet<_>>(), ids(&[0, 1, 2]));
        assert_eq!(pruned.edge_count(), 3);
    }

    #[test]
    fn test_from_parts_merges_and_validates() {
        let nodes = vec![node(1), node(0)];
        let edges = vec![
            Edge::new(NodeId(1), NodeId(0), 1.0).with_provenance(["A"]),
            Edge {
                source: NodeId(1),
                target: NodeId(0),
                ..Edge::new(NodeId(0), NodeId(1), 2.0).with_provenance(["B"])
            },
        ];
        let g = InteractionGraph::from_parts(nodes.clone(), edges).unwrap();
        assert_eq!(g.edge_count(), 1);
        let edge = g.edge(NodeId(1), NodeId(0)).unwrap();
        assert_eq!(edge.weight, 3.0);
        assert_eq!(edge.observations, 2);
        assert_eq!(edge.provenance.len(), 2);

        let dangling = vec![Edge::new(NodeId(0), NodeId(5), 1.0)];
        assert_eq!(
            InteractionGraph::from_parts(nodes, dangling).unwrap_err(),
            LookupError::NodeNotFound(NodeId(5))
        );
    }

    #[test]
    fn test_from_parts_weight_independent_of_order() {
        let weights = [0.1f64, 1e16, 0.3, 7.25];
        let build = |order: &[usize]| {
            let edges = order.iter().map(|&i| Edge::new(NodeId(0), NodeId(1), weights[i])).collect();
            InteractionGraph::from_parts(vec![node(0), node(1)], edges).unwrap().edges()[0].weight
        };
        assert_eq!(build(&[0, 1, 2, 3]), build(&[3, 1, 0, 2]));
        assert_eq!(build(&[0, 1, 2, 3]), build(&[1, 2, 3, 0]));
    }

    #[test]
    fn test_summary_and_provenance() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1, 2.0, "A"), (1, 2, 1.0, "B"), (1, 1, 1.0, "B")]);
        let summary = g.summary();
        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.edge_count, 3);
        assert_eq!(summary.self_loop_count, 1);
        assert_eq!(summary.isolated_count, 1);
        assert_eq!(summary.component_count, 2);
        assert_eq!(summary.largest_component, 3);
        assert_eq!(summary.max_degree, 3);
        assert_eq!(summary.median_degree, 1.0);

        let stats = g.provenance_stats();
        assert_eq!(stats["A"].edges, 1);
        assert_eq!(stats["B"].edges, 2);
        assert_eq!(stats["B"].nodes, 2);
        assert_eq!(g.edges_by_provenance().len(), 3);
    }
}
