//! The relation graph: a directed, weighted graph over a document's
//! annotations.
//!
//! Vertices are annotation ids and edges are typed relations (dependency
//! arcs being the canonical case). The graph is built on demand from a
//! document's relations and is not persisted as part of the document.
//! Traversal-style queries (shortest connection, subtree extraction) run
//! over an undirected view that is computed once and rebuilt only when the
//! edge set is mutated.

use crate::annotation::AnnotationId;
use crate::document::Document;
use crate::types::RelationType;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Relation labels that a dependency-style subtree walk does not descend
/// through by default. Callers supply their own set to override.
pub const DEFAULT_NON_DESCENDING: &[&str] = &["relcl", "parataxis"];

/// A typed, weighted edge between two annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationEdge {
    /// Source annotation id
    pub source: AnnotationId,
    /// Target annotation id
    pub target: AnnotationId,
    /// Relation type of the edge
    pub relation_type: RelationType,
    /// Optional relation value (e.g. the dependency label)
    pub value: Option<String>,
    /// Edge weight, 1.0 unless set
    pub weight: f64,
}

impl RelationEdge {
    /// Create an edge of weight 1.0.
    #[must_use]
    pub fn new(source: AnnotationId, target: AnnotationId, relation_type: RelationType) -> Self {
        Self {
            source,
            target,
            relation_type,
            value: None,
            weight: 1.0,
        }
    }

    /// Attach a relation value (label).
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the edge weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// The label used for pruning and display: the relation value when
    /// present, else the relation type's name.
    #[must_use]
    pub fn label(&self) -> String {
        self.value
            .clone()
            .unwrap_or_else(|| self.relation_type.name().to_string())
    }
}

type Adjacency = HashMap<AnnotationId, Vec<usize>>;

/// A directed, weighted graph whose vertices are annotations and whose
/// edges are typed relations.
#[derive(Debug, Default)]
pub struct RelationGraph {
    vertices: BTreeSet<AnnotationId>,
    edges: Vec<RelationEdge>,
    out_edges: Adjacency,
    in_edges: Adjacency,
    /// Memoized undirected adjacency (vertex -> (neighbor, edge index)),
    /// invalidated on any edge mutation.
    undirected: RwLock<Option<Arc<HashMap<AnnotationId, Vec<(AnnotationId, usize)>>>>>,
}

impl Clone for RelationGraph {
    fn clone(&self) -> Self {
        Self {
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
            out_edges: self.out_edges.clone(),
            in_edges: self.in_edges.clone(),
            undirected: RwLock::new(None),
        }
    }
}

impl RelationGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a collection of edges; endpoints become vertices.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = RelationEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    /// Build a graph from all relations of the given type on a document's
    /// annotations. Each relation becomes an edge from its holder to its
    /// target.
    #[must_use]
    pub fn from_document(document: &Document, relation_type: RelationType) -> Self {
        let mut graph = Self::new();
        for annotation in document.annotations() {
            for relation in annotation.relations_of(relation_type) {
                let mut edge = RelationEdge::new(annotation.id, relation.target, relation_type);
                if let Some(v) = &relation.value {
                    edge = edge.with_value(v.clone());
                }
                graph.add_edge(edge);
            }
        }
        graph
    }

    /// Add a bare vertex.
    pub fn add_vertex(&mut self, id: AnnotationId) {
        self.vertices.insert(id);
    }

    /// Whether the vertex is present.
    #[must_use]
    pub fn contains_vertex(&self, id: AnnotationId) -> bool {
        self.vertices.contains(&id)
    }

    /// Add an edge, inserting its endpoints as vertices.
    pub fn add_edge(&mut self, edge: RelationEdge) {
        self.vertices.insert(edge.source);
        self.vertices.insert(edge.target);
        let idx = self.edges.len();
        self.out_edges.entry(edge.source).or_default().push(idx);
        self.in_edges.entry(edge.target).or_default().push(idx);
        self.edges.push(edge);
        *self.undirected.write() = None;
    }

    /// Remove every edge matching the predicate. Returns the number
    /// removed.
    pub fn remove_edges_if(&mut self, predicate: impl Fn(&RelationEdge) -> bool) -> usize {
        let before = self.edges.len();
        let kept: Vec<RelationEdge> = self
            .edges
            .drain(..)
            .filter(|e| !predicate(e))
            .collect();
        self.out_edges.clear();
        self.in_edges.clear();
        for (idx, edge) in kept.iter().enumerate() {
            self.out_edges.entry(edge.source).or_default().push(idx);
            self.in_edges.entry(edge.target).or_default().push(idx);
        }
        self.edges = kept;
        *self.undirected.write() = None;
        before - self.edges.len()
    }

    /// Remove all edges between the two endpoints.
    pub fn remove_edge(&mut self, source: AnnotationId, target: AnnotationId) -> usize {
        self.remove_edges_if(|e| e.source == source && e.target == target)
    }

    /// All vertices, ascending by id.
    pub fn vertices(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.vertices.iter().copied()
    }

    /// All edges.
    #[must_use]
    pub fn edges(&self) -> &[RelationEdge] {
        &self.edges
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Outgoing edges of a vertex.
    #[must_use]
    pub fn out_edges(&self, id: AnnotationId) -> Vec<&RelationEdge> {
        self.out_edges
            .get(&id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Incoming edges of a vertex.
    #[must_use]
    pub fn in_edges(&self, id: AnnotationId) -> Vec<&RelationEdge> {
        self.in_edges
            .get(&id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// New graph containing the edges passing the predicate and their
    /// incident vertices.
    #[must_use]
    pub fn filter_by_edge(&self, predicate: impl Fn(&RelationEdge) -> bool) -> Self {
        Self::from_edges(self.edges.iter().filter(|e| predicate(e)).cloned())
    }

    /// New graph containing the vertices passing the predicate and the
    /// edges whose both endpoints pass it.
    #[must_use]
    pub fn filter_by_vertex(&self, predicate: impl Fn(AnnotationId) -> bool) -> Self {
        let mut graph = Self::new();
        for &v in &self.vertices {
            if predicate(v) {
                graph.add_vertex(v);
            }
        }
        for edge in &self.edges {
            if graph.contains_vertex(edge.source) && graph.contains_vertex(edge.target) {
                graph.add_edge(edge.clone());
            }
        }
        graph
    }

    fn undirected_view(&self) -> Arc<HashMap<AnnotationId, Vec<(AnnotationId, usize)>>> {
        if let Some(view) = self.undirected.read().as_ref() {
            return Arc::clone(view);
        }
        let mut guard = self.undirected.write();
        if let Some(view) = guard.as_ref() {
            return Arc::clone(view);
        }
        let mut adjacency: HashMap<AnnotationId, Vec<(AnnotationId, usize)>> = HashMap::new();
        for (idx, edge) in self.edges.iter().enumerate() {
            adjacency.entry(edge.source).or_default().push((edge.target, idx));
            adjacency.entry(edge.target).or_default().push((edge.source, idx));
        }
        let view = Arc::new(adjacency);
        *guard = Some(Arc::clone(&view));
        view
    }

    /// Integer edge cost in milli-units for Dijkstra (weights are
    /// non-negative by construction of relation edges).
    fn cost(edge: &RelationEdge) -> u64 {
        (edge.weight.max(0.0) * 1000.0).round() as u64
    }

    /// Shortest directed path between two annotations as a list of edges,
    /// or `None` when no path exists.
    #[must_use]
    pub fn shortest_path(
        &self,
        source: AnnotationId,
        target: AnnotationId,
    ) -> Option<Vec<&RelationEdge>> {
        let (nodes, _cost) = pathfinding::directed::dijkstra::dijkstra(
            &source,
            |&v| {
                self.out_edges
                    .get(&v)
                    .into_iter()
                    .flatten()
                    .map(|&i| (self.edges[i].target, Self::cost(&self.edges[i])))
                    .collect::<Vec<_>>()
            },
            |&v| v == target,
        )?;
        self.edges_along(&nodes, false)
    }

    /// Shortest connection between two annotations ignoring edge direction,
    /// or `None` when they are disconnected.
    #[must_use]
    pub fn shortest_connection(
        &self,
        source: AnnotationId,
        target: AnnotationId,
    ) -> Option<Vec<&RelationEdge>> {
        let view = self.undirected_view();
        let (nodes, _cost) = pathfinding::directed::dijkstra::dijkstra(
            &source,
            |&v| {
                view.get(&v)
                    .into_iter()
                    .flatten()
                    .map(|&(n, i)| (n, Self::cost(&self.edges[i])))
                    .collect::<Vec<_>>()
            },
            |&v| v == target,
        )?;
        self.edges_along(&nodes, true)
    }

    /// Map a vertex path onto the cheapest edge joining each consecutive
    /// pair.
    fn edges_along(&self, nodes: &[AnnotationId], undirected: bool) -> Option<Vec<&RelationEdge>> {
        let mut path = Vec::with_capacity(nodes.len().saturating_sub(1));
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let edge = self
                .edges
                .iter()
                .filter(|e| {
                    (e.source == a && e.target == b)
                        || (undirected && e.source == b && e.target == a)
                })
                .min_by_key(|e| Self::cost(e))?;
            path.push(edge);
        }
        Some(path)
    }

    /// Dependency-style subtree of `root`: a breadth-first walk over
    /// incoming edges. An edge whose label appears in `non_descending`
    /// still contributes its immediate source vertex, but the walk does not
    /// expand past it. Result is ascending by id.
    #[must_use]
    pub fn subtree(&self, root: AnnotationId, non_descending: &HashSet<String>) -> Vec<AnnotationId> {
        let mut children = BTreeSet::new();
        let mut queue: VecDeque<usize> = self
            .in_edges
            .get(&root)
            .map(|idxs| idxs.iter().copied().collect())
            .unwrap_or_default();
        while let Some(idx) = queue.pop_front() {
            let edge = &self.edges[idx];
            if !children.insert(edge.source) {
                continue;
            }
            if non_descending.contains(&edge.label()) {
                continue;
            }
            if let Some(incoming) = self.in_edges.get(&edge.source) {
                queue.extend(incoming.iter().copied());
            }
        }
        children.into_iter().collect()
    }

    /// [`subtree`](Self::subtree) with the conventional default exclusion
    /// set ([`DEFAULT_NON_DESCENDING`]).
    #[must_use]
    pub fn subtree_default(&self, root: AnnotationId) -> Vec<AnnotationId> {
        let pruned = DEFAULT_NON_DESCENDING
            .iter()
            .map(ToString::to_string)
            .collect();
        self.subtree(root, &pruned)
    }

    /// Render the graph in GraphViz DOT format, labeling vertices with the
    /// covered text when a document is given.
    #[must_use]
    pub fn to_dot(&self, document: Option<&Document>) -> String {
        let mut out = String::from("digraph relations {\n");
        for &v in &self.vertices {
            let label = document
                .and_then(|d| d.annotation(v))
                .and_then(|a| document.and_then(|d| d.text_of(a.span)))
                .map_or_else(|| v.to_string(), str::to_owned);
            out.push_str(&format!("  n{v} [label=\"{}\"];\n", label.replace('"', "\\\"")));
        }
        for edge in &self.edges {
            out.push_str(&format!(
                "  n{} -> n{} [label=\"{}\"];\n",
                edge.source,
                edge.target,
                edge.label().replace('"', "\\\"")
            ));
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep() -> RelationType {
        RelationType::create("GRAPH_T_DEP").unwrap()
    }

    fn edge(source: AnnotationId, target: AnnotationId, label: &str) -> RelationEdge {
        RelationEdge::new(source, target, dep()).with_value(label)
    }

    #[test]
    fn from_edges_collects_vertices() {
        let g = RelationGraph::from_edges([edge(1, 2, "nsubj"), edge(3, 2, "dobj")]);
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert!(g.contains_vertex(3));
        assert_eq!(g.in_edges(2).len(), 2);
        assert_eq!(g.out_edges(1).len(), 1);
    }

    #[test]
    fn shortest_path_respects_direction() {
        // 1 -> 2 -> 3, plus a shortcut 1 -> 3 of weight 5.
        let g = RelationGraph::from_edges([
            edge(1, 2, "a"),
            edge(2, 3, "b"),
            edge(1, 3, "c").with_weight(5.0),
        ]);
        let path = g.shortest_path(1, 3).unwrap();
        let labels: Vec<String> = path.iter().map(|e| e.label()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        // No directed path backwards.
        assert!(g.shortest_path(3, 1).is_none());
    }

    #[test]
    fn shortest_connection_ignores_direction() {
        let g = RelationGraph::from_edges([edge(1, 2, "a"), edge(3, 2, "b")]);
        let path = g.shortest_connection(1, 3).unwrap();
        assert_eq!(path.len(), 2);
        // Memoized view survives repeat queries.
        assert!(g.shortest_connection(3, 1).is_some());
    }

    #[test]
    fn undirected_view_rebuilt_after_mutation() {
        let mut g = RelationGraph::from_edges([edge(1, 2, "a")]);
        assert!(g.shortest_connection(1, 2).is_some());
        g.add_edge(edge(2, 3, "b"));
        assert!(g.shortest_connection(1, 3).is_some());
        g.remove_edge(1, 2);
        assert!(g.shortest_connection(1, 3).is_none());
    }

    #[test]
    fn subtree_prunes_but_includes_pruned_child() {
        // Head A=0 with children B=1 (nsubj) and C=2 (relcl); C itself has
        // a child D=3. Edges point child -> head.
        let g = RelationGraph::from_edges([
            edge(1, 0, "nsubj"),
            edge(2, 0, "relcl"),
            edge(3, 2, "dobj"),
            edge(4, 1, "amod"),
        ]);
        let pruned: HashSet<String> = ["relcl".to_string()].into_iter().collect();
        let subtree = g.subtree(0, &pruned);
        // B and C are direct children; the walk expands past B (reaching 4)
        // but not past the pruned C, so 3 is excluded.
        assert_eq!(subtree, vec![1, 2, 4]);
    }

    #[test]
    fn subtree_default_uses_conventional_exclusions() {
        let g = RelationGraph::from_edges([
            edge(1, 0, "parataxis"),
            edge(2, 1, "nsubj"),
        ]);
        assert_eq!(g.subtree_default(0), vec![1]);
    }

    #[test]
    fn filters_produce_subgraphs() {
        let g = RelationGraph::from_edges([edge(1, 2, "a"), edge(2, 3, "b")]);
        let only_a = g.filter_by_edge(|e| e.label() == "a");
        assert_eq!(only_a.edge_count(), 1);
        assert_eq!(only_a.vertex_count(), 2);

        let no_three = g.filter_by_vertex(|v| v != 3);
        assert_eq!(no_three.edge_count(), 1);
        assert!(!no_three.contains_vertex(3));
    }

    #[test]
    fn dot_export_names_edges() {
        let g = RelationGraph::from_edges([edge(1, 2, "nsubj")]);
        let dot = g.to_dot(None);
        assert!(dot.contains("n1 -> n2"));
        assert!(dot.contains("nsubj"));
    }
}
