//! The pruned dependency graph over unit identifiers.

use indexmap::IndexSet;
use petgraph::graph::{DiGraph, NodeIndex};

/// Directed graph of units, edges pointing from a unit to what it references.
///
/// Unit names are interned in an `IndexSet` whose positions coincide with
/// petgraph node indices, so a vertex's dense id is both its position in
/// `units` and its `NodeIndex`. The closure engine relies on those ids being
/// contiguous from zero.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<(), ()>,
    units: IndexSet<String>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex if absent and returns its dense id.
    pub fn add_vertex(&mut self, unit: &str) -> usize {
        if let Some(id) = self.units.get_index_of(unit) {
            return id;
        }
        let (id, _) = self.units.insert_full(unit.to_string());
        let node = self.graph.add_node(());
        debug_assert_eq!(node.index(), id);
        id
    }

    /// Adds an edge `from → to`, creating either vertex as needed.
    ///
    /// Adding an edge that already exists is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = NodeIndex::new(self.add_vertex(from));
        let to = NodeIndex::new(self.add_vertex(to));
        self.graph.update_edge(from, to, ());
    }

    /// Adds an edge known not to exist yet.
    ///
    /// Used by the builder, whose input is already a set per source.
    pub(crate) fn add_new_edge(&mut self, from: usize, to: usize) {
        self.graph
            .add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
    }

    /// Returns the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if the unit is a vertex of the graph.
    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains(unit)
    }

    /// Returns true if the edge `from → to` exists.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.id_of(from), self.id_of(to)) {
            (Some(from), Some(to)) => self
                .graph
                .contains_edge(NodeIndex::new(from), NodeIndex::new(to)),
            _ => false,
        }
    }

    /// Returns the dense id of a unit, if present.
    pub fn id_of(&self, unit: &str) -> Option<usize> {
        self.units.get_index_of(unit)
    }

    /// Returns the unit name for a dense id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a vertex id of this graph.
    pub fn unit(&self, id: usize) -> &str {
        self.units.get_index(id).expect("valid vertex id")
    }

    /// Iterates over all unit names in id order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(String::as_str)
    }

    /// Iterates over the direct successors of a unit.
    pub fn successors<'a>(
        &'a self,
        unit: &str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.id_of(unit)
            .into_iter()
            .flat_map(move |id| self.successor_ids(id))
            .map(|id| self.unit(id))
    }

    /// Iterates over the dense ids of a vertex's direct successors.
    pub(crate) fn successor_ids(
        &self,
        id: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        self.graph.neighbors(NodeIndex::new(id)).map(NodeIndex::index)
    }

    /// Iterates over all edges as `(from, to)` unit pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.raw_edges().iter().map(|edge| {
            (
                self.unit(edge.source().index()),
                self.unit(edge.target().index()),
            )
        })
    }
}
