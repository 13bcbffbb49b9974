//! Transitive closure per entry unit.
//!
//! ## Algorithm
//!
//! 1. Every vertex already has a dense id (see [`DependencyGraph`])
//! 2. Successor-id arrays are materialized once, O(V + E)
//! 3. A vertex's closure is a `FixedBitSet` over all ids:
//!    `closure(v) = {v} ∪ closure(s)` for each direct successor `s`
//! 4. Closures are produced by an explicit-stack post-order walk, so long
//!    dependency chains cannot overflow the call stack
//! 5. Each closure is computed once and cached for the whole engine, giving
//!    O(V + E) amortized bitset unions no matter how many entries share
//!    subgraphs
//!
//! ## Cycles
//!
//! A successor that is still on the active walk path when it is reached
//! again has no finished closure yet. It contributes only its own id bit to
//! the vertex being finished. The vertex that closes the cycle therefore
//! sees every member of the cycle *above* it on the path, but a vertex
//! finished inside a cycle can miss cycle members below the re-entry point
//! (for `A → B → C → A` walked from `A`, `C` finishes as `{C, A}`). The
//! entry the walk started from always receives the full set.

use std::collections::BTreeSet;

use fixedbitset::FixedBitSet;
use ripple_schemas::ClosureMap;
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;

/// Walk state of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Not reached yet.
    Fresh,
    /// On the active walk path; its closure is not final.
    OnPath,
    /// Closure computed and cached.
    Done,
}

/// Memoizing reachability solver over one graph.
///
/// The cache lives as long as the engine, so querying many entries that
/// share dependencies only pays for each vertex once.
pub struct ClosureEngine<'g> {
    graph: &'g DependencyGraph,
    successors: Vec<Box<[usize]>>,
    closures: Vec<Option<FixedBitSet>>,
    visits: Vec<Visit>,
}

impl<'g> ClosureEngine<'g> {
    /// Prepares the engine: materializes successor ids for every vertex.
    pub fn new(graph: &'g DependencyGraph) -> Self {
        let vertex_count = graph.vertex_count();
        let successors = (0..vertex_count)
            .map(|id| graph.successor_ids(id).collect())
            .collect();
        Self {
            graph,
            successors,
            closures: vec![None; vertex_count],
            visits: vec![Visit::Fresh; vertex_count],
        }
    }

    /// Returns the cached closure bitset of a vertex, computing it if needed.
    pub fn closure_of_id(&mut self, start: usize) -> &FixedBitSet {
        if self.visits[start] != Visit::Done {
            self.solve(start);
        }
        self.closures[start]
            .as_ref()
            .expect("solve finishes the start vertex")
    }

    /// Returns the closure of a unit as names, itself always included.
    ///
    /// A unit absent from the graph (unanalyzed, or missed by the extractor)
    /// yields a closure containing only itself.
    pub fn closure_of(&mut self, unit: &str) -> BTreeSet<String> {
        let Some(start) = self.graph.id_of(unit) else {
            return BTreeSet::from([unit.to_string()]);
        };
        let graph = self.graph;
        let bits = self.closure_of_id(start);
        let mut members: BTreeSet<String> =
            bits.ones().map(|id| graph.unit(id).to_string()).collect();
        members.insert(unit.to_string());
        members
    }

    /// Returns how many vertices have a cached closure.
    pub fn cached_count(&self) -> usize {
        self.visits.iter().filter(|v| **v == Visit::Done).count()
    }

    /// Iterative post-order walk from `start`, finishing every vertex it
    /// reaches that is not already cached.
    fn solve(&mut self, start: usize) {
        // Frames are (vertex, index of the next successor to look at).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        self.visits[start] = Visit::OnPath;

        while let Some(frame) = stack.last_mut() {
            let (vertex, next) = *frame;
            if let Some(&child) = self.successors[vertex].get(next) {
                frame.1 += 1;
                if self.visits[child] == Visit::Fresh {
                    self.visits[child] = Visit::OnPath;
                    stack.push((child, 0));
                }
                // Done children are read from the cache when `vertex`
                // finishes; OnPath children contribute their own bit.
            } else {
                stack.pop();
                self.finish(vertex);
            }
        }
    }

    /// Computes and caches the closure of a vertex whose successors have all
    /// been visited.
    fn finish(&mut self, vertex: usize) {
        let mut closure = FixedBitSet::with_capacity(self.successors.len());
        closure.insert(vertex);
        for &child in &self.successors[vertex] {
            match &self.closures[child] {
                Some(child_closure) => closure.union_with(child_closure),
                None => closure.insert(child),
            }
        }
        self.closures[vertex] = Some(closure);
        self.visits[vertex] = Visit::Done;
    }
}

/// Computes the closure of every entry unit, in entry order.
///
/// Each entry maps to every unit reachable from it, itself included, so no
/// set is ever empty. Entries missing from the graph map to themselves
/// alone. Duplicate entries are reported once.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn transitive_closures(
    graph: &DependencyGraph,
    entries: &[impl AsRef<str>],
) -> ClosureMap {
    let mut engine = ClosureEngine::new(graph);
    let mut closures = ClosureMap::with_capacity(entries.len());
    let mut missing = 0usize;
    for entry in entries {
        let entry = entry.as_ref();
        if closures.contains_key(entry) {
            continue;
        }
        if !graph.contains(entry) {
            missing += 1;
        }
        closures.insert(entry.to_string(), engine.closure_of(entry));
    }
    debug!(
        cached = engine.cached_count(),
        missing, "Computed transitive closures"
    );
    closures
}
