//! Building the pruned dependency graph from a raw dependency map.

use ripple_schemas::{DependencyMap, RippleConfig};
use tracing::{debug, instrument, warn};

use crate::bypass::{BypassStats, bypass_hubs};
use crate::filter::{Adjacency, filter_noise};
use crate::graph::DependencyGraph;

/// Which pruning passes to run before the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    /// Drop units matched by [`RippleConfig::noise`].
    pub exclude_noise: bool,
    /// Bypass units matched by [`RippleConfig::hub_markers`].
    pub bypass_hubs: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            exclude_noise: true,
            bypass_hubs: true,
        }
    }
}

/// Builds the pruned graph for a dependency map.
///
/// 1. Copies `deps`; the caller's map is never touched
/// 2. Drops noise vertices and edges, if enabled
/// 3. Bypasses hub vertices, if enabled
/// 4. Adds every remaining edge; sources without targets are kept as
///    isolated vertices
///
/// Sources are inserted in sorted order, so vertex ids are stable for
/// identical input. None of the steps can fail; an empty map yields an
/// empty graph.
#[instrument(skip_all, fields(units = deps.len()))]
pub fn build_graph(
    deps: &DependencyMap,
    config: &RippleConfig,
    options: GraphOptions,
) -> (DependencyGraph, BypassStats) {
    let mut adjacency: Adjacency = deps.clone();

    if options.exclude_noise {
        filter_noise(&mut adjacency, &config.noise);
    }

    let stats = if options.bypass_hubs {
        bypass_hubs(&mut adjacency, &config.hub_markers, config.bypass_edge_limit)
    } else {
        BypassStats::default()
    };

    let mut sources: Vec<(&String, _)> = adjacency.iter().collect();
    sources.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut graph = DependencyGraph::new();
    for (source, targets) in sources {
        let from = graph.add_vertex(source);
        let mut targets: Vec<&String> = targets.iter().collect();
        targets.sort_unstable();
        for target in targets {
            let to = graph.add_vertex(target);
            graph.add_new_edge(from, to);
        }
    }

    debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "Built dependency graph"
    );
    (graph, stats)
}

/// Adds manually declared `source target` edges to the graph.
///
/// Each line must hold exactly two whitespace-separated tokens. Anything
/// else is logged and skipped; a bad line never fails the run. Returns the
/// number of lines skipped.
pub fn add_extra_edges(
    graph: &mut DependencyGraph,
    edges: &[impl AsRef<str>],
) -> usize {
    let mut skipped = 0;
    for line in edges {
        let line = line.as_ref();
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(source), Some(target), None) => {
                graph.add_edge(source, target);
            }
            _ => {
                warn!(edge = %line, "Skipping malformed extra edge");
                skipped += 1;
            }
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::*;

    fn deps(edges: &[(&str, &[&str])]) -> DependencyMap {
        edges
            .iter()
            .map(|(from, to)| {
                (
                    (*from).to_string(),
                    to.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect()
    }

    fn edge_set(graph: &DependencyGraph) -> BTreeSet<(String, String)> {
        graph
            .edges()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn empty_input_builds_empty_graph() {
        let (graph, stats) = build_graph(
            &DependencyMap::new(),
            &RippleConfig::default(),
            GraphOptions::default(),
        );
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(stats, BypassStats::default());
    }

    #[test]
    fn isolated_vertices_are_retained() {
        let input = deps(&[("com.acme.Lonely", &[]), ("com.acme.A", &["com.acme.B"])]);
        let (graph, _) =
            build_graph(&input, &RippleConfig::default(), GraphOptions::default());

        assert!(graph.contains("com.acme.Lonely"));
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 1);
    }

    /// Filtering and bypass work on a copy.
    ///
    /// Why: callers reuse the dependency map for their own reports.
    #[test]
    fn caller_map_is_not_mutated() {
        let input = deps(&[
            ("com.acme.A", &["java.lang.Object", "com.acme.type.Id"]),
            ("com.acme.type.Id", &["com.acme.B"]),
        ]);
        let snapshot = input.clone();

        let (graph, _) =
            build_graph(&input, &RippleConfig::default(), GraphOptions::default());

        assert_eq!(input, snapshot);
        assert!(graph.has_edge("com.acme.A", "com.acme.B"));
        assert!(!graph.contains("java.lang.Object"));
        assert!(!graph.contains("com.acme.type.Id"));
    }

    #[test]
    fn passes_can_be_disabled() {
        let input = deps(&[
            ("com.acme.A", &["java.lang.Object", "com.acme.type.Id"]),
            ("com.acme.type.Id", &["com.acme.B"]),
        ]);
        let options = GraphOptions {
            exclude_noise: false,
            bypass_hubs: false,
        };

        let (graph, _) = build_graph(&input, &RippleConfig::default(), options);

        assert!(graph.has_edge("com.acme.A", "java.lang.Object"));
        assert!(graph.has_edge("com.acme.A", "com.acme.type.Id"));
        assert!(!graph.has_edge("com.acme.A", "com.acme.B"));
    }

    /// The same input always yields the same vertex ids and edges.
    ///
    /// Why: hub bypass order depends on ids; nondeterminism would change closures.
    #[test]
    fn identical_input_builds_identical_graph() {
        let input = deps(&[
            ("c.C", &["c.A", "c.B"]),
            ("c.B", &["c.A"]),
            ("c.D", &[]),
        ]);
        let config = RippleConfig::default();
        let (first, _) = build_graph(&input, &config, GraphOptions::default());
        let (second, _) = build_graph(&input, &config, GraphOptions::default());

        let first_units: Vec<_> = first.units().collect();
        let second_units: Vec<_> = second.units().collect();
        assert_eq!(first_units, second_units);
        assert_eq!(edge_set(&first), edge_set(&second));
    }

    /// Extra edge lines without exactly two tokens are skipped.
    ///
    /// Why: one bad hand-written line must not discard the rest.
    #[test]
    fn extra_edges_skip_malformed_lines() {
        let mut graph = DependencyGraph::new();
        let skipped = add_extra_edges(
            &mut graph,
            &["a.A a.B", "a.B", "a.C a.D a.E", "   a.B\ta.C  "],
        );

        assert_eq!(skipped, 2);
        assert_eq!(
            edge_set(&graph),
            BTreeSet::from([
                ("a.A".to_string(), "a.B".to_string()),
                ("a.B".to_string(), "a.C".to_string()),
            ])
        );
        let units: HashSet<_> = graph.units().collect();
        assert!(!units.contains("a.E"));
    }
}
