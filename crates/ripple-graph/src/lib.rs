//! Dependency graph construction and per-test reachability.
//!
//! This crate turns raw "unit references unit" edges into the set of units
//! each test can reach. It is the first phase of the ripple pipeline; the
//! resulting [`ClosureMap`] is what `ripple-store` persists and compares.
//!
//! ## Algorithm
//!
//! 1. Copy the raw dependency map and drop noise units (standard library,
//!    logging and test frameworks, ...)
//! 2. Bypass hub units: connect their predecessors straight to their
//!    successors, then delete them
//! 3. Build a petgraph `DiGraph` over the remaining units, plus any manually
//!    declared extra edges
//! 4. Compute each entry's transitive closure with a memoized, iterative
//!    post-order walk over bitsets
//! 5. Optionally, report the units no closure reaches
//!
//! ## Usage
//!
//! ```
//! use std::collections::{HashMap, HashSet};
//!
//! use ripple_graph::{AnalyzeOptions, analyze};
//! use ripple_schemas::RippleConfig;
//!
//! let deps = HashMap::from([
//!     ("T1".to_string(), HashSet::from(["A".to_string()])),
//! ]);
//! let analysis = analyze(
//!     &deps,
//!     &[] as &[&str],
//!     &["T1"],
//!     &RippleConfig::default(),
//!     AnalyzeOptions::default(),
//! );
//! assert!(analysis.closures["T1"].contains("A"));
//! ```

mod builder;
mod bypass;
mod closure;
mod filter;
mod graph;
mod unreached;

use std::collections::BTreeSet;
use std::time::Instant;

use ripple_schemas::{ClosureMap, DependencyMap, RippleConfig};
use tracing::{info, info_span};

#[doc(inline)]
pub use crate::builder::{GraphOptions, add_extra_edges, build_graph};
#[doc(inline)]
pub use crate::bypass::BypassStats;
#[doc(inline)]
pub use crate::closure::{ClosureEngine, transitive_closures};
#[doc(inline)]
pub use crate::graph::DependencyGraph;
#[doc(inline)]
pub use crate::unreached::find_unreached;

/// Options for a full [`analyze`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Pruning passes applied before the graph is built.
    pub graph: GraphOptions,
    /// Whether to compute the unreached set.
    pub compute_unreached: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            graph: GraphOptions::default(),
            compute_unreached: true,
        }
    }
}

/// Result of the graph phase.
#[derive(Debug)]
pub struct Analysis {
    /// The pruned graph, extra edges included.
    pub graph: DependencyGraph,
    /// Closure of every entry unit, in entry order.
    pub closures: ClosureMap,
    /// Trackable units no closure reaches, if requested.
    pub unreached: Option<BTreeSet<String>>,
    /// What the hub bypass did.
    pub bypass: BypassStats,
}

/// Builds the graph and per-entry closures for one run.
///
/// `extra_edges` are `source target` lines for relations the extractor
/// cannot see (reflection, service loading); malformed lines are logged and
/// skipped. Every entry gets a closure, including entries the graph does not
/// know. Never fails.
pub fn analyze(
    deps: &DependencyMap,
    extra_edges: &[impl AsRef<str>],
    entries: &[impl AsRef<str>],
    config: &RippleConfig,
    options: AnalyzeOptions,
) -> Analysis {
    let _span = info_span!("analyze").entered();

    let start = Instant::now();
    let (mut graph, bypass) = build_graph(deps, config, options.graph);
    let skipped = add_extra_edges(&mut graph, extra_edges);
    let graph_time = start.elapsed();

    let closures = transitive_closures(&graph, entries);
    let closure_time = start.elapsed() - graph_time;

    let unreached = options
        .compute_unreached
        .then(|| find_unreached(deps, &closures, &config.ignorable));
    let total_time = start.elapsed();

    info!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        extra_edges_skipped = skipped,
        ?graph_time,
        ?closure_time,
        unreached_time = ?(total_time - graph_time - closure_time),
        ?total_time,
        "Analyzed dependency graph"
    );

    Analysis {
        graph,
        closures,
        unreached,
        bypass,
    }
}
