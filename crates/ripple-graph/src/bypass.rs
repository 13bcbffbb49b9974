//! Hub bypass: removing pure-indirection vertices.
//!
//! Some units (value types, constants holders) are referenced by nearly
//! everything and reference a lot in turn. Left in the graph they glue
//! unrelated tests together. Bypassing a hub `T` replaces every path
//! `P → T → S` with a direct edge `P → S` and then deletes `T`, so business
//! connectivity through the hub survives while the hub itself stops being a
//! shared dependency.
//!
//! ## Guard
//!
//! Rerouting a hub creates up to `|preds(T)| × |succs(T)|` edges. When that
//! product exceeds the configured limit the hub is deleted without
//! rerouting: a deliberate connectivity cut that keeps the edge count from
//! blowing up quadratically on hyper-connected hubs.

use std::collections::{HashMap, HashSet};

use ripple_schemas::PatternSet;
use tracing::{debug, warn};

use crate::filter::Adjacency;

/// Outcome of a bypass pass, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BypassStats {
    /// Hub vertices removed from the graph.
    pub hubs_removed: usize,
    /// Hubs removed without rerouting because they tripped the guard.
    pub hubs_cut: usize,
    /// Direct edges added in place of hub paths.
    pub edges_added: usize,
}

/// Reroutes around and then deletes every source vertex matched by `markers`.
///
/// Only units that appear as keys are hubs: a marker unit that is never a
/// source has no successors to reroute to and stays in place as a leaf.
/// Hubs are processed in sorted order so the result does not depend on hash
/// iteration order. Successors that are themselves marker units are never
/// linked to directly, and no self-loops are created.
pub(crate) fn bypass_hubs(
    adjacency: &mut Adjacency,
    markers: &PatternSet,
    edge_limit: u64,
) -> BypassStats {
    let mut stats = BypassStats::default();
    if markers.is_empty() {
        return stats;
    }

    let mut hubs: Vec<String> = adjacency
        .keys()
        .filter(|unit| markers.matches(unit))
        .cloned()
        .collect();
    if hubs.is_empty() {
        return stats;
    }
    hubs.sort_unstable();

    // Predecessors are computed once, before any rerouting.
    let mut predecessors: HashMap<String, HashSet<String>> = HashMap::new();
    for (source, targets) in adjacency.iter() {
        for target in targets {
            predecessors
                .entry(target.clone())
                .or_default()
                .insert(source.clone());
        }
    }

    let empty = HashSet::new();
    for hub in &hubs {
        let preds = predecessors.get(hub).unwrap_or(&empty);
        let succs: Vec<String> = adjacency
            .get(hub)
            .map(|s| {
                s.iter()
                    .filter(|succ| !markers.matches(succ))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let succ_count = adjacency.get(hub).map_or(0, HashSet::len);
        let potential = preds.len() as u64 * succ_count as u64;
        if potential > edge_limit {
            warn!(
                hub = %hub,
                predecessors = preds.len(),
                successors = succ_count,
                edge_limit,
                "Hub too connected to bypass, cutting it"
            );
            stats.hubs_cut += 1;
            continue;
        }

        for pred in preds {
            let out = adjacency.entry(pred.clone()).or_default();
            for succ in &succs {
                if pred != succ && out.insert(succ.clone()) {
                    stats.edges_added += 1;
                }
            }
        }
    }

    // Delete the hubs and every edge pointing at them.
    let hub_set: HashSet<&str> = hubs.iter().map(String::as_str).collect();
    adjacency.retain(|unit, _| !hub_set.contains(unit.as_str()));
    for targets in adjacency.values_mut() {
        targets.retain(|target| !hub_set.contains(target.as_str()));
    }
    stats.hubs_removed = hubs.len();

    debug!(
        hubs_removed = stats.hubs_removed,
        hubs_cut = stats.hubs_cut,
        edges_added = stats.edges_added,
        "Bypassed hub vertices"
    );
    stats
}
