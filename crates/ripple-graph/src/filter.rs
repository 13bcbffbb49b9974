//! Noise filtering over a raw adjacency map.
//!
//! Standard library, logging, test-framework and serialization units are
//! referenced by almost everything. They add nothing to test selection and
//! dominate the graph's size, so they are dropped before the graph is built.

use std::collections::{HashMap, HashSet};

use ripple_schemas::PatternSet;
use tracing::debug;

/// Adjacency map the pruning passes work on: unit → referenced units.
pub(crate) type Adjacency = HashMap<String, HashSet<String>>;

/// Removes every vertex and edge endpoint matched by `noise`.
///
/// Purely subtractive: the result never contains a unit or edge that was
/// not in the input.
pub(crate) fn filter_noise(adjacency: &mut Adjacency, noise: &PatternSet) {
    if noise.is_empty() {
        return;
    }
    let before = adjacency.len();
    adjacency.retain(|unit, _| !noise.matches(unit));
    for targets in adjacency.values_mut() {
        targets.retain(|target| !noise.matches(target));
    }
    debug!(
        removed = before - adjacency.len(),
        remaining = adjacency.len(),
        "Filtered noise vertices"
    );
}

#[cfg(test)]
mod tests {
    use proptest::collection::{hash_map, hash_set};
    use proptest::prelude::*;

    use super::*;

    fn adjacency(edges: &[(&str, &[&str])]) -> Adjacency {
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

    /// Noise units vanish as keys and as dependencies.
    ///
    /// Why: a dangling edge to a removed unit would re-create it as a vertex.
    #[test]
    fn removes_matching_sources_and_targets() {
        let mut adj = adjacency(&[
            ("com.acme.Service", &["java.lang.String", "com.acme.Repo"]),
            ("org.slf4j.Logger", &["com.acme.Repo"]),
            ("com.acme.utils.Strings", &[]),
            ("com.acme.Repo", &[]),
        ]);
        let noise = PatternSet::from_parts(&["java.", "org.slf4j."], &[".utils."]);

        filter_noise(&mut adj, &noise);

        assert_eq!(
            adj,
            adjacency(&[
                ("com.acme.Service", &["com.acme.Repo"]),
                ("com.acme.Repo", &[]),
            ])
        );
    }

    #[test]
    fn empty_pattern_set_is_identity() {
        let mut adj = adjacency(&[("java.lang.Object", &["java.lang.Class"])]);
        let expected = adj.clone();
        filter_noise(&mut adj, &PatternSet::new());
        assert_eq!(adj, expected);
    }

    fn arb_adjacency() -> impl Strategy<Value = Adjacency> {
        let unit = prop_oneof![
            "java\\.[a-z]{1,3}\\.[A-Z][a-z]{0,3}",
            "com\\.acme\\.[A-Z][a-z]{0,3}",
        ]
        .boxed();
        hash_map(unit.clone(), hash_set(unit, 0..4), 0..12)
    }

    proptest! {
        /// Filtering never introduces a vertex or an edge.
        #[test]
        fn filtering_is_subtractive(original in arb_adjacency()) {
            let mut filtered = original.clone();
            filter_noise(&mut filtered, &PatternSet::from_parts(&["java."], &[]));

            for (unit, targets) in &filtered {
                prop_assert!(original.contains_key(unit));
                prop_assert!(targets.is_subset(&original[unit]));
                prop_assert!(!unit.starts_with("java."));
                prop_assert!(targets.iter().all(|t| !t.starts_with("java.")));
            }
        }
    }
}
