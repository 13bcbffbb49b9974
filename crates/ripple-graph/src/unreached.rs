//! Units the extractor saw but no test reaches.
//!
//! Why: they are still build output, and listing them lets the store track
//! resources that a future test might start to reach.

use std::collections::{BTreeSet, HashSet};

use ripple_schemas::{ClosureMap, DependencyMap, PatternSet};
use tracing::info;

/// Returns the trackable units of `deps` that appear in no closure.
///
/// A unit is trackable when it has recorded dependencies (every unit under
/// analysis references at least its base type), or when `ignorable` does
/// not match it. Units with an empty dependency list that are ignorable are
/// libraries the extractor did not descend into.
///
/// Reached units are every closure key plus every closure member. Used for
/// coverage reporting only; selection never consults it.
pub fn find_unreached(
    deps: &DependencyMap,
    closures: &ClosureMap,
    ignorable: &PatternSet,
) -> BTreeSet<String> {
    let reached: HashSet<&str> = closures
        .iter()
        .flat_map(|(entry, members)| {
            std::iter::once(entry.as_str())
                .chain(members.iter().map(String::as_str))
        })
        .collect();

    let mut trackable = 0usize;
    let unreached: BTreeSet<String> = deps
        .iter()
        .filter(|(unit, targets)| {
            !targets.is_empty() || !ignorable.matches(unit)
        })
        .inspect(|_| trackable += 1)
        .filter(|(unit, _)| !reached.contains(unit.as_str()))
        .map(|(unit, _)| unit.clone())
        .collect();

    info!(
        trackable,
        unreached = unreached.len(),
        "Computed unreached units"
    );
    unreached
}

#[cfg(test)]
mod tests {
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

    fn closures(entries: &[(&str, &[&str])]) -> ClosureMap {
        entries
            .iter()
            .map(|(entry, members)| {
                (
                    (*entry).to_string(),
                    members.iter().map(|m| (*m).to_string()).collect(),
                )
            })
            .collect()
    }

    /// Units no closure reaches are reported unless ignorable.
    #[test]
    fn unreached_is_trackable_minus_reached() {
        let deps = deps(&[
            ("T1", &["A"]),
            ("A", &["java.lang.Object"]),
            ("Dead", &["java.lang.Object"]),
            ("java.lang.Object", &[]),
        ]);
        let closures = closures(&[("T1", &["T1", "A"])]);
        let ignorable = PatternSet::from_parts(&["java."], &[]);

        let unreached = find_unreached(&deps, &closures, &ignorable);

        assert_eq!(unreached, BTreeSet::from(["Dead".to_string()]));
    }

    #[test]
    fn leaf_units_count_unless_ignorable() {
        let deps = deps(&[("com.acme.Leaf", &[]), ("java.util.List", &[])]);
        let unreached =
            find_unreached(&deps, &ClosureMap::new(), &PatternSet::from_parts(&["java."], &[]));

        assert_eq!(unreached, BTreeSet::from(["com.acme.Leaf".to_string()]));
    }

    #[test]
    fn closure_keys_count_as_reached() {
        let deps = deps(&[("T", &["A"])]);
        let unreached =
            find_unreached(&deps, &closures(&[("T", &[])]), &PatternSet::new());
        assert!(unreached.is_empty());
    }
}
