//! Which tracked resources share tests with a given resource.
//!
//! When one resource pulls in far more tests than expected, the resources
//! with the largest test-set overlap usually point at the hub that connects
//! them. This is a read-only report over a [`PersistedState`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use serde::Serialize;

use crate::state::PersistedState;

/// Number of dotted segments in a package prefix.
const PACKAGE_DEPTH: usize = 3;

/// A tracked resource ranked against the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeRow {
    /// Resource id.
    pub resource: String,
    /// Tests shared with the target.
    pub overlap: usize,
    /// Overlap divided by the size of the union of both test sets.
    pub jaccard: f64,
    /// Number of tests depending on this resource.
    pub tests: usize,
}

/// Overlap ranking for one target resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeReport {
    /// Resolved target resource id.
    pub target: String,
    /// Number of tests depending on the target.
    pub target_tests: usize,
    /// Top rows, best first.
    pub rows: Vec<BridgeRow>,
    /// Summed overlap per package prefix, largest first.
    pub packages: Vec<(String, usize)>,
}

/// Normalizes path separators for matching.
fn normalize(resource: &str) -> String {
    resource.replace('\\', "/")
}

/// Finds the record for `target`, by exact id or by path suffix.
fn find_target(state: &PersistedState, target: &str) -> Option<usize> {
    if let Some(index) = state.records.iter().position(|r| r.resource == target) {
        return Some(index);
    }
    let suffix = normalize(target);
    state
        .records
        .iter()
        .position(|r| normalize(&r.resource).ends_with(&suffix))
}

/// Returns the dotted package prefix of a resource.
///
/// The part after `/classes/` (or the whole id) is split on separators and
/// dots, and the first three segments are kept.
pub fn package_prefix(resource: &str) -> String {
    let normalized = normalize(resource);
    let path = normalized
        .find("/classes/")
        .map_or(normalized.as_str(), |at| &normalized[at + "/classes/".len()..]);
    path.split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .take(PACKAGE_DEPTH)
        .collect::<Vec<_>>()
        .join(".")
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &FixedBitSet, b: &FixedBitSet, overlap: usize) -> f64 {
    let union = a.count_ones(..) + b.count_ones(..) - overlap;
    if union == 0 {
        0.0
    } else {
        overlap as f64 / union as f64
    }
}

/// Ranks every other tracked resource by test overlap with `target`.
///
/// Rows are ordered by overlap, then Jaccard similarity, then test count, all
/// descending, then by resource id. Resources sharing no test are left out.
/// Returns `None` when no record matches `target`.
pub fn bridges(state: &PersistedState, target: &str, limit: usize) -> Option<BridgeReport> {
    let index = find_target(state, target)?;
    let target_record = &state.records[index];
    let target_bits = &target_record.tests;

    let mut rows: Vec<BridgeRow> = state
        .records
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .filter_map(|(_, record)| {
            let overlap = target_bits.intersection_count(&record.tests);
            (overlap > 0).then(|| BridgeRow {
                resource: record.resource.clone(),
                overlap,
                jaccard: jaccard(target_bits, &record.tests, overlap),
                tests: record.tests.count_ones(..),
            })
        })
        .collect();

    let mut packages: BTreeMap<String, usize> = BTreeMap::new();
    for row in &rows {
        *packages.entry(package_prefix(&row.resource)).or_default() += row.overlap;
    }
    let mut packages: Vec<(String, usize)> = packages.into_iter().collect();
    packages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    packages.truncate(limit);

    rows.sort_by(BridgeRow::rank);
    rows.truncate(limit);

    Some(BridgeReport {
        target: target_record.resource.clone(),
        target_tests: target_bits.count_ones(..),
        rows,
        packages,
    })
}

impl BridgeRow {
    /// Orders rows best first.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .overlap
            .cmp(&self.overlap)
            .then_with(|| other.jaccard.total_cmp(&self.jaccard))
            .then_with(|| other.tests.cmp(&self.tests))
            .then_with(|| self.resource.cmp(&other.resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DependencyRecord;

    fn record(resource: &str, ones: &[usize]) -> DependencyRecord {
        let mut tests = FixedBitSet::with_capacity(8);
        for &i in ones {
            tests.insert(i);
        }
        DependencyRecord {
            resource: resource.to_string(),
            checksum: "x".to_string(),
            tests,
        }
    }

    fn state() -> PersistedState {
        PersistedState {
            tests: (0..8).map(|i| format!("T{i}")).collect(),
            records: vec![
                record("file:/b/classes/com/acme/type/Id.class", &[0, 1, 2, 3]),
                record("file:/b/classes/com/acme/core/A.class", &[0, 1, 2, 3]),
                record("file:/b/classes/com/acme/core/B.class", &[0, 1, 2, 3, 4, 5]),
                record("file:/b/classes/com/acme/web/C.class", &[3]),
                record("file:/b/classes/org/other/D.class", &[6, 7]),
            ],
            ..PersistedState::default()
        }
    }

    /// Rows rank by shared tests, then by Jaccard similarity.
    #[test]
    fn ranks_by_overlap_then_jaccard() {
        let report = bridges(&state(), "file:/b/classes/com/acme/type/Id.class", 10)
            .expect("target found");

        assert_eq!(report.target_tests, 4);
        let order: Vec<(&str, usize)> = report
            .rows
            .iter()
            .map(|r| (r.resource.as_str(), r.overlap))
            .collect();
        assert_eq!(
            order,
            vec![
                ("file:/b/classes/com/acme/core/A.class", 4),
                ("file:/b/classes/com/acme/core/B.class", 4),
                ("file:/b/classes/com/acme/web/C.class", 1),
            ]
        );
        assert!((report.rows[0].jaccard - 1.0).abs() < f64::EPSILON);
        assert!((report.rows[1].jaccard - 4.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn packages_aggregate_overlap() {
        let report = bridges(&state(), "Id.class", 10).expect("suffix match");

        assert_eq!(
            report.packages,
            vec![("com.acme.core".to_string(), 8), ("com.acme.web".to_string(), 1)]
        );
    }

    #[test]
    fn suffix_match_normalizes_separators() {
        let report = bridges(&state(), "com\\acme\\web\\C.class", 1).expect("found");
        assert_eq!(report.target, "file:/b/classes/com/acme/web/C.class");
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn unknown_target() {
        assert!(bridges(&state(), "Nope.class", 5).is_none());
    }

    #[test]
    fn package_prefix_follows_classes_dir() {
        assert_eq!(
            package_prefix("file:/b/classes/com/acme/core/A.class"),
            "com.acme.core"
        );
        assert_eq!(
            package_prefix("jar:file:/l.jar!/classes/org/acme/util/X.class"),
            "org.acme.util"
        );
    }
}
