//! Detecting which tests a change affects.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use fixedbitset::FixedBitSet;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::STATE_FILE;
use crate::checksum::{ChecksumMode, Checksummer, DELETED_CHECKSUM};
use crate::state::{Encoding, PersistedState};

/// Options for [`detect_changes`].
#[derive(Debug, Clone, Default)]
pub struct ChangeOptions {
    /// How checksums are computed. Must match the mode the state was
    /// written with.
    pub checksum_mode: ChecksumMode,
    /// All tests of the project. Defaults to the state's test table.
    ///
    /// A test the state never recorded cannot be affected by a checksum, so
    /// it lands in `non_affected`. Callers that list new tests should run
    /// them regardless.
    pub test_universe: Option<BTreeSet<String>>,
}

/// Partition of the test universe after comparing checksums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Tests depending on a changed resource, plus wildcard tests when
    /// anything changed. These must run.
    pub affected: BTreeSet<String>,
    /// Tests of the universe that are not affected. These may be skipped.
    pub non_affected: BTreeSet<String>,
    /// Resources whose checksum differs from the stored one.
    pub changed: BTreeSet<String>,
    /// Changed resources that could no longer be read.
    pub deleted: BTreeSet<String>,
}

/// Reads the persisted state in `artifacts_dir`.
///
/// Returns `None` when there is no prior state: the file is absent,
/// unreadable, or empty. Malformed content inside an otherwise readable file
/// is skipped record by record.
pub fn read_state(artifacts_dir: &Path) -> Option<PersistedState> {
    let path = artifacts_dir.join(STATE_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No prior state");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "Cannot read prior state; treating as first run");
            return None;
        }
    };
    if text.trim().is_empty() {
        warn!(path = %path.display(), "Prior state is empty; treating as first run");
        return None;
    }
    Some(PersistedState::decode(&text))
}

/// Compares every record of `state` against current resource contents.
pub fn compare_state(
    state: &PersistedState,
    checksummer: &Checksummer,
    test_universe: Option<&BTreeSet<String>>,
) -> ChangeSet {
    // Keyed by resource so the result does not depend on record order.
    let current: BTreeMap<&str, String> = state
        .records
        .iter()
        .map(|record| (record.resource.as_str(), checksummer.checksum(&record.resource)))
        .collect();

    let mut affected_bits = FixedBitSet::with_capacity(state.tests.len());
    let mut changes = ChangeSet::default();
    for record in &state.records {
        let checksum = &current[record.resource.as_str()];
        if *checksum == record.checksum {
            continue;
        }
        affected_bits.union_with(&record.tests);
        changes.changed.insert(record.resource.clone());
        if checksum == DELETED_CHECKSUM {
            changes.deleted.insert(record.resource.clone());
        }
    }

    changes.affected = state
        .test_names(&affected_bits)
        .map(str::to_string)
        .collect();
    let any_changed = !changes.changed.is_empty();
    if let Some(wildcard) = state.wildcard.as_ref().filter(|_| any_changed) {
        changes.affected.extend(wildcard.iter().cloned());
    }

    let universe: BTreeSet<&str> = match test_universe {
        Some(universe) => universe.iter().map(String::as_str).collect(),
        None => state.tests.iter().map(String::as_str).collect(),
    };
    changes.non_affected = universe
        .into_iter()
        .filter(|test| !changes.affected.contains(*test))
        .map(str::to_string)
        .collect();
    changes
}

/// Detects changes since the state in `artifacts_dir` was written.
///
/// Returns `None` when there is no prior state; the caller should run every
/// test and write a baseline.
#[instrument(skip_all, fields(dir = %artifacts_dir.display()))]
pub fn detect_changes(artifacts_dir: &Path, options: &ChangeOptions) -> Option<ChangeSet> {
    let start = Instant::now();
    let state = read_state(artifacts_dir)?;
    let changes = compare_state(
        &state,
        &Checksummer::new(options.checksum_mode),
        options.test_universe.as_ref(),
    );
    info!(
        encoding = %state.encoding,
        records = state.records.len(),
        changed = changes.changed.len(),
        deleted = changes.deleted.len(),
        affected = changes.affected.len(),
        non_affected = changes.non_affected.len(),
        elapsed = ?start.elapsed(),
        "Detected changes"
    );
    Some(changes)
}

/// Returns the resource ids tracked by the state in `artifacts_dir`.
///
/// Empty when there is no prior state.
pub fn tracked_resources(artifacts_dir: &Path) -> BTreeSet<String> {
    read_state(artifacts_dir)
        .map(|state| state.records.into_iter().map(|r| r.resource).collect())
        .unwrap_or_default()
}

/// Returns the encoding of the state in `artifacts_dir`, if there is one.
pub fn stored_encoding(artifacts_dir: &Path) -> Option<Encoding> {
    read_state(artifacts_dir).map(|state| state.encoding)
}
