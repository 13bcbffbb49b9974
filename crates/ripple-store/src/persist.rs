//! Writing the checksum state for the next run.
//!
//! Why: the next run can only narrow selection against what this run
//! recorded, so every resource a test reaches must land in the file.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fixedbitset::FixedBitSet;
use indexmap::IndexSet;
use ripple_schemas::{ClosureMap, RippleConfig};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::STATE_FILE;
use crate::checksum::{ChecksumMode, Checksummer, DELETED_CHECKSUM};
use crate::error::StoreError;
use crate::resource::{ResourceResolver, is_archive_member};
use crate::state::{DependencyRecord, Encoding, PersistedState};

/// Options for [`persist_state`].
#[derive(Debug, Clone, Default)]
pub struct PersistOptions {
    /// Encoding of the written file.
    pub encoding: Encoding,
    /// Track units that resolve into packaged archives.
    pub include_third_party_archives: bool,
    /// Tests that depend on everything (reflection-heavy, service loading).
    pub wildcard_tests: BTreeSet<String>,
    /// How checksums are computed. Must match the mode used to detect
    /// changes against this state.
    pub checksum_mode: ChecksumMode,
}

/// Counts of what [`build_state`] kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Units considered.
    pub units: usize,
    /// Matched by the ignorable patterns.
    pub ignorable: usize,
    /// No backing resource.
    pub unresolved: usize,
    /// Resource in a well-known external location.
    pub well_known: usize,
    /// Resource inside an archive, archives not tracked.
    pub archived: usize,
    /// Resource unreadable when checksummed.
    pub unreadable: usize,
    /// Records written.
    pub records: usize,
}

/// Builds the state to persist from this run's closures.
///
/// The closure map is inverted: each member unit gets a bitset over the test
/// table (the closure keys, in order) marking the tests that reach it.
/// `unreached` units are tracked too, with an empty test set, so that the
/// state lists every resource the build produced.
///
/// Each unit is then resolved and checksummed. Units that are ignorable,
/// unresolved, in a well-known location, archived (unless included), or
/// unreadable are dropped. Records come out sorted by resource id.
pub fn build_state(
    closures: &ClosureMap,
    resolver: &impl ResourceResolver,
    unreached: Option<&BTreeSet<String>>,
    config: &RippleConfig,
    options: &PersistOptions,
) -> (PersistedState, PersistStats) {
    let tests: IndexSet<String> = closures.keys().cloned().collect();

    let mut dependents: HashMap<&str, FixedBitSet> = HashMap::new();
    for (index, members) in closures.values().enumerate() {
        for member in members {
            dependents
                .entry(member.as_str())
                .or_insert_with(|| FixedBitSet::with_capacity(tests.len()))
                .insert(index);
        }
    }
    for unit in unreached.into_iter().flatten() {
        dependents
            .entry(unit.as_str())
            .or_insert_with(|| FixedBitSet::with_capacity(tests.len()));
    }

    let checksummer = Checksummer::new(options.checksum_mode);
    let mut stats = PersistStats {
        units: dependents.len(),
        ..PersistStats::default()
    };
    let mut by_resource: BTreeMap<String, (String, FixedBitSet)> = BTreeMap::new();
    for (unit, bits) in dependents {
        if config.ignorable.matches(unit) {
            stats.ignorable += 1;
            continue;
        }
        let Some(resource) = resolver.resolve(unit) else {
            stats.unresolved += 1;
            continue;
        };
        if config.well_known_locations.matches(&resource) {
            stats.well_known += 1;
            continue;
        }
        if !options.include_third_party_archives && is_archive_member(&resource) {
            stats.archived += 1;
            continue;
        }
        if let Some((_, existing)) = by_resource.get_mut(&resource) {
            // Several units backed by one resource.
            existing.union_with(&bits);
            continue;
        }
        let checksum = checksummer.checksum(&resource);
        if checksum == DELETED_CHECKSUM {
            stats.unreadable += 1;
            continue;
        }
        by_resource.insert(resource, (checksum, bits));
    }

    let records: Vec<DependencyRecord> = by_resource
        .into_iter()
        .map(|(resource, (checksum, tests))| DependencyRecord {
            resource,
            checksum,
            tests,
        })
        .collect();
    stats.records = records.len();

    let wildcard = (!options.wildcard_tests.is_empty())
        .then(|| options.wildcard_tests.clone());
    let state = PersistedState {
        tests,
        wildcard,
        records,
        encoding: options.encoding,
    };
    (state, stats)
}

/// Atomically replaces the state file in `artifacts_dir` with `state`.
///
/// The state is written to a temporary file in the same directory and
/// renamed over the old file, so a failed write leaves the previous state
/// intact.
///
/// Why: a truncated state file would read as a first run at best, or as a
/// narrower baseline at worst.
///
/// # Errors
///
/// Returns [`StoreError::is_io`] if the directory cannot be created or the
/// file cannot be written or renamed.
pub fn write_state(
    artifacts_dir: &Path,
    state: &PersistedState,
) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(artifacts_dir)?;
    let path = artifacts_dir.join(STATE_FILE);

    let temp = NamedTempFile::new_in(artifacts_dir)?;
    let mut writer = BufWriter::new(temp);
    state.encode(&mut writer)?;
    writer.flush()?;
    let temp = writer.into_inner().map_err(|err| err.into_error())?;
    temp.persist(&path).map_err(|err| err.error)?;

    debug!(path = %path.display(), records = state.records.len(), "Wrote state");
    Ok(path)
}

/// Computes and writes the full state for this run.
///
/// Returns the path written and what was kept.
///
/// # Errors
///
/// Returns [`StoreError::is_io`] if the state file cannot be written.
/// Nothing is written unless every record has been computed.
#[instrument(skip_all, fields(dir = %artifacts_dir.display(), encoding = %options.encoding))]
pub fn persist_state(
    closures: &ClosureMap,
    resolver: &impl ResourceResolver,
    artifacts_dir: &Path,
    unreached: Option<&BTreeSet<String>>,
    config: &RippleConfig,
    options: &PersistOptions,
) -> Result<(PathBuf, PersistStats), StoreError> {
    let start = Instant::now();
    let (state, stats) = build_state(closures, resolver, unreached, config, options);
    let path = write_state(artifacts_dir, &state)?;

    info!(
        tests = state.tests.len(),
        records = stats.records,
        unreached = unreached.map_or(0, BTreeSet::len),
        dropped_unresolved = stats.unresolved,
        dropped_unreadable = stats.unreadable,
        elapsed = ?start.elapsed(),
        "Persisted state"
    );
    Ok((path, stats))
}
