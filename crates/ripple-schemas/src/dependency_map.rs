//! Dependency and closure maps exchanged between pipeline phases.
//!
//! ## Terminology
//!
//! - **Unit**: a compiled artifact (for JVM projects, a class) identified by
//!   a dotted name such as `com.acme.Service`.
//! - **Dependency map**: unit → units it references, as reported by an
//!   external extractor.
//! - **Closure map**: unit of interest (typically a test) → every unit
//!   reachable from it, itself included.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::LoadError;

/// Raw extractor output: unit → set of units it references.
///
/// Keys are unique and set members carry no order. The core never mutates a
/// caller's map; every consumer works on its own copy.
pub type DependencyMap = HashMap<String, HashSet<String>>;

/// Per-entry reachability: entry unit → all units reachable from it.
///
/// Entries keep the order of the entry list they were computed for. Every
/// member set contains its own key.
pub type ClosureMap = IndexMap<String, BTreeSet<String>>;

/// Loads a [`DependencyMap`] from a JSON object file.
///
/// The expected shape is `{"unit": ["dep", ...], ...}`. A `null` dependency
/// list is accepted and read as an empty set, since extractors emit it for
/// units whose dependencies were not analyzed.
pub fn load_dependency_map(path: &Path) -> Result<DependencyMap, LoadError> {
    let json = fs::read_to_string(path)?;
    parse_dependency_map(&json)
}

/// Parses a [`DependencyMap`] from JSON text. See [`load_dependency_map`].
pub fn parse_dependency_map(json: &str) -> Result<DependencyMap, LoadError> {
    let raw: HashMap<String, Option<HashSet<String>>> =
        serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|(unit, deps)| (unit, deps.unwrap_or_default()))
        .collect())
}

/// Loads manually declared `source target` edge lines from a text file.
///
/// Blank lines and lines starting with `#` are skipped. The lines are
/// returned verbatim; validating the two-token shape is the graph builder's
/// job, so one bad line never fails the whole file.
pub fn load_extra_edges(path: &Path) -> Result<Vec<String>, LoadError> {
    read_lines(path)
}

/// Loads a list of unit names, one per line, e.g. the tests to analyze.
///
/// Same comment and blank-line rules as [`load_extra_edges`].
pub fn load_unit_list(path: &Path) -> Result<Vec<String>, LoadError> {
    read_lines(path)
}

fn read_lines(path: &Path) -> Result<Vec<String>, LoadError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
