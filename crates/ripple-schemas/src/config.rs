//! Run configuration for the graph and store phases.
//!
//! The defaults encode what is uninteresting in a typical JVM project:
//! the standard library, logging and test frameworks, serialization
//! libraries, and generated message/utility packages. Projects in other
//! ecosystems override them with a JSON file loaded by [`load_config`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::patterns::PatternSet;

/// Above this many potential rerouted edges, a hub vertex is cut instead of
/// bypassed.
pub const DEFAULT_BYPASS_EDGE_LIMIT: u64 = 200_000;

/// Configuration shared by graph building and state persistence.
///
/// Every field has a default, so a config file only needs the fields it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    /// Units removed from the graph by the noise filter.
    pub noise: PatternSet,
    /// Units treated as pure indirection and bypassed.
    pub hub_markers: PatternSet,
    /// Guard on `predecessors × successors` for a single hub bypass.
    pub bypass_edge_limit: u64,
    /// Well-known external or ignorable internal units. They are never
    /// persisted and do not count as unreached.
    pub ignorable: PatternSet,
    /// Resource ids (locations) that are never tracked.
    pub well_known_locations: PatternSet,
    /// File extension appended when mapping a unit to its resource path.
    pub resource_extension: String,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            noise: PatternSet::from_parts(
                &[
                    "java.",
                    "javax.",
                    "jakarta.",
                    "org.slf4j.",
                    "ch.qos.logback.",
                    "org.apache.logging.",
                    "org.junit.",
                    "org.mockito.",
                    "org.assertj.",
                    "com.fasterxml.",
                ],
                &[".nls.", ".utils."],
            ),
            hub_markers: PatternSet::from_parts(&[], &[".type."]),
            bypass_edge_limit: DEFAULT_BYPASS_EDGE_LIMIT,
            ignorable: PatternSet::from_parts(
                &[
                    "java.",
                    "javax.",
                    "jdk.",
                    "sun.",
                    "com.sun.",
                    "org.junit.",
                    "junit.",
                    "org.hamcrest.",
                    "org.mockito.",
                    "org.jacoco.",
                    "org.apache.maven.",
                ],
                &[],
            ),
            well_known_locations: PatternSet::from_parts(
                &[],
                &[
                    "/jre/lib/",
                    "/jdk/",
                    "junit",
                    "hamcrest",
                    "surefire",
                    "/org/apache/maven/",
                ],
            ),
            resource_extension: ".class".to_string(),
        }
    }
}

/// Loads a [`RippleConfig`] from a JSON file.
///
/// Missing fields fall back to their defaults.
pub fn load_config(path: &Path) -> Result<RippleConfig, LoadError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::patterns::Pattern;

    #[test]
    fn defaults_classify_jvm_noise() {
        let config = RippleConfig::default();
        assert!(config.noise.matches("java.util.List"));
        assert!(config.noise.matches("com.acme.nls.Messages"));
        assert!(!config.noise.matches("com.acme.type.Money"));
        assert!(config.hub_markers.matches("com.acme.type.Money"));
        assert_eq!(config.bypass_edge_limit, 200_000);
    }

    /// Fields missing from a config file keep their defaults.
    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"hub_markers": [{{"contains": ".dto."}}], "bypass_edge_limit": 10}}"#
        )
        .unwrap();

        let config = load_config(file.path()).expect("valid config");
        assert_eq!(
            config.hub_markers.patterns(),
            &[Pattern::Contains(".dto.".into())]
        );
        assert_eq!(config.bypass_edge_limit, 10);
        assert_eq!(config.noise, RippleConfig::default().noise);
        assert_eq!(config.resource_extension, ".class");
    }

    #[test]
    fn malformed_file_is_deserialization_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.is_deserialization());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = RippleConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: RippleConfig =
            serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, config);
    }
}
