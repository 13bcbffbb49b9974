//! Persisted checksum state and change detection.
//!
//! Each run records, for every tracked dependency, a content checksum and the
//! set of tests whose closure contains it. The next run recomputes the
//! checksums: a test is affected when any dependency it reaches changed.
//!
//! ## Run cycle
//!
//! 1. [`detect_changes`] reads `deps.zlc` from the artifacts directory. No
//!    file means no prior state, and every test runs.
//! 2. The caller runs the affected tests.
//! 3. [`persist_state`] rewrites the file from this run's closures.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! use ripple_schemas::{ClosureMap, RippleConfig};
//! use ripple_store::{
//!     ChangeOptions, ClasspathResolver, PersistOptions, detect_changes, persist_state,
//! };
//!
//! # fn main() -> Result<(), ripple_store::StoreError> {
//! let artifacts = Path::new("target/ripple");
//! let closures = ClosureMap::new();
//! let config = RippleConfig::default();
//! let resolver = ClasspathResolver::new(
//!     [PathBuf::from("target/classes"), PathBuf::from("target/test-classes")],
//!     &config.resource_extension,
//! )?;
//!
//! if let Some(changes) = detect_changes(artifacts, &ChangeOptions::default()) {
//!     println!("run: {:?}", changes.affected);
//! }
//! persist_state(&closures, &resolver, artifacts, None, &config, &PersistOptions::default())?;
//! # Ok(())
//! # }
//! ```

mod bridges;
mod changes;
mod checksum;
mod error;
mod persist;
mod resource;
mod state;

#[doc(inline)]
pub use crate::bridges::{BridgeReport, BridgeRow, bridges, package_prefix};
#[doc(inline)]
pub use crate::changes::{
    ChangeOptions, ChangeSet, compare_state, detect_changes, read_state, stored_encoding,
    tracked_resources,
};
#[doc(inline)]
pub use crate::checksum::{ChecksumMode, Checksummer, DELETED_CHECKSUM};
#[doc(inline)]
pub use crate::error::StoreError;
#[doc(inline)]
pub use crate::persist::{PersistOptions, PersistStats, build_state, persist_state, write_state};
#[doc(inline)]
pub use crate::resource::{
    ClasspathResolver, ResourceResolver, ResourceSource, archive_resource_id, file_resource_id,
    is_archive_member, unit_to_resource_path,
};
#[doc(inline)]
pub use crate::state::{DependencyRecord, Encoding, PersistedState, WILDCARD_RESOURCE};

/// Name of the state file inside the artifacts directory.
pub const STATE_FILE: &str = "deps.zlc";
