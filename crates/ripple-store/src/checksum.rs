//! Content checksums of resources.

use std::fs;

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::resource::ResourceSource;

/// Checksum recorded for a resource that cannot be read.
///
/// Never persisted: a resource whose checksum is the sentinel at write time
/// is dropped from the state. At read time it marks the resource deleted.
pub const DELETED_CHECKSUM: &str = "-1";

/// How resource bytes are fed to the hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Hash the bytes as stored.
    #[default]
    Raw,
    /// For text resources, hash lines with trailing whitespace stripped and
    /// line endings unified, so whitespace-only edits do not count as
    /// changes. Binary resources are hashed raw.
    ///
    /// Compiled `.class` files are binary, so under the default
    /// `resource_extension` this mode hashes exactly like [`Raw`](Self::Raw).
    /// It only matters when the tracked resources are text.
    Normalized,
}

/// Computes resource checksums.
///
/// Checksums are lowercase hex SHA-256 digests. A resource inside an
/// archive is checksummed by the whole archive's bytes, so any change to
/// the archive changes all of its members.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksummer {
    mode: ChecksumMode,
}

impl Checksummer {
    /// Creates a checksummer using `mode`.
    pub fn new(mode: ChecksumMode) -> Self {
        Self { mode }
    }

    /// Returns the configured mode.
    pub fn mode(&self) -> ChecksumMode {
        self.mode
    }

    /// Returns the checksum of a resource, or [`DELETED_CHECKSUM`] when the
    /// id does not parse or the bytes cannot be read.
    pub fn checksum(&self, resource: &str) -> String {
        let path = match ResourceSource::parse(resource) {
            Some(ResourceSource::File(path)) => path,
            Some(ResourceSource::ArchiveMember { archive, .. }) => archive,
            None => {
                trace!(resource, "Unknown resource scheme");
                return DELETED_CHECKSUM.to_string();
            }
        };
        match fs::read(&path) {
            Ok(bytes) => self.checksum_bytes(&bytes),
            Err(err) => {
                trace!(resource, %err, "Resource unreadable");
                DELETED_CHECKSUM.to_string()
            }
        }
    }

    /// Returns the checksum of in-memory content.
    pub fn checksum_bytes(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        match (self.mode, std::str::from_utf8(bytes)) {
            (ChecksumMode::Normalized, Ok(text)) => {
                for line in text.lines() {
                    hasher.update(line.trim_end().as_bytes());
                    hasher.update(b"\n");
                }
            }
            _ => hasher.update(bytes),
        }
        hex::encode(hasher.finalize())
    }
}
