//! Resolving units to the resources that back them.
//!
//! A resource id is a URL-like string naming where a unit's bytes live:
//!
//! - `file:/abs/path/com/acme/Widget.class` for a file on disk
//! - `jar:file:/abs/lib.jar!/com/acme/Widget.class` for an archive member
//!
//! Ids never contain raw spaces (they are written as `%20`), because the
//! persisted format separates fields with whitespace.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;

/// Maps a unit identifier to the resource that holds its content.
///
/// Implementations stand in for the build tool's classpath or module
/// resolution. Returning `None` means the unit has no local resource (a
/// JDK class, a unit the build no longer produces) and is not tracked.
pub trait ResourceResolver {
    /// Returns the resource id for `unit`, if it resolves.
    fn resolve(&self, unit: &str) -> Option<String>;
}

impl<F> ResourceResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, unit: &str) -> Option<String> {
        self(unit)
    }
}

/// Where a resource id points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    /// A plain file.
    File(PathBuf),
    /// A member of a packaged archive.
    ArchiveMember {
        /// Path of the archive file.
        archive: PathBuf,
        /// Entry name inside the archive.
        entry: String,
    },
}

impl ResourceSource {
    /// Parses a resource id. Returns `None` for unknown schemes.
    pub fn parse(resource: &str) -> Option<Self> {
        if let Some(rest) = resource.strip_prefix("jar:file:") {
            let (archive, entry) = rest.split_once("!/")?;
            return Some(ResourceSource::ArchiveMember {
                archive: PathBuf::from(decode(archive)),
                entry: decode(entry),
            });
        }
        resource
            .strip_prefix("file:")
            .map(|path| ResourceSource::File(PathBuf::from(decode(path))))
    }
}

/// Returns the `file:` resource id for a path.
pub fn file_resource_id(path: &Path) -> String {
    format!("file:{}", encode(&path.to_string_lossy()))
}

/// Returns the `jar:file:` resource id for an archive member.
pub fn archive_resource_id(archive: &Path, entry: &str) -> String {
    format!(
        "jar:file:{}!/{}",
        encode(&archive.to_string_lossy()),
        encode(entry)
    )
}

/// Returns true if the resource lives inside a packaged archive.
pub fn is_archive_member(resource: &str) -> bool {
    resource.starts_with("jar:")
}

/// Maps a dotted unit name to its relative resource path.
///
/// `com.acme.Widget` with extension `.class` becomes
/// `com/acme/Widget.class`.
pub fn unit_to_resource_path(unit: &str, extension: &str) -> String {
    format!("{}{extension}", unit.replace('.', "/"))
}

fn encode(text: &str) -> String {
    text.replace('%', "%25").replace(' ', "%20")
}

fn decode(text: &str) -> String {
    text.replace("%20", " ").replace("%25", "%")
}

/// Resolves units against classpath directory roots.
///
/// Roots are searched in order and the first existing file wins, matching
/// classpath shadowing. Archive roots are not searched: units found only in
/// archives are treated as external.
#[derive(Debug, Clone)]
pub struct ClasspathResolver {
    roots: Vec<PathBuf>,
    extension: String,
}

impl ClasspathResolver {
    /// Creates a resolver over the directory entries of `classpath`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error ([`StoreError::is_configuration`]) if
    /// no entry of `classpath` is an existing directory: with nothing to
    /// resolve against, every dependency would silently go untracked.
    pub fn new(
        classpath: impl IntoIterator<Item = PathBuf>,
        extension: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let (roots, skipped): (Vec<PathBuf>, Vec<PathBuf>) =
            classpath.into_iter().partition(|root| root.is_dir());
        if !skipped.is_empty() {
            debug!(?skipped, "Ignoring classpath entries that are not directories");
        }
        if roots.is_empty() {
            return Err(StoreError::configuration(
                "classpath has no existing directory to resolve units against",
            ));
        }
        Ok(Self {
            roots,
            extension: extension.into(),
        })
    }

    /// Returns the directory roots in search order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ResourceResolver for ClasspathResolver {
    fn resolve(&self, unit: &str) -> Option<String> {
        let relative = unit_to_resource_path(unit, &self.extension);
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
            .map(|path| file_resource_id(&path))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn file_ids_roundtrip_with_spaces() {
        let path = Path::new("/tmp/my dir/100%/A.class");
        let id = file_resource_id(path);

        assert_eq!(id, "file:/tmp/my%20dir/100%25/A.class");
        assert!(!id.contains(' '));
        assert_eq!(
            ResourceSource::parse(&id),
            Some(ResourceSource::File(path.to_path_buf()))
        );
    }

    #[test]
    fn archive_ids_parse() {
        let id = archive_resource_id(Path::new("/libs/a.jar"), "com/acme/A.class");

        assert_eq!(id, "jar:file:/libs/a.jar!/com/acme/A.class");
        assert!(is_archive_member(&id));
        assert_eq!(
            ResourceSource::parse(&id),
            Some(ResourceSource::ArchiveMember {
                archive: PathBuf::from("/libs/a.jar"),
                entry: "com/acme/A.class".into(),
            })
        );
    }

    #[test]
    fn unknown_scheme_does_not_parse() {
        assert_eq!(ResourceSource::parse("http://example.com/A.class"), None);
        assert_eq!(ResourceSource::parse("jar:file:/no-separator.jar"), None);
    }

    #[test]
    fn unit_maps_to_relative_path() {
        assert_eq!(
            unit_to_resource_path("com.acme.Outer$Inner", ".class"),
            "com/acme/Outer$Inner.class"
        );
    }

    /// A classpath with no existing directory is a configuration error.
    ///
    /// Why: this is the one fatal precondition; a silent empty resolver tracks nothing.
    #[test]
    fn classpath_without_directories_is_configuration_error() {
        let err = ClasspathResolver::new(
            [PathBuf::from("/nonexistent/classes"), PathBuf::from("lib.jar")],
            ".class",
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    /// The first classpath root holding a unit resolves it.
    ///
    /// Why: classpath order decides which copy of a class is loaded.
    #[test]
    fn first_matching_root_wins() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(first.path().join("com/acme")).unwrap();
        fs::create_dir_all(second.path().join("com/acme")).unwrap();
        fs::write(second.path().join("com/acme/A.class"), b"second").unwrap();
        fs::write(second.path().join("com/acme/B.class"), b"b").unwrap();
        fs::write(first.path().join("com/acme/A.class"), b"first").unwrap();

        let resolver = ClasspathResolver::new(
            [first.path().to_path_buf(), second.path().to_path_buf()],
            ".class",
        )
        .expect("valid classpath");

        assert_eq!(
            resolver.resolve("com.acme.A"),
            Some(file_resource_id(&first.path().join("com/acme/A.class")))
        );
        assert_eq!(
            resolver.resolve("com.acme.B"),
            Some(file_resource_id(&second.path().join("com/acme/B.class")))
        );
        assert_eq!(resolver.resolve("com.acme.Missing"), None);
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |unit: &str| (unit == "A").then(|| "file:/A".to_string());
        assert_eq!(resolver.resolve("A"), Some("file:/A".into()));
        assert_eq!(resolver.resolve("B"), None);
    }
}
