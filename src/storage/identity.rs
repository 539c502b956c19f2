//! Snapshot file identities

use std::path::{Path, PathBuf};

use crate::digest::{self, DIGEST_LEN};
use crate::fingerprint::Fingerprint;
use crate::{Result, SnapError};

/// Extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Maximum length of a scope name
const MAX_SCOPE_LEN: usize = 255;

/// Where a fingerprint lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotFileIdentity {
    /// Full path of the snapshot file
    pub absolute_path: PathBuf,
    /// Path relative to the snapshot root, `/`-separated
    pub relative_file_name: String,
    /// Fingerprint name prefix
    pub name_prefix: String,
    /// Fingerprint suffix key
    pub suffix_key: String,
}

impl SnapshotFileIdentity {
    /// Derive the identity of a fingerprint under `root`, optionally nested
    /// in a per-test `scope` directory
    #[must_use]
    pub fn derive(root: &Path, scope: Option<&str>, fingerprint: &Fingerprint) -> Self {
        let file_name = file_name_for(&fingerprint.name_prefix, &fingerprint.suffix_key);

        let (absolute_path, relative_file_name) = match scope {
            Some(scope) => (
                root.join(scope).join(&file_name),
                format!("{scope}/{file_name}"),
            ),
            None => (root.join(&file_name), file_name),
        };

        Self {
            absolute_path,
            relative_file_name,
            name_prefix: fingerprint.name_prefix.clone(),
            suffix_key: fingerprint.suffix_key.clone(),
        }
    }

    /// Bare file name, without scope directory
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_file_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_file_name)
    }

    /// Directory holding the snapshot file
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.absolute_path.parent()
    }
}

/// File name for a prefix and suffix key: `<prefix>-<digest>.json`
#[must_use]
pub fn file_name_for(name_prefix: &str, suffix_key: &str) -> String {
    let digest = digest::encode(suffix_key);
    if name_prefix.is_empty() {
        format!("{digest}.{SNAPSHOT_EXTENSION}")
    } else {
        format!("{name_prefix}-{digest}.{SNAPSHOT_EXTENSION}")
    }
}

/// Split a snapshot file name into its name prefix and digest
///
/// Returns `None` for files that were not named by [`file_name_for`].
#[must_use]
pub fn split_file_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name.strip_suffix(SNAPSHOT_EXTENSION)?.strip_suffix('.')?;

    if stem.len() == DIGEST_LEN {
        return digest::is_digest(stem).then_some(("", stem));
    }

    let split = stem.len().checked_sub(DIGEST_LEN + 1)?;
    let prefix = stem.get(..split)?;
    let rest = stem.get(split..)?;
    let digest = rest.strip_prefix('-')?;

    (digest::is_digest(digest) && !prefix.is_empty()).then_some((prefix, digest))
}

/// Validate a scope (per-test sub-directory) name
///
/// # Errors
///
/// Returns error if the name is empty, too long, or could escape the
/// snapshot root
pub fn validate_scope(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SnapError::InvalidScope(
            "Scope name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_SCOPE_LEN {
        return Err(SnapError::InvalidScope(format!(
            "Scope name too long: {} > {MAX_SCOPE_LEN}",
            name.len()
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(SnapError::InvalidScope(
            "Scope name cannot contain path separators".to_string(),
        ));
    }

    if name.starts_with('.') {
        return Err(SnapError::InvalidScope(
            "Scope name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SnapError::InvalidScope(
            "Scope name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(SnapError::InvalidScope(
            "Scope name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(prefix: &str, key: &str) -> Fingerprint {
        Fingerprint {
            name_prefix: prefix.to_string(),
            suffix_key: key.to_string(),
        }
    }

    #[test]
    fn test_derive_unscoped() {
        let identity = SnapshotFileIdentity::derive(
            Path::new("/snaps"),
            None,
            &fingerprint("get-example-com", "GET#https://example.com/#"),
        );

        let expected = file_name_for("get-example-com", "GET#https://example.com/#");
        assert_eq!(identity.relative_file_name, expected);
        assert_eq!(identity.absolute_path, Path::new("/snaps").join(&expected));
        assert_eq!(identity.file_name(), expected);
    }

    #[test]
    fn test_derive_scoped() {
        let identity =
            SnapshotFileIdentity::derive(Path::new("/snaps"), Some("my_test"), &fingerprint("p", "k"));

        assert!(identity.relative_file_name.starts_with("my_test/p-"));
        assert_eq!(identity.directory(), Some(Path::new("/snaps/my_test")));
        assert!(identity.file_name().starts_with("p-"));
    }

    #[test]
    fn test_name_depends_only_on_fingerprint() {
        let a = file_name_for("get-a", "GET#a#");
        let b = file_name_for("get-a", "GET#a#");
        assert_eq!(a, b);
        assert_ne!(a, file_name_for("get-a", "GET#a#body"));
    }

    #[test]
    fn test_split_file_name() {
        let name = file_name_for("get-xkcd-com-info-0", "GET#https://xkcd.com/info.0.json#");
        let (prefix, digest) = split_file_name(&name).unwrap();
        assert_eq!(prefix, "get-xkcd-com-info-0");
        assert_eq!(digest.len(), DIGEST_LEN);

        let bare = file_name_for("", "key");
        assert_eq!(split_file_name(&bare).unwrap().0, "");

        assert!(split_file_name("unused-snapshots.txt").is_none());
        assert!(split_file_name("notes.json").is_none());
    }

    #[test]
    fn test_validate_scope() {
        assert!(validate_scope("valid_test").is_ok());
        assert!(validate_scope("test-123").is_ok());

        assert!(validate_scope("").is_err());
        assert!(validate_scope(".hidden").is_err());
        assert!(validate_scope("test/path").is_err());
        assert!(validate_scope("test\\path").is_err());
        assert!(validate_scope("test..name").is_err());
        assert!(validate_scope("test\0name").is_err());
        assert!(validate_scope(&"x".repeat(256)).is_err());
    }
}
