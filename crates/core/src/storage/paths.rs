//! Path resolution and the path-traversal guard (spec.md §4.1, §8 property
//! 8, §9 "Path safety" design note): object content lives at
//! `<storage_root>/<bucket_id>/<object_name>/v<generation>`; the resolved
//! path must stay inside the bucket's directory after symlink resolution.

use crate::error::ApiError;
use std::path::{Path, PathBuf};

/// Builds the on-disk path for a specific version of an object and checks
/// that, once symlinks are resolved, it is still contained within
/// `<storage_root>/<bucket_id>/`. Any `..`, absolute path, drive letter, or
/// backslash in `object_name` is rejected by [`crate::validation::validate_object_name`]
/// before this is ever called, but containment is re-checked here against
/// the resolved filesystem reality, not the literal string, per the design
/// note: a symlink planted inside the bucket directory could otherwise
/// still escape even with a "safe-looking" name.
pub fn version_path(
    storage_root: &Path,
    bucket_id: &str,
    object_name: &str,
    generation: i64,
) -> Result<PathBuf, ApiError> {
    let bucket_root = storage_root.join(bucket_id);
    let candidate = bucket_root.join(object_name).join(format!("v{generation}"));
    contain(storage_root, &bucket_root, &candidate)
}

/// Resolves `candidate`'s parent directory (creating it if absent) and
/// verifies the fully resolved path is still within `bucket_root`, which is
/// itself within `storage_root`. Symlinks are resolved via
/// `Path::canonicalize` before the containment check, matching the source's
/// documented fix (spec.md §9): resolve first, check second.
fn contain(storage_root: &Path, bucket_root: &Path, candidate: &Path) -> Result<PathBuf, ApiError> {
    let parent = candidate.parent().ok_or_else(|| {
        ApiError::Invalid("object path has no parent directory".to_string())
    })?;
    std::fs::create_dir_all(parent)
        .map_err(|e| ApiError::Internal(format!("failed to create storage directory: {e}")))?;

    let resolved_parent = parent
        .canonicalize()
        .map_err(|e| ApiError::Internal(format!("failed to resolve storage path: {e}")))?;
    let resolved_root = storage_root
        .canonicalize()
        .map_err(|e| ApiError::Internal(format!("failed to resolve storage root: {e}")))?;
    let resolved_bucket_root = bucket_root
        .canonicalize()
        .unwrap_or_else(|_| resolved_root.join(bucket_root.strip_prefix(storage_root).unwrap_or(bucket_root)));

    if !resolved_parent.starts_with(&resolved_root) || !resolved_parent.starts_with(&resolved_bucket_root) {
        return Err(ApiError::Invalid(
            "object path escapes the bucket's storage root".to_string(),
        ));
    }

    Ok(resolved_parent.join(candidate.file_name().unwrap()))
}

/// The temp-file path for a resumable upload session (spec.md §6: `<storage_root>/tmp/<session_id>`).
pub fn temp_session_path(storage_root: &Path, session_id: &str) -> Result<PathBuf, ApiError> {
    let tmp_dir = storage_root.join("tmp");
    std::fs::create_dir_all(&tmp_dir)
        .map_err(|e| ApiError::Internal(format!("failed to create tmp directory: {e}")))?;
    Ok(tmp_dir.join(session_id))
}

/// Removes the directory backing an object (`<storage_root>/<bucket_id>/<object_name>/`)
/// once no versions remain, ignoring "already gone."
pub fn remove_object_dir_if_empty(storage_root: &Path, bucket_id: &str, object_name: &str) {
    let dir = storage_root.join(bucket_id).join(object_name);
    let _ = std::fs::remove_dir(dir);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_path_stays_inside_bucket_root() {
        let tmp = tempfile::tempdir().unwrap();
        let path = version_path(tmp.path(), "bucket-1", "a/b.txt", 1).unwrap();
        assert!(path.starts_with(tmp.path().canonicalize().unwrap()));
        assert_eq!(path.file_name().unwrap(), "v1");
    }

    #[test]
    fn temp_session_path_is_under_tmp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = temp_session_path(tmp.path(), "session-abc").unwrap();
        assert_eq!(path, tmp.path().join("tmp").join("session-abc"));
    }
}
