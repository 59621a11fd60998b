//! Startup GC pass (SPEC_FULL.md §4.1 supplement; spec.md §5 shared-resource
//! policy and §7 partial-failure semantics): on boot, clean up whatever a
//! crash mid-upload left behind, without ever fabricating content for a
//! version row whose file went missing.

use crate::kv::Store;
use std::path::Path;

/// Walks `storage_root/tmp/` deleting orphaned resumable-session temp files
/// (the session row is gone — a client either finished or never came back)
/// and reports, for each known bucket, any version row whose backing file
/// no longer exists. Those rows are left alone and logged for the operator;
/// this pass never re-creates content out of thin air.
pub fn reconcile_dangling(store: &Store, storage_root: &Path) {
    reconcile_tmp_dir(store, storage_root);
    reconcile_missing_version_files(store);
}

fn reconcile_tmp_dir(store: &Store, storage_root: &Path) {
    let tmp_dir = storage_root.join("tmp");
    let Ok(entries) = std::fs::read_dir(&tmp_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if store.resumable_sessions.contains_key(&file_name) {
            continue;
        }
        if let Err(e) = std::fs::remove_file(entry.path()) {
            tracing::warn!(path = %entry.path().display(), %e, "failed to remove orphaned resumable upload temp file");
        } else {
            tracing::info!(session_id = %file_name, "removed orphaned resumable upload temp file");
        }
    }
}

fn reconcile_missing_version_files(store: &Store) {
    for entry in store.object_versions.iter() {
        for version in entry.value() {
            if version.deleted {
                continue;
            }
            if !Path::new(&version.file_path).exists() {
                tracing::error!(
                    bucket_id = %version.bucket_id,
                    object = %version.name,
                    generation = version.generation,
                    file_path = %version.file_path,
                    "object version row has no backing file on disk; left for operator inspection"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_tmp_file_with_no_matching_session() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let tmp_dir = tmp.path().join("tmp");
        std::fs::create_dir_all(&tmp_dir).unwrap();
        let orphan = tmp_dir.join("orphan-session-id");
        std::fs::write(&orphan, b"partial").unwrap();

        reconcile_dangling(&store, tmp.path());
        assert!(!orphan.exists());
    }

    #[test]
    fn keeps_tmp_file_with_a_live_session_row() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let tmp_dir = tmp.path().join("tmp");
        std::fs::create_dir_all(&tmp_dir).unwrap();
        let live = tmp_dir.join("live-session-id");
        std::fs::write(&live, b"partial").unwrap();

        store.resumable_sessions.insert(
            "live-session-id".to_string(),
            crate::kv::ResumableSession {
                session_id: "live-session-id".to_string(),
                bucket_id: "b1".to_string(),
                object_name: "f".to_string(),
                declared_total_size: Some(100),
                current_offset: 7,
                temp_path: live.to_string_lossy().to_string(),
                pending_metadata: Default::default(),
                content_type: "application/octet-stream".to_string(),
                created_at: chrono::Utc::now(),
            },
        );

        reconcile_dangling(&store, tmp.path());
        assert!(live.exists());
    }
}
