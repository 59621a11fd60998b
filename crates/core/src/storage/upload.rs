//! Resumable uploads (spec.md §4.1 "Object upload — resumable").
//!
//! 1. `initiate` creates a [`ResumableSession`] and a temp file under
//!    `<storage_root>/tmp/<session_id>`.
//! 2. `put_chunk` appends a byte range at the session's current offset,
//!    rejecting any gap or overlap.
//! 3. When the final byte lands, `put_chunk` finalizes the temp file into
//!    the object's versioned path (the same code path as a media upload)
//!    and returns the committed row; otherwise it reports how much has
//!    been received so far.
//! 4. `status` answers an empty-body status query (`Content-Range: bytes
//!    */<total>`) without touching the session.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ApiError;
use crate::ids;
use crate::kv::{Bucket, ResumableSession, Store};
use crate::storage::{object, paths};
use crate::storage::object::Preconditions;

pub struct InitiateRequest {
    pub content_type: String,
    pub declared_total_size: Option<u64>,
    pub metadata: HashMap<String, String>,
}

/// Creates a session row and its backing temp file; returns the session id
/// a client polls/appends to at `/upload/resumable/<session_id>`.
pub fn initiate(
    store: &Store,
    storage_root: &Path,
    bucket: &Bucket,
    object_name: &str,
    req: InitiateRequest,
) -> Result<String, ApiError> {
    let session_id = ids::new_session_id();
    let temp_path = paths::temp_session_path(storage_root, &session_id)?;
    std::fs::write(&temp_path, [])
        .map_err(|e| ApiError::Internal(format!("failed to create resumable upload temp file: {e}")))?;

    let session = ResumableSession {
        session_id: session_id.clone(),
        bucket_id: bucket.id.clone(),
        object_name: object_name.to_string(),
        declared_total_size: req.declared_total_size,
        current_offset: 0,
        temp_path: temp_path.to_string_lossy().to_string(),
        pending_metadata: req.metadata,
        content_type: req.content_type,
        created_at: chrono::Utc::now(),
    };
    store.resumable_sessions.insert(session_id.clone(), session);
    Ok(session_id)
}

/// The result of appending a chunk: either the upload is still in progress
/// (308, with the last byte received so far) or it just completed (200,
/// with the committed object row).
pub enum ChunkOutcome {
    Incomplete { last_byte: u64 },
    Complete(crate::kv::ObjectRow),
}

/// Appends `start..=end` of `total` (or queries status with `bytes`
/// `None`). Fails `invalid` if `start` does not equal the session's current
/// offset (spec.md §4.1 step 2).
pub async fn put_chunk(
    store: &Store,
    http_client: &reqwest::Client,
    storage_root: &Path,
    session_id: &str,
    range: Option<(u64, u64, Option<u64>)>,
    bytes: &[u8],
) -> Result<ChunkOutcome, ApiError> {
    let _txn = store.row_locks.begin([format!("resumable\u{0}{session_id}")]);

    let mut session = store
        .resumable_sessions
        .get(session_id)
        .map(|s| s.clone())
        .ok_or_else(|| ApiError::NotFound(format!("resumable session '{session_id}' not found")))?;

    let Some((start, end, total)) = range else {
        // Status-query form: report progress without mutating anything.
        return Ok(ChunkOutcome::Incomplete { last_byte: session.current_offset.saturating_sub(1) });
    };

    if start != session.current_offset {
        return Err(ApiError::Invalid(format!(
            "resumable upload chunk starts at {start}, expected {}",
            session.current_offset
        )));
    }
    if (end - start + 1) as usize != bytes.len() {
        return Err(ApiError::Invalid(
            "chunk length does not match Content-Range".to_string(),
        ));
    }

    append_to_temp_file(&session.temp_path, bytes)?;
    session.current_offset = end + 1;
    if let Some(total) = total {
        session.declared_total_size = Some(total);
    }

    let finished = session
        .declared_total_size
        .map(|total| session.current_offset == total)
        .unwrap_or(false);

    if !finished {
        let offset = session.current_offset;
        store.resumable_sessions.insert(session_id.to_string(), session);
        return Ok(ChunkOutcome::Incomplete { last_byte: offset.saturating_sub(1) });
    }

    let content = std::fs::read(&session.temp_path)
        .map_err(|e| ApiError::Internal(format!("failed to read resumable upload content: {e}")))?;

    let bucket = store
        .buckets
        .get(&session.bucket_id)
        .map(|b| b.clone())
        .ok_or_else(|| ApiError::NotFound("bucket for resumable session no longer exists".to_string()))?;

    let row = object::write_new_version(
        store,
        http_client,
        storage_root,
        &bucket,
        &session.object_name,
        &content,
        &session.content_type,
        session.pending_metadata.clone(),
        Preconditions::default(),
    )
    .await?;

    let _ = std::fs::remove_file(&session.temp_path);
    store.resumable_sessions.remove(session_id);

    Ok(ChunkOutcome::Complete(row))
}

/// Abandons a session: removes its row and temp file (spec.md §5 "explicitly
/// terminable by an abort endpoint").
pub fn abort(store: &Store, session_id: &str) -> Result<(), ApiError> {
    let session = store
        .resumable_sessions
        .remove(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("resumable session '{session_id}' not found")))?;
    let _ = std::fs::remove_file(&session.1.temp_path);
    Ok(())
}

fn append_to_temp_file(temp_path: &str, bytes: &[u8]) -> Result<(), ApiError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(temp_path)
        .map_err(|e| ApiError::Internal(format!("failed to open resumable upload temp file: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| ApiError::Internal(format!("failed to append to resumable upload temp file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bucket;

    fn make_bucket(store: &Store) -> Bucket {
        bucket::create(store, "p1", bucket::CreateBucketRequest { name: "b1".into(), ..Default::default() }).unwrap()
    }

    #[tokio::test]
    async fn resumable_upload_scenario_splits_across_two_chunks() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store);

        let session_id = initiate(
            &store,
            tmp.path(),
            &bucket,
            "big.bin",
            InitiateRequest { content_type: "application/octet-stream".into(), declared_total_size: Some(10), metadata: HashMap::new() },
        ).unwrap();

        let first = put_chunk(&store, &client, tmp.path(), &session_id, Some((0, 4, Some(10))), b"hello").await.unwrap();
        assert!(matches!(first, ChunkOutcome::Incomplete { last_byte: 4 }));

        let second = put_chunk(&store, &client, tmp.path(), &session_id, Some((5, 9, Some(10))), b"world").await.unwrap();
        match second {
            ChunkOutcome::Complete(row) => {
                assert_eq!(row.size, 10);
                assert_eq!(object::read_content(&row).unwrap(), b"helloworld");
            }
            _ => panic!("expected completion on the final byte"),
        }
    }

    #[tokio::test]
    async fn chunk_starting_at_the_wrong_offset_is_rejected() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store);

        let session_id = initiate(
            &store, tmp.path(), &bucket, "big.bin",
            InitiateRequest { content_type: "application/octet-stream".into(), declared_total_size: Some(10), metadata: HashMap::new() },
        ).unwrap();

        let err = put_chunk(&store, &client, tmp.path(), &session_id, Some((5, 9, Some(10))), b"world").await;
        assert!(matches!(err, Err(ApiError::Invalid(_))));
    }

    #[tokio::test]
    async fn status_query_reports_progress_without_mutating() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store);

        let session_id = initiate(
            &store, tmp.path(), &bucket, "big.bin",
            InitiateRequest { content_type: "application/octet-stream".into(), declared_total_size: Some(10), metadata: HashMap::new() },
        ).unwrap();
        put_chunk(&store, &client, tmp.path(), &session_id, Some((0, 4, Some(10))), b"hello").await.unwrap();

        let status = put_chunk(&store, &client, tmp.path(), &session_id, None, b"").await.unwrap();
        assert!(matches!(status, ChunkOutcome::Incomplete { last_byte: 4 }));
    }
}
