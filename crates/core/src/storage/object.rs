//! Object upload, download, copy, delete, and list (spec.md §4.1).

use crate::error::ApiError;
use crate::events;
use crate::kv::{Bucket, EventType, ObjectRow, Store};
use crate::respond;
use crate::storage::{hash, paths};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Precondition query parameters, evaluated before any write (spec.md
/// §4.1 "Preconditions").
#[derive(Debug, Default, Clone, Copy)]
pub struct Preconditions {
    pub if_generation_match: Option<i64>,
    pub if_generation_not_match: Option<i64>,
    pub if_metageneration_match: Option<i64>,
    pub if_metageneration_not_match: Option<i64>,
}

/// Checks `preconditions` against the current latest row (`None` if the
/// object does not exist). `ifGenerationMatch=0` requires non-existence.
pub fn check_preconditions(current: Option<&ObjectRow>, p: &Preconditions) -> Result<(), ApiError> {
    let current_generation = current.map(|o| o.generation);
    let current_metageneration = current.map(|o| o.metageneration);

    if let Some(want) = p.if_generation_match {
        let ok = if want == 0 { current.is_none() } else { current_generation == Some(want) };
        if !ok {
            return Err(ApiError::ConditionNotMet(format!(
                "ifGenerationMatch={want} not satisfied (current generation: {current_generation:?})"
            )));
        }
    }
    if let Some(not_want) = p.if_generation_not_match {
        let ok = current.is_none() || current_generation != Some(not_want);
        if !ok {
            return Err(ApiError::ConditionNotMet(format!(
                "ifGenerationNotMatch={not_want} not satisfied"
            )));
        }
    }
    if let Some(want) = p.if_metageneration_match {
        if current_metageneration != Some(want) {
            return Err(ApiError::ConditionNotMet(format!(
                "ifMetagenerationMatch={want} not satisfied"
            )));
        }
    }
    if let Some(not_want) = p.if_metageneration_not_match {
        if current_metageneration == Some(not_want) {
            return Err(ApiError::ConditionNotMet(format!(
                "ifMetagenerationNotMatch={not_want} not satisfied"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ObjectResponse {
    pub kind: &'static str,
    pub id: String,
    #[serde(rename = "selfLink")]
    pub self_link: String,
    pub name: String,
    pub bucket: String,
    pub generation: String,
    pub metageneration: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub size: String,
    #[serde(rename = "md5Hash")]
    pub md5_hash: String,
    pub crc32c: String,
    #[serde(rename = "timeCreated")]
    pub time_created: String,
    pub updated: String,
    pub metadata: HashMap<String, String>,
}

pub fn to_response(base_url: &str, bucket_name: &str, row: &ObjectRow) -> ObjectResponse {
    ObjectResponse {
        kind: "storage#object",
        id: format!("{bucket_name}/{}/{}", row.name, row.generation),
        self_link: respond::self_link(
            base_url,
            &format!("storage/v1/b/{bucket_name}/o/{}", row.name),
        ),
        name: row.name.clone(),
        bucket: bucket_name.to_string(),
        generation: row.generation.to_string(),
        metageneration: row.metageneration.to_string(),
        content_type: row.content_type.clone(),
        size: row.size.to_string(),
        md5_hash: base64_md5(&row.md5),
        crc32c: row.crc32c.clone(),
        time_created: respond::format_timestamp(row.created_at),
        updated: respond::format_timestamp(row.updated_at),
        metadata: row.metadata.clone(),
    }
}

fn base64_md5(hex_digest: &str) -> String {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    let bytes: Vec<u8> = (0..hex_digest.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&hex_digest[i..i + 2], 16).ok())
        .collect();
    BASE64.encode(bytes)
}

pub fn get_latest(store: &Store, bucket_id: &str, name: &str) -> Option<ObjectRow> {
    store.objects.get(&ObjectRow::key(bucket_id, name)).map(|o| o.clone())
}

pub fn get_version(store: &Store, bucket_id: &str, name: &str, generation: i64) -> Option<ObjectRow> {
    store
        .object_versions
        .get(&ObjectRow::key(bucket_id, name))?
        .iter()
        .find(|v| v.generation == generation && !v.deleted)
        .cloned()
}

/// Writes `bytes` as a new version of `(bucket, name)`, checking
/// `preconditions` first, handling the versioning-on/off soft-delete split
/// (spec.md §4.1 "Versioning"), and dispatching an `OBJECT_FINALIZE` event.
#[allow(clippy::too_many_arguments)]
pub async fn write_new_version(
    store: &Store,
    http_client: &reqwest::Client,
    storage_root: &Path,
    bucket: &Bucket,
    name: &str,
    bytes: &[u8],
    content_type: &str,
    metadata: HashMap<String, String>,
    preconditions: Preconditions,
) -> Result<ObjectRow, ApiError> {
    let key = ObjectRow::key(&bucket.id, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let current = get_latest(store, &bucket.id, name);
    check_preconditions(current.as_ref(), &preconditions)?;

    let generation = store.next_generation(&key);
    let file_path = paths::version_path(storage_root, &bucket.id, name, generation)?;
    let tmp_path = file_path.with_extension("tmp-write");
    std::fs::write(&tmp_path, bytes)
        .map_err(|e| ApiError::Internal(format!("failed to write object content: {e}")))?;
    std::fs::rename(&tmp_path, &file_path)
        .map_err(|e| ApiError::Internal(format!("failed to finalize object content: {e}")))?;

    let now = chrono::Utc::now();
    let new_row = ObjectRow {
        bucket_id: bucket.id.clone(),
        name: name.to_string(),
        generation,
        metageneration: 1,
        size: bytes.len() as u64,
        content_type: content_type.to_string(),
        md5: hash::md5_hex(bytes),
        crc32c: hash::crc32c_base64(bytes),
        file_path: file_path.to_string_lossy().to_string(),
        is_latest: true,
        deleted: false,
        metadata,
        created_at: now,
        updated_at: now,
    };

    if let Some(mut prior) = current {
        prior.is_latest = false;
        if !bucket.versioning_enabled {
            prior.deleted = true;
        }
        replace_version(store, &key, &prior);
    }

    store.objects.insert(key.clone(), new_row.clone());
    append_version(store, &key, new_row.clone());

    let event = events::new_event(
        &bucket.name,
        name,
        EventType::ObjectFinalize,
        generation,
        new_row.metadata.clone(),
    );
    events::dispatch(http_client, bucket, &event).await;

    Ok(new_row)
}

fn append_version(store: &Store, key: &str, row: ObjectRow) {
    store.object_versions.entry(key.to_string()).or_default().push(row);
}

fn replace_version(store: &Store, key: &str, row: &ObjectRow) {
    if let Some(mut versions) = store.object_versions.get_mut(key) {
        if let Some(slot) = versions.iter_mut().find(|v| v.generation == row.generation) {
            *slot = row.clone();
        }
    }
}

/// Reads the bytes for a specific (or latest) generation from disk.
pub fn read_content(row: &ObjectRow) -> Result<Vec<u8>, ApiError> {
    std::fs::read(&row.file_path).map_err(|e| ApiError::Internal(format!("failed to read object content: {e}")))
}

/// Deletes one version (spec.md §4.1 "Delete", generation form). If it was
/// the latest, promotes the next-highest non-deleted version.
pub async fn delete_generation(
    store: &Store,
    http_client: &reqwest::Client,
    bucket: &Bucket,
    name: &str,
    generation: i64,
) -> Result<(), ApiError> {
    let key = ObjectRow::key(&bucket.id, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let mut versions = store
        .object_versions
        .get_mut(&key)
        .ok_or_else(|| ApiError::NotFound(format!("object '{name}' not found")))?;

    let idx = versions
        .iter()
        .position(|v| v.generation == generation && !v.deleted)
        .ok_or_else(|| ApiError::NotFound(format!("generation {generation} of '{name}' not found")))?;

    let removed = versions[idx].clone();
    let _ = std::fs::remove_file(&removed.file_path);
    versions.remove(idx);

    let was_latest = removed.is_latest;
    let next = versions
        .iter_mut()
        .filter(|v| !v.deleted)
        .max_by_key(|v| v.generation);

    if was_latest {
        if let Some(promoted) = next {
            promoted.is_latest = true;
            store.objects.insert(key.clone(), promoted.clone());
        } else {
            store.objects.remove(&key);
        }
    }
    drop(versions);

    let event = events::new_event(&bucket.name, name, EventType::ObjectDelete, generation, HashMap::new());
    events::dispatch(http_client, bucket, &event).await;
    Ok(())
}

/// Deletes every version of an object (spec.md §4.1 "Delete", no-generation
/// form): marks all versions deleted and the latest row `deleted=true,
/// is_latest=false`.
pub async fn delete_all(
    store: &Store,
    http_client: &reqwest::Client,
    bucket: &Bucket,
    name: &str,
) -> Result<(), ApiError> {
    let key = ObjectRow::key(&bucket.id, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let current_generation = {
        let mut versions = store
            .object_versions
            .get_mut(&key)
            .ok_or_else(|| ApiError::NotFound(format!("object '{name}' not found")))?;
        if versions.iter().all(|v| v.deleted) {
            return Err(ApiError::NotFound(format!("object '{name}' not found")));
        }
        let latest_generation = versions.iter().filter(|v| !v.deleted).map(|v| v.generation).max();
        for v in versions.iter_mut() {
            if !v.deleted {
                let _ = std::fs::remove_file(&v.file_path);
            }
            v.deleted = true;
            v.is_latest = false;
        }
        latest_generation
    };

    store.objects.remove(&key);

    let event = events::new_event(
        &bucket.name,
        name,
        EventType::ObjectDelete,
        current_generation.unwrap_or(0),
        HashMap::new(),
    );
    events::dispatch(http_client, bucket, &event).await;
    Ok(())
}

/// Copies an object into a (possibly different) bucket under a (possibly
/// different) name, preserving content-type, checksums, and metadata
/// (spec.md §4.1 "Copy").
pub async fn copy(
    store: &Store,
    http_client: &reqwest::Client,
    storage_root: &Path,
    src_bucket: &Bucket,
    src_name: &str,
    src_generation: Option<i64>,
    dst_bucket: &Bucket,
    dst_name: &str,
) -> Result<ObjectRow, ApiError> {
    let source = match src_generation {
        Some(g) => get_version(store, &src_bucket.id, src_name, g),
        None => get_latest(store, &src_bucket.id, src_name),
    }
    .ok_or_else(|| ApiError::NotFound(format!("source object '{src_name}' not found")))?;

    let bytes = read_content(&source)?;
    write_new_version(
        store,
        http_client,
        storage_root,
        dst_bucket,
        dst_name,
        &bytes,
        &source.content_type,
        source.metadata.clone(),
        Preconditions::default(),
    )
    .await
}

/// Metadata-only update (spec.md §4.1 "Metadata-only update"): bumps
/// `metageneration` without touching `generation` or content.
pub fn patch_metadata(
    store: &Store,
    bucket_id: &str,
    name: &str,
    content_type: Option<String>,
    metadata_patch: Option<HashMap<String, String>>,
) -> Result<ObjectRow, ApiError> {
    let key = ObjectRow::key(bucket_id, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let mut row = get_latest(store, bucket_id, name)
        .ok_or_else(|| ApiError::NotFound(format!("object '{name}' not found")))?;

    if let Some(ct) = content_type {
        row.content_type = ct;
    }
    if let Some(patch) = metadata_patch {
        row.metadata.extend(patch);
    }
    row.metageneration += 1;
    row.updated_at = chrono::Utc::now();

    store.objects.insert(key.clone(), row.clone());
    replace_version(store, &key, &row);
    Ok(row)
}

pub struct ListResult {
    pub items: Vec<ObjectRow>,
    pub prefixes: Vec<String>,
}

/// Lists objects in a bucket with `prefix`/`delimiter`/`versions` semantics
/// (spec.md §4.1 "List objects"). `maxResults`/`pageToken` are applied by
/// the caller over the returned, already-sorted `items`.
pub fn list(store: &Store, bucket_id: &str, prefix: &str, delimiter: Option<&str>, versions: bool) -> ListResult {
    let mut rows: Vec<ObjectRow> = if versions {
        store
            .object_versions
            .iter()
            .filter(|e| e.key().starts_with(&format!("{bucket_id}\u{0}")))
            .flat_map(|e| e.value().clone())
            .filter(|r| !r.deleted)
            .collect()
    } else {
        store
            .objects
            .iter()
            .filter(|o| o.bucket_id == bucket_id && !o.deleted)
            .map(|o| o.clone())
            .collect()
    };

    rows.retain(|r| r.name.starts_with(prefix));
    rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.generation.cmp(&b.generation)));

    let mut items = Vec::new();
    let mut prefixes = Vec::new();
    let mut seen_prefixes = std::collections::HashSet::new();

    if let Some(delim) = delimiter.filter(|d| !d.is_empty()) {
        for row in rows {
            let rest = &row.name[prefix.len()..];
            if let Some(pos) = rest.find(delim) {
                let boundary = prefix.len() + pos + delim.len();
                let group_prefix = row.name[..boundary].to_string();
                if seen_prefixes.insert(group_prefix.clone()) {
                    prefixes.push(group_prefix);
                }
            } else {
                items.push(row);
            }
        }
    } else {
        items = rows;
    }

    ListResult { items, prefixes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::bucket;

    fn make_bucket(store: &Store, project: &str, name: &str, versioning: bool) -> Bucket {
        let mut b = bucket::create(
            store,
            project,
            bucket::CreateBucketRequest { name: name.to_string(), ..Default::default() },
        )
        .unwrap();
        b.versioning_enabled = versioning;
        store.buckets.insert(b.id.clone(), b.clone());
        b
    }

    #[tokio::test]
    async fn versioning_round_trip_scenario() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store, "p1", "b1", true);

        let v1 = write_new_version(
            &store, &client, tmp.path(), &bucket, "f", b"A", "text/plain",
            HashMap::new(), Preconditions::default(),
        ).await.unwrap();
        assert_eq!(v1.generation, 1);

        let v2 = write_new_version(
            &store, &client, tmp.path(), &bucket, "f", b"BB", "text/plain",
            HashMap::new(), Preconditions::default(),
        ).await.unwrap();
        assert_eq!(v2.generation, 2);

        let latest = get_latest(&store, &bucket.id, "f").unwrap();
        assert_eq!(read_content(&latest).unwrap(), b"BB");

        let old = get_version(&store, &bucket.id, "f", 1).unwrap();
        assert_eq!(read_content(&old).unwrap(), b"A");

        delete_generation(&store, &client, &bucket, "f", 2).await.unwrap();
        let latest = get_latest(&store, &bucket.id, "f").unwrap();
        assert_eq!(latest.generation, 1);
        assert_eq!(read_content(&latest).unwrap(), b"A");
    }

    #[tokio::test]
    async fn precondition_guard_scenario() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store, "p1", "b1", false);

        write_new_version(
            &store, &client, tmp.path(), &bucket, "f", b"x", "text/plain",
            HashMap::new(), Preconditions::default(),
        ).await.unwrap();

        let ok = write_new_version(
            &store, &client, tmp.path(), &bucket, "f", b"y", "text/plain",
            HashMap::new(), Preconditions { if_generation_match: Some(1), ..Default::default() },
        ).await;
        assert!(ok.is_ok());

        let fail = write_new_version(
            &store, &client, tmp.path(), &bucket, "f", b"z", "text/plain",
            HashMap::new(), Preconditions { if_generation_match: Some(1), ..Default::default() },
        ).await;
        assert!(matches!(fail, Err(ApiError::ConditionNotMet(_))));
    }

    #[tokio::test]
    async fn generation_numbers_never_reused_after_hard_delete() {
        let store = Store::new();
        let tmp = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let bucket = make_bucket(&store, "p1", "b1", false);

        write_new_version(&store, &client, tmp.path(), &bucket, "f", b"1", "text/plain", HashMap::new(), Preconditions::default()).await.unwrap();
        delete_all(&store, &client, &bucket, "f").await.unwrap();
        let v2 = write_new_version(&store, &client, tmp.path(), &bucket, "f", b"2", "text/plain", HashMap::new(), Preconditions::default()).await.unwrap();
        assert_eq!(v2.generation, 2);
    }

    #[test]
    fn list_with_delimiter_groups_prefixes() {
        let store = Store::new();
        let bucket = make_bucket(&store, "p1", "b1", false);
        for name in ["a/1.txt", "a/2.txt", "b.txt"] {
            store.objects.insert(
                ObjectRow::key(&bucket.id, name),
                ObjectRow {
                    bucket_id: bucket.id.clone(),
                    name: name.to_string(),
                    generation: 1,
                    metageneration: 1,
                    size: 0,
                    content_type: "text/plain".into(),
                    md5: "d41d8cd98f00b204e9800998ecf8427e".into(),
                    crc32c: "AAAAAA==".into(),
                    file_path: "x".into(),
                    is_latest: true,
                    deleted: false,
                    metadata: HashMap::new(),
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                },
            );
        }
        let result = list(&store, &bucket.id, "", Some("/"), false);
        assert_eq!(result.prefixes, vec!["a/".to_string()]);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "b.txt");
    }
}
