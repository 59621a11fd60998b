//! Bucket CRUD (spec.md §4.1 "Bucket CRUD").

use crate::error::ApiError;
use crate::ids;
use crate::kv::{Bucket, CorsRule, LifecycleRule, NotificationConfig, Store};
use crate::respond::{self, ListEnvelope};
use crate::validation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "storageClass")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchBucketRequest {
    #[serde(default)]
    pub cors: Option<Vec<CorsRule>>,
    #[serde(default)]
    pub lifecycle: Option<LifecycleWrapper>,
    #[serde(default, rename = "notificationConfigs")]
    pub notification_configs: Option<Vec<NotificationConfig>>,
    #[serde(default)]
    pub versioning: Option<VersioningWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleWrapper {
    pub rule: Vec<LifecycleRule>,
}

#[derive(Debug, Deserialize)]
pub struct VersioningWrapper {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct BucketResponse {
    pub kind: &'static str,
    pub id: String,
    #[serde(rename = "selfLink")]
    pub self_link: String,
    pub name: String,
    #[serde(rename = "projectNumber")]
    pub project_number: u64,
    pub metageneration: u64,
    pub location: String,
    #[serde(rename = "storageClass")]
    pub storage_class: String,
    pub versioning: VersioningResponse,
    pub cors: Vec<CorsRule>,
    #[serde(rename = "notificationConfigs")]
    pub notification_configs: Vec<NotificationConfig>,
    pub lifecycle: LifecycleResponse,
    #[serde(rename = "timeCreated")]
    pub time_created: String,
    pub updated: String,
}

#[derive(Debug, Serialize)]
pub struct VersioningResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub rule: Vec<LifecycleRule>,
}

pub fn to_response(base_url: &str, bucket: &Bucket, project_number: u64) -> BucketResponse {
    BucketResponse {
        kind: "storage#bucket",
        id: bucket.name.clone(),
        self_link: respond::self_link(base_url, &format!("storage/v1/b/{}", bucket.name)),
        name: bucket.name.clone(),
        project_number,
        metageneration: 1,
        location: bucket.location.clone(),
        storage_class: bucket.storage_class.clone(),
        versioning: VersioningResponse { enabled: bucket.versioning_enabled },
        cors: bucket.cors_rules.clone(),
        notification_configs: bucket.notification_configs.clone(),
        lifecycle: LifecycleResponse { rule: bucket.lifecycle_rules.clone() },
        time_created: respond::format_timestamp(bucket.created_at),
        updated: respond::format_timestamp(bucket.updated_at),
    }
}

/// Creates a bucket. `(project_id, name)` must be unique; names are
/// reusable across projects (spec.md §3 Bucket invariant).
pub fn create(store: &Store, project_id: &str, req: CreateBucketRequest) -> Result<Bucket, ApiError> {
    validation::validate_bucket_name(&req.name)?;

    let _txn = store.row_locks.begin([Store::bucket_index_key(project_id, &req.name)]);
    if store.find_bucket(Some(project_id), &req.name).is_some() {
        return Err(ApiError::Conflict(format!(
            "bucket '{}' already exists in project '{project_id}'",
            req.name
        )));
    }

    let now = chrono::Utc::now();
    let bucket = Bucket {
        id: ids::new_operation_id(),
        name: req.name.clone(),
        project_id: project_id.to_string(),
        location: req.location.unwrap_or_else(|| "US".to_string()),
        storage_class: req.storage_class.unwrap_or_else(|| "STANDARD".to_string()),
        versioning_enabled: false,
        cors_rules: vec![],
        notification_configs: vec![],
        lifecycle_rules: vec![],
        created_at: now,
        updated_at: now,
    };

    store.buckets.insert(bucket.id.clone(), bucket.clone());
    store
        .bucket_index
        .insert(Store::bucket_index_key(project_id, &req.name), bucket.id.clone());
    Ok(bucket)
}

pub fn get(store: &Store, project_id: Option<&str>, name: &str) -> Result<Bucket, ApiError> {
    store
        .find_bucket(project_id, name)
        .ok_or_else(|| ApiError::NotFound(format!("bucket '{name}' not found")))
}

pub fn list(store: &Store, project_id: &str) -> ListEnvelope<serde_json::Value> {
    let items: Vec<serde_json::Value> = store
        .buckets
        .iter()
        .filter(|b| b.project_id == project_id)
        .map(|b| serde_json::to_value(to_response("", &b, 0)).unwrap())
        .collect();
    ListEnvelope::new("storage#buckets", items)
}

/// Deletes a bucket. Fails `conflict` if any non-deleted object remains
/// (spec.md §4.1 "Delete"). Hard delete removes all version rows too.
pub fn delete(store: &Store, project_id: Option<&str>, name: &str) -> Result<(), ApiError> {
    let bucket = get(store, project_id, name)?;
    let _txn = store.row_locks.begin([bucket.id.clone()]);

    let has_live_object = store
        .objects
        .iter()
        .any(|o| o.bucket_id == bucket.id && !o.deleted);
    if has_live_object {
        return Err(ApiError::Conflict(format!(
            "bucket '{name}' is not empty"
        )));
    }

    store.buckets.remove(&bucket.id);
    store
        .bucket_index
        .remove(&Store::bucket_index_key(&bucket.project_id, &bucket.name));

    let stale_version_keys: Vec<String> = store
        .object_versions
        .iter()
        .filter(|entry| entry.value().iter().any(|v| v.bucket_id == bucket.id))
        .map(|entry| entry.key().clone())
        .collect();
    for key in stale_version_keys {
        store.object_versions.remove(&key);
    }

    Ok(())
}

/// Patches CORS, lifecycle, notification, and versioning settings (spec.md
/// §4.1 "Patch").
pub fn patch(
    store: &Store,
    project_id: Option<&str>,
    name: &str,
    req: PatchBucketRequest,
) -> Result<Bucket, ApiError> {
    let bucket = get(store, project_id, name)?;
    let _txn = store.row_locks.begin([bucket.id.clone()]);

    let mut bucket = store
        .buckets
        .get(&bucket.id)
        .map(|b| b.clone())
        .ok_or_else(|| ApiError::NotFound(format!("bucket '{name}' not found")))?;

    if let Some(cors) = req.cors {
        bucket.cors_rules = cors;
    }
    if let Some(lifecycle) = req.lifecycle {
        bucket.lifecycle_rules = lifecycle.rule;
    }
    if let Some(configs) = req.notification_configs {
        bucket.notification_configs = configs;
    }
    if let Some(versioning) = req.versioning {
        bucket.versioning_enabled = versioning.enabled;
    }
    bucket.updated_at = chrono::Utc::now();

    store.buckets.insert(bucket.id.clone(), bucket.clone());
    Ok(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_duplicate_in_same_project_conflicts() {
        let store = Store::new();
        create(&store, "p1", CreateBucketRequest { name: "shared".into(), ..Default::default() }).unwrap();
        let err = create(&store, "p1", CreateBucketRequest { name: "shared".into(), ..Default::default() });
        assert!(matches!(err, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn same_name_in_different_projects_is_allowed() {
        let store = Store::new();
        create(&store, "p1", CreateBucketRequest { name: "shared".into(), location: Some("US".into()), ..Default::default() }).unwrap();
        let b2 = create(&store, "p2", CreateBucketRequest { name: "shared".into(), location: Some("EU".into()), ..Default::default() }).unwrap();
        assert_eq!(b2.location, "EU");
    }

    #[test]
    fn delete_nonempty_bucket_conflicts() {
        let store = Store::new();
        let bucket = create(&store, "p1", CreateBucketRequest { name: "b1".into(), ..Default::default() }).unwrap();
        store.objects.insert(
            crate::kv::ObjectRow::key(&bucket.id, "f.txt"),
            crate::kv::ObjectRow {
                bucket_id: bucket.id.clone(),
                name: "f.txt".into(),
                generation: 1,
                metageneration: 1,
                size: 1,
                content_type: "text/plain".into(),
                md5: "x".into(),
                crc32c: "y".into(),
                file_path: "p".into(),
                is_latest: true,
                deleted: false,
                metadata: Default::default(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        );
        let err = delete(&store, Some("p1"), "b1");
        assert!(matches!(err, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn delete_absent_bucket_is_not_found() {
        let store = Store::new();
        assert!(matches!(delete(&store, Some("p1"), "nope"), Err(ApiError::NotFound(_))));
    }
}
