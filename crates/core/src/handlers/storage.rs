//! Object store HTTP surface (spec.md §6): bucket CRUD, object
//! upload/download/copy/delete/list, and resumable-upload chunk handling.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::handlers::base_url;
use crate::state::AppState;
use crate::storage::object::Preconditions;
use crate::storage::{bucket, cors, hash, multipart, object, signed_url, upload};
use crate::validation;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn preconditions_from_query(q: &HashMap<String, String>) -> ApiResult<Preconditions> {
    let parse = |field: &str| -> ApiResult<Option<i64>> {
        match q.get(field) {
            Some(raw) => Ok(Some(validation::validate_precondition_int(raw, field)?)),
            None => Ok(None),
        }
    };
    Ok(Preconditions {
        if_generation_match: parse("ifGenerationMatch")?,
        if_generation_not_match: parse("ifGenerationNotMatch")?,
        if_metageneration_match: parse("ifMetagenerationMatch")?,
        if_metageneration_not_match: parse("ifMetagenerationNotMatch")?,
    })
}

// ── Buckets ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ProjectQuery {
    pub project: Option<String>,
}

pub async fn create_bucket(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
    Json(req): Json<bucket::CreateBucketRequest>,
) -> ApiResult<impl IntoResponse> {
    let project = q.project.unwrap_or_else(|| state.config.project.default_project_id.clone());
    let b = bucket::create(&state.kv, &project, req)?;
    let number = crate::ids::stable_numeric_id(&project);
    Ok((StatusCode::OK, Json(bucket::to_response(&base_url(&state), &b, number))))
}

pub async fn list_buckets(State(state): State<AppState>, Query(q): Query<ProjectQuery>) -> ApiResult<impl IntoResponse> {
    let project = q.project.unwrap_or_else(|| state.config.project.default_project_id.clone());
    Ok(Json(bucket::list(&state.kv, &project)))
}

pub async fn get_bucket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<ProjectQuery>,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, q.project.as_deref(), &name)?;
    let number = crate::ids::stable_numeric_id(&b.project_id);
    Ok(Json(bucket::to_response(&base_url(&state), &b, number)))
}

pub async fn delete_bucket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<ProjectQuery>,
) -> ApiResult<impl IntoResponse> {
    bucket::delete(&state.kv, q.project.as_deref(), &name)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn patch_bucket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<ProjectQuery>,
    Json(req): Json<bucket::PatchBucketRequest>,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::patch(&state.kv, q.project.as_deref(), &name, req)?;
    let number = crate::ids::stable_numeric_id(&b.project_id);
    Ok(Json(bucket::to_response(&base_url(&state), &b, number)))
}

// ── Objects ──────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct ListObjectsQuery {
    #[serde(default)]
    pub prefix: String,
    pub delimiter: Option<String>,
    #[serde(rename = "pageToken")]
    pub page_token: Option<String>,
    #[serde(rename = "maxResults")]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub versions: bool,
}

pub async fn list_objects(
    State(state): State<AppState>,
    Path(bucket_name): Path<String>,
    Query(q): Query<ListObjectsQuery>,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, None, &bucket_name)?;
    let result = object::list(&state.kv, &b.id, &q.prefix, q.delimiter.as_deref(), q.versions);
    let max_results = q.max_results.unwrap_or(1000).max(1);

    let mut items: Vec<_> = result.items;
    if let Some(token) = &q.page_token {
        items.retain(|r| r.name.as_str() > token.as_str());
    }
    let next_page_token = if items.len() > max_results { Some(items[max_results - 1].name.clone()) } else { None };
    items.truncate(max_results);

    let base = base_url(&state);
    let body = crate::respond::ListEnvelope::new(
        "storage#objects",
        items.iter().map(|r| serde_json::to_value(object::to_response(&base, &bucket_name, r)).unwrap()).collect(),
    )
    .with_page_token(next_page_token);
    Ok(Json(json!({
        "kind": body.kind,
        "items": body.items,
        "prefixes": result.prefixes,
        "nextPageToken": body.next_page_token,
    })))
}

#[derive(Deserialize, Default)]
pub struct GetObjectQuery {
    pub alt: Option<String>,
    pub generation: Option<i64>,
    #[serde(rename = "X-Goog-Algorithm")]
    pub goog_algorithm: Option<String>,
    #[serde(rename = "X-Goog-Expires")]
    pub goog_expires: Option<u64>,
    #[serde(rename = "X-Goog-Timestamp")]
    pub goog_timestamp: Option<String>,
    #[serde(rename = "X-Goog-Signature")]
    pub goog_signature: Option<String>,
}

fn verify_signed_url_if_present(
    state: &AppState,
    method: &str,
    path: &str,
    q: &GetObjectQuery,
) -> ApiResult<()> {
    let (Some(algorithm), Some(expires), Some(timestamp_raw), Some(signature)) =
        (&q.goog_algorithm, q.goog_expires, &q.goog_timestamp, &q.goog_signature)
    else {
        return Ok(());
    };
    let timestamp = chrono::DateTime::parse_from_rfc3339(timestamp_raw)
        .map_err(|_| ApiError::Invalid("X-Goog-Timestamp is not a valid RFC3339 timestamp".to_string()))?
        .with_timezone(&chrono::Utc);
    let params = signed_url::SignedUrlParams {
        algorithm,
        expires_secs: expires,
        timestamp,
        signature_b64url: signature,
    };
    signed_url::verify(&state.config.security.signed_url_secret, method, path, &params, chrono::Utc::now())
}

pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket_name, name)): Path<(String, String)>,
    Query(q): Query<GetObjectQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = format!("/storage/v1/b/{bucket_name}/o/{name}");
    verify_signed_url_if_present(&state, "GET", &path, &q)?;

    let b = bucket::get(&state.kv, None, &bucket_name)?;
    let row = match q.generation {
        Some(g) => object::get_version(&state.kv, &b.id, &name, g),
        None => object::get_latest(&state.kv, &b.id, &name),
    }
    .ok_or_else(|| ApiError::NotFound(format!("object '{name}' not found")))?;

    if q.alt.as_deref() == Some("media") {
        let bytes = object::read_content(&row)?;
        let mut response = (
            StatusCode::OK,
            [
                (axum::http::header::CONTENT_TYPE, row.content_type.clone()),
                ("X-Goog-Hash".to_string(), hash::goog_hash_header(&row.md5, &row.crc32c)),
            ],
            bytes,
        )
            .into_response();

        if let Some(origin) = header_str(&headers, "origin") {
            if let Some(decision) = cors::apply(&b.cors_rules, origin, "GET") {
                let h = response.headers_mut();
                h.insert("Access-Control-Allow-Origin", decision.allow_origin.parse().unwrap());
            }
        }
        return Ok(response);
    }

    Ok(Json(object::to_response(&base_url(&state), &bucket_name, &row)).into_response())
}

#[derive(Deserialize, Default)]
pub struct DeleteObjectQuery {
    pub generation: Option<i64>,
}

pub async fn delete_object(
    State(state): State<AppState>,
    Path((bucket_name, name)): Path<(String, String)>,
    Query(q): Query<DeleteObjectQuery>,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, None, &bucket_name)?;
    match q.generation {
        Some(g) => object::delete_generation(&state.kv, &state.http_client, &b, &name, g).await?,
        None => object::delete_all(&state.kv, &state.http_client, &b, &name).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PatchObjectRequest {
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

pub async fn patch_object(
    State(state): State<AppState>,
    Path((bucket_name, name)): Path<(String, String)>,
    Json(req): Json<PatchObjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, None, &bucket_name)?;
    let row = object::patch_metadata(&state.kv, &b.id, &name, req.content_type, req.metadata)?;
    Ok(Json(object::to_response(&base_url(&state), &bucket_name, &row)))
}

/// `POST /storage/v1/b/{src_bucket}/o/{*rest}` where `rest` is
/// `<srcName>/copyTo/b/<dstBucket>/o/<dstName>` (spec.md §6 "Copy").
pub async fn copy_object(
    State(state): State<AppState>,
    Path((src_bucket_name, rest)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (src_name, dst_part) = rest
        .split_once("/copyTo/b/")
        .ok_or_else(|| ApiError::Invalid("copy path must contain '/copyTo/b/'".to_string()))?;
    let (dst_bucket_name, dst_name) = dst_part
        .split_once("/o/")
        .ok_or_else(|| ApiError::Invalid("copy destination must be '<bucket>/o/<name>'".to_string()))?;

    let src_bucket = bucket::get(&state.kv, None, &src_bucket_name)?;
    let dst_bucket = bucket::get(&state.kv, None, dst_bucket_name)?;
    let storage_root = std::path::Path::new(&state.config.storage.root);

    let row = object::copy(
        &state.kv,
        &state.http_client,
        storage_root,
        &src_bucket,
        src_name,
        None,
        &dst_bucket,
        dst_name,
    )
    .await?;
    Ok(Json(object::to_response(&base_url(&state), dst_bucket_name, &row)))
}

// ── Upload ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "uploadType")]
    pub upload_type: String,
    pub name: Option<String>,
}

pub async fn upload_object(
    State(state): State<AppState>,
    Path(bucket_name): Path<String>,
    Query(q): Query<UploadQuery>,
    Query(preconditions_raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, None, &bucket_name)?;
    let storage_root = std::path::Path::new(&state.config.storage.root);
    let preconditions = preconditions_from_query(&preconditions_raw)?;

    match q.upload_type.as_str() {
        "media" => {
            let name = q.name.ok_or_else(|| ApiError::Invalid("media upload requires ?name=".to_string()))?;
            validation::validate_object_name(&name)?;
            let content_type = header_str(&headers, "content-type").unwrap_or("application/octet-stream").to_string();
            let row = object::write_new_version(
                &state.kv, &state.http_client, storage_root, &b, &name, &body, &content_type, HashMap::new(), preconditions,
            )
            .await?;
            Ok((StatusCode::OK, Json(object::to_response(&base_url(&state), &bucket_name, &row))))
        }
        "multipart" => {
            let content_type = header_str(&headers, "content-type")
                .ok_or_else(|| ApiError::Invalid("multipart upload requires Content-Type".to_string()))?;
            let boundary = multipart::extract_boundary(content_type)?;
            let parts = multipart::parse(&body, &boundary)?;
            let name = parts
                .metadata
                .name
                .or(q.name)
                .ok_or_else(|| ApiError::Invalid("multipart metadata is missing 'name'".to_string()))?;
            validation::validate_object_name(&name)?;
            let object_content_type = parts.metadata.content_type.unwrap_or(parts.content_type);
            let row = object::write_new_version(
                &state.kv, &state.http_client, storage_root, &b, &name, &parts.content, &object_content_type,
                parts.metadata.metadata, preconditions,
            )
            .await?;
            Ok((StatusCode::OK, Json(object::to_response(&base_url(&state), &bucket_name, &row))))
        }
        "resumable" => {
            let name = q.name.ok_or_else(|| ApiError::Invalid("resumable upload requires ?name=".to_string()))?;
            validation::validate_object_name(&name)?;
            let content_type = header_str(&headers, "x-upload-content-type")
                .or_else(|| header_str(&headers, "content-type"))
                .unwrap_or("application/octet-stream")
                .to_string();
            let declared_total_size = header_str(&headers, "x-upload-content-length").and_then(|v| v.parse().ok());
            let metadata: HashMap<String, String> = if body.is_empty() {
                HashMap::new()
            } else {
                serde_json::from_slice::<multipart::UploadMetadata>(&body).map(|m| m.metadata).unwrap_or_default()
            };
            let session_id = upload::initiate(
                &state.kv, storage_root, &b, &name,
                upload::InitiateRequest { content_type, declared_total_size, metadata },
            )?;
            let location = format!("{}/upload/storage/v1/resumable/{session_id}", base_url(&state));
            Ok((StatusCode::OK, Json(json!({ "sessionId": session_id, "location": location }))))
        }
        other => Err(ApiError::Invalid(format!("unsupported uploadType '{other}'"))),
    }
}

pub async fn resumable_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let storage_root = std::path::Path::new(&state.config.storage.root);
    let range_header = header_str(&headers, "content-range")
        .ok_or_else(|| ApiError::Invalid("resumable chunk requires Content-Range".to_string()))?;
    let range = validation::parse_content_range(range_header)?.map(|r| (r.start, r.end, r.total));

    match upload::put_chunk(&state.kv, &state.http_client, storage_root, &session_id, range, &body).await? {
        upload::ChunkOutcome::Incomplete { last_byte } => Ok((
            StatusCode::PERMANENT_REDIRECT,
            [("Range", format!("bytes=0-{last_byte}"))],
            Json(json!({ "lastByte": last_byte })),
        )
            .into_response()),
        upload::ChunkOutcome::Complete(row) => {
            let bucket_name = state
                .kv
                .buckets
                .get(&row.bucket_id)
                .map(|b| b.name.clone())
                .unwrap_or_default();
            Ok((StatusCode::OK, Json(object::to_response(&base_url(&state), &bucket_name, &row))).into_response())
        }
    }
}

pub async fn abort_resumable(State(state): State<AppState>, Path(session_id): Path<String>) -> ApiResult<impl IntoResponse> {
    upload::abort(&state.kv, &session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resumable_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage_root = std::path::Path::new(&state.config.storage.root);
    match upload::put_chunk(&state.kv, &state.http_client, storage_root, &session_id, None, &[]).await? {
        upload::ChunkOutcome::Incomplete { last_byte } => {
            Ok((StatusCode::PERMANENT_REDIRECT, [("Range", format!("bytes=0-{last_byte}"))]))
        }
        upload::ChunkOutcome::Complete(_) => unreachable!("status query never finalizes a session"),
    }
}

/// `OPTIONS /storage/v1/b/{bucket}/o/{*rest}` -- CORS preflight (SPEC_FULL.md
/// §4.1 supplement; spec.md's CORS rules only make sense if something
/// actually answers a preflight).
pub async fn cors_preflight(
    State(state): State<AppState>,
    Path((bucket_name, _name)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let b = bucket::get(&state.kv, None, &bucket_name)?;
    let origin = header_str(&headers, "origin").unwrap_or_default();
    let method = header_str(&headers, "access-control-request-method").unwrap_or("GET");

    match cors::apply(&b.cors_rules, origin, method) {
        Some(decision) => {
            let mut builder = vec![
                ("Access-Control-Allow-Origin".to_string(), decision.allow_origin),
                ("Access-Control-Allow-Methods".to_string(), decision.allow_methods),
                ("Access-Control-Allow-Headers".to_string(), decision.allow_headers),
            ];
            if let Some(max_age) = decision.max_age {
                builder.push(("Access-Control-Max-Age".to_string(), max_age.to_string()));
            }
            Ok((StatusCode::NO_CONTENT, builder))
        }
        None => Ok((StatusCode::NO_CONTENT, vec![])),
    }
}
