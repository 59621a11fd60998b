//! Identity-registry HTTP surface (spec.md §6): service accounts, their
//! keys, and IAM policy storage/echo (spec.md §4.4). No authentication or
//! enforcement happens anywhere in this core.
//!
//! The real provider's API spells policy and lifecycle actions as a colon
//! suffix glued onto the resource segment (`{email}:enable`,
//! `{resource}:getIamPolicy`) rather than a separate path segment. Axum's
//! router matches whole segments, so routes that can carry a suffix accept
//! the raw segment and split it here instead of leaning on the router to
//! parse it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::identity::{key, policy, service_account};
use crate::kv::Binding;
use crate::state::AppState;

fn split_action(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(':') {
        Some((head, action)) => (head, Some(action)),
        None => (raw, None),
    }
}

// ── Service accounts ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateServiceAccountRequest {
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(default, rename = "serviceAccount")]
    pub service_account: ServiceAccountFields,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServiceAccountFields {
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_service_account(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(req): Json<CreateServiceAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    let account = service_account::create(
        &state.kv,
        &project,
        &req.account_id,
        req.service_account.display_name.as_deref(),
        req.service_account.description.as_deref(),
    )?;
    Ok((StatusCode::OK, Json(service_account::to_response(&account))))
}

pub async fn list_service_accounts(State(state): State<AppState>, Path(project): Path<String>) -> ApiResult<impl IntoResponse> {
    let accounts = service_account::list(&state.kv, &project);
    let items: Vec<_> = accounts.iter().map(service_account::to_response).collect();
    Ok(Json(crate::respond::ListEnvelope::new("iam#serviceAccounts", items)))
}

/// `GET /v1/projects/{project}/serviceAccounts/{email}` and
/// `GET /v1/projects/{project}/serviceAccounts/{email}:getIamPolicy`.
pub async fn get_service_account(
    State(state): State<AppState>,
    Path((_project, raw)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (email, action) = split_action(&raw);
    match action {
        None => Ok(Json(service_account::to_response(&service_account::get(&state.kv, email)?)).into_response()),
        Some("getIamPolicy") => {
            let resource = resource_name(email);
            Ok(Json(policy::get(&state.kv, &resource)).into_response())
        }
        Some(other) => Err(ApiError::Unsupported(format!("unsupported service account GET action '{other}'"))),
    }
}

pub async fn delete_service_account(
    State(state): State<AppState>,
    Path((_project, email)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    service_account::delete(&state.kv, &email)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetPolicyBody {
    pub policy: PolicyBody,
}

#[derive(Debug, Deserialize)]
pub struct PolicyBody {
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
pub struct TestPermissionsBody {
    pub permissions: Vec<String>,
    /// Caller identity to test. Unlike the real provider (which derives this
    /// from the request's credentials), this core performs no
    /// authentication, so the member under test is supplied explicitly
    /// (SPEC_FULL.md §4.4 supplement, recorded in DESIGN.md).
    #[serde(default = "default_member")]
    pub member: String,
}

fn default_member() -> String {
    "allUsers".to_string()
}

fn resource_name(email: &str) -> String {
    format!("serviceAccounts/{email}")
}

/// `POST /v1/projects/{project}/serviceAccounts/{email}:enable`,
/// `:disable`, `:setIamPolicy`, or `:testIamPermissions`.
pub async fn post_service_account_action(
    State(state): State<AppState>,
    Path((_project, raw)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> ApiResult<impl IntoResponse> {
    let (email, action) = split_action(&raw);
    match action {
        Some("enable") => Ok(Json(service_account::to_response(&service_account::enable(&state.kv, email)?)).into_response()),
        Some("disable") => Ok(Json(service_account::to_response(&service_account::disable(&state.kv, email)?)).into_response()),
        Some("setIamPolicy") => {
            let req: SetPolicyBody = serde_json::from_slice(&body)
                .map_err(|e| ApiError::Invalid(format!("invalid setIamPolicy body: {e}")))?;
            let resource = resource_name(email);
            let updated = policy::set(&state.kv, &resource, &req.policy.etag, req.policy.bindings)?;
            Ok(Json(updated).into_response())
        }
        Some("testIamPermissions") => {
            let req: TestPermissionsBody = serde_json::from_slice(&body)
                .map_err(|e| ApiError::Invalid(format!("invalid testIamPermissions body: {e}")))?;
            let resource = resource_name(email);
            let granted = policy::test_permissions(&state.kv, &resource, &req.member, &req.permissions);
            Ok(Json(serde_json::json!({ "permissions": granted })).into_response())
        }
        other => Err(ApiError::Invalid(format!(
            "POST to a service account requires an action suffix, got {:?}",
            other
        ))),
    }
}

// ── Keys ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub name: String,
    #[serde(rename = "privateKeyType")]
    pub private_key_type: &'static str,
    #[serde(rename = "keyAlgorithm")]
    pub key_algorithm: String,
    #[serde(rename = "privateKeyData")]
    pub private_key_data: String,
}

pub async fn create_key(
    State(state): State<AppState>,
    Path((project, email)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (row, private_key_data) = key::create(&state.kv, &project, &email)?;
    Ok((
        StatusCode::OK,
        Json(CreateKeyResponse {
            name: format!("serviceAccounts/{email}/keys/{}", row.id),
            private_key_type: "TYPE_GOOGLE_CREDENTIALS_FILE",
            key_algorithm: row.algorithm,
            private_key_data,
        }),
    ))
}

pub async fn list_keys(State(state): State<AppState>, Path((_project, email)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    let keys = key::list(&state.kv, &email);
    let items: Vec<_> = keys
        .iter()
        .map(|k| serde_json::json!({"name": format!("serviceAccounts/{}/keys/{}", k.service_account_email, k.id), "keyAlgorithm": k.algorithm}))
        .collect();
    Ok(Json(serde_json::json!({ "keys": items })))
}

pub async fn get_key(State(state): State<AppState>, Path((_project, _email, key_id)): Path<(String, String, String)>) -> ApiResult<impl IntoResponse> {
    let row = key::get(&state.kv, &key_id)?;
    Ok(Json(
        serde_json::json!({"name": format!("serviceAccounts/{}/keys/{}", row.service_account_email, row.id), "keyAlgorithm": row.algorithm}),
    ))
}

pub async fn delete_key(State(state): State<AppState>, Path((_project, _email, key_id)): Path<(String, String, String)>) -> ApiResult<impl IntoResponse> {
    key::delete(&state.kv, &key_id)?;
    Ok(StatusCode::NO_CONTENT)
}
