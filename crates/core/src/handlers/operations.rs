//! Operation-registry HTTP surface (spec.md §4.5, §6): polling and listing
//! endpoints for the three scopes every mutating compute/VPC API returns
//! an Operation under.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{ApiError, ApiResult};
use crate::handlers::base_url;
use crate::kv::OperationScope;
use crate::operations;
use crate::respond::ListEnvelope;
use crate::state::AppState;

fn fetch(state: &AppState, project: &str, name: &str) -> ApiResult<serde_json::Value> {
    let op = operations::get(&state.kv, project, name)
        .ok_or_else(|| ApiError::NotFound(format!("operation '{name}' not found")))?;
    Ok(serde_json::to_value(operations::to_response(&base_url(state), &op)).unwrap())
}

pub async fn get_global_operation(State(state): State<AppState>, Path((project, name)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(fetch(&state, &project, &name)?))
}

pub async fn get_regional_operation(
    State(state): State<AppState>,
    Path((project, _region, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(fetch(&state, &project, &name)?))
}

pub async fn get_zonal_operation(
    State(state): State<AppState>,
    Path((project, _zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(fetch(&state, &project, &name)?))
}

fn list(state: &AppState, project: &str, scope: OperationScope) -> ListEnvelope<serde_json::Value> {
    let base = base_url(state);
    let items = operations::list(&state.kv, project, &scope)
        .iter()
        .map(|op| serde_json::to_value(operations::to_response(&base, op)).unwrap())
        .collect();
    ListEnvelope::new("compute#operationList", items)
}

pub async fn list_global_operations(State(state): State<AppState>, Path(project): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(list(&state, &project, OperationScope::Global)))
}

pub async fn list_regional_operations(State(state): State<AppState>, Path((project, region)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(list(&state, &project, OperationScope::Regional(region))))
}

pub async fn list_zonal_operations(State(state): State<AppState>, Path((project, zone)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(list(&state, &project, OperationScope::Zonal(zone))))
}
