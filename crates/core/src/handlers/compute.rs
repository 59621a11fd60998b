//! Compute control-plane HTTP surface (spec.md §6): instances, machine
//! types, and their operations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::compute::{instance, machine_type};
use crate::error::ApiResult;
use crate::handlers::base_url;
use crate::kv::OperationScope;
use crate::operations;
use crate::state::AppState;

pub async fn create_instance(
    State(state): State<AppState>,
    Path((project, zone)): Path<(String, String)>,
    Json(req): Json<instance::CreateInstanceRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.clone();
    instance::create(&state.kv, &state.runtime, &project, &zone, req).await?;
    let base = base_url(&state);
    let op = operations::record_done(
        &state.kv,
        &project,
        "insert",
        &crate::respond::self_link(&base, &format!("compute/v1/projects/{project}/zones/{zone}/instances/{name}")),
        OperationScope::Zonal(zone),
        None,
    );
    Ok((StatusCode::OK, Json(operations::to_response(&base, &op))))
}

pub async fn get_instance(
    State(state): State<AppState>,
    Path((project, zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    let inst = instance::get(&state.kv, &project, &zone, &name)?;
    Ok(Json(instance::to_response(&base_url(&state), &inst)))
}

pub async fn list_instances(
    State(state): State<AppState>,
    Path((project, zone)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let items = instance::list(&state.kv, &project, &zone);
    let base = base_url(&state);
    let items: Vec<_> = items.iter().map(|i| serde_json::to_value(instance::to_response(&base, i)).unwrap()).collect();
    Ok(Json(crate::respond::ListEnvelope::new("compute#instanceList", items)))
}

pub async fn start_instance(
    State(state): State<AppState>,
    Path((project, zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    instance::start(&state.kv, &state.runtime, &project, &zone, &name).await?;
    let base = base_url(&state);
    let op = operations::record_done(
        &state.kv, &project, "start",
        &crate::respond::self_link(&base, &format!("compute/v1/projects/{project}/zones/{zone}/instances/{name}")),
        OperationScope::Zonal(zone), None,
    );
    Ok(Json(operations::to_response(&base, &op)))
}

pub async fn stop_instance(
    State(state): State<AppState>,
    Path((project, zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    instance::stop(&state.kv, &state.runtime, &project, &zone, &name).await?;
    let base = base_url(&state);
    let op = operations::record_done(
        &state.kv, &project, "stop",
        &crate::respond::self_link(&base, &format!("compute/v1/projects/{project}/zones/{zone}/instances/{name}")),
        OperationScope::Zonal(zone), None,
    );
    Ok(Json(operations::to_response(&base, &op)))
}

pub async fn delete_instance(
    State(state): State<AppState>,
    Path((project, zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    instance::delete(&state.kv, &state.runtime, &project, &zone, &name).await?;
    let base = base_url(&state);
    let op = operations::record_done(
        &state.kv, &project, "delete",
        &crate::respond::self_link(&base, &format!("compute/v1/projects/{project}/zones/{zone}/instances/{name}")),
        OperationScope::Zonal(zone), None,
    );
    Ok(Json(operations::to_response(&base, &op)))
}

pub async fn list_machine_types(
    State(state): State<AppState>,
    Path((_project, zone)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let items = machine_type::list(&state.kv, &zone);
    Ok(Json(crate::respond::ListEnvelope::new("compute#machineTypeList", items)))
}

pub async fn get_machine_type(
    State(state): State<AppState>,
    Path((_project, zone, name)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    let m = machine_type::get(&state.kv, &zone, &name)?;
    Ok(Json(machine_type::to_response(&m)))
}
