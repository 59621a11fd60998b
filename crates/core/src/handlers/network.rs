//! Networking HTTP surface (spec.md §6): firewalls, networks, subnetworks,
//! routes, routers, and reserved external addresses. Every mutation is
//! wrapped in an Operation record exactly like `handlers::compute`.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::handlers::base_url;
use crate::kv::OperationScope;
use crate::network::{firewall, records};
use crate::operations;
use crate::respond;
use crate::state::AppState;

fn done_operation(state: &AppState, project: &str, op_type: &str, target_link: &str, scope: OperationScope) -> serde_json::Value {
    let op = operations::record_done(&state.kv, project, op_type, target_link, scope, None);
    serde_json::to_value(operations::to_response(&base_url(state), &op)).unwrap()
}

// ── Firewalls ────────────────────────────────────────────────────────────

pub async fn create_firewall(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(req): Json<firewall::FirewallRuleRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.clone();
    firewall::create(&state.kv, &project, req)?;
    let link = respond::self_link(&base_url(&state), &format!("compute/v1/projects/{project}/global/firewalls/{name}"));
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Global)))
}

pub async fn get_firewall(State(state): State<AppState>, Path((project, name)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    let rule = firewall::get(&state.kv, &project, &name)?;
    Ok(Json(firewall::to_response(&base_url(&state), &rule)))
}

pub async fn list_firewalls(State(state): State<AppState>, Path(project): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(firewall::list(&state.kv, &project)))
}

pub async fn delete_firewall(State(state): State<AppState>, Path((project, name)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    firewall::delete(&state.kv, &project, &name)?;
    let link = respond::self_link(&base_url(&state), &format!("compute/v1/projects/{project}/global/firewalls/{name}"));
    Ok(Json(done_operation(&state, &project, "delete", &link, OperationScope::Global)))
}

// ── Networks ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    #[serde(default = "default_true", rename = "autoCreateSubnetworks")]
    pub auto_create_subnetworks: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create_network(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(req): Json<CreateNetworkRequest>,
) -> ApiResult<impl IntoResponse> {
    records::create_network(&state.kv, &project, &req.name, req.auto_create_subnetworks)?;
    let link = records::network_self_link(&base_url(&state), &project, &req.name);
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Global)))
}

pub async fn get_network(State(state): State<AppState>, Path((project, name)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    let network = records::get_network(&state.kv, &project, &name)?;
    Ok(Json(serde_json::json!({
        "kind": "compute#network",
        "name": network.name,
        "autoCreateSubnetworks": network.auto_create_subnetworks,
        "selfLink": records::network_self_link(&base_url(&state), &project, &name),
    })))
}

pub async fn list_networks(State(state): State<AppState>, Path(project): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(records::list_networks(&state.kv, &project)))
}

pub async fn delete_network(State(state): State<AppState>, Path((project, name)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    records::delete_network(&state.kv, &project, &name)?;
    let link = records::network_self_link(&base_url(&state), &project, &name);
    Ok(Json(done_operation(&state, &project, "delete", &link, OperationScope::Global)))
}

// ── Subnetworks ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSubnetRequest {
    pub name: String,
    pub network: String,
    #[serde(rename = "ipCidrRange")]
    pub ip_cidr_range: String,
}

pub async fn create_subnet(
    State(state): State<AppState>,
    Path((project, region)): Path<(String, String)>,
    Json(req): Json<CreateSubnetRequest>,
) -> ApiResult<impl IntoResponse> {
    records::create_subnet(&state.kv, &project, &region, &req.network, &req.name, &req.ip_cidr_range)?;
    let link = respond::self_link(
        &base_url(&state),
        &format!("compute/v1/projects/{project}/regions/{region}/subnetworks/{}", req.name),
    );
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Regional(region))))
}

pub async fn list_subnets(State(state): State<AppState>, Path((project, region)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(records::list_subnets(&state.kv, &project, &region)))
}

// ── Routes ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub name: String,
    pub network: String,
    #[serde(rename = "destRange")]
    pub dest_range: String,
    #[serde(default, rename = "nextHopIp")]
    pub next_hop_ip: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    1000
}

pub async fn create_route(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(req): Json<CreateRouteRequest>,
) -> ApiResult<impl IntoResponse> {
    records::create_route(&state.kv, &project, &req.name, &req.network, &req.dest_range, &req.next_hop_ip, req.priority)?;
    let link = respond::self_link(&base_url(&state), &format!("compute/v1/projects/{project}/global/routes/{}", req.name));
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Global)))
}

pub async fn list_routes(State(state): State<AppState>, Path(project): Path<String>) -> ApiResult<impl IntoResponse> {
    Ok(Json(records::list_routes(&state.kv, &project)))
}

// ── Routers ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRouterRequest {
    pub name: String,
    pub network: String,
}

pub async fn create_router(
    State(state): State<AppState>,
    Path((project, region)): Path<(String, String)>,
    Json(req): Json<CreateRouterRequest>,
) -> ApiResult<impl IntoResponse> {
    records::create_router(&state.kv, &project, &region, &req.name, &req.network)?;
    let link = respond::self_link(
        &base_url(&state),
        &format!("compute/v1/projects/{project}/regions/{region}/routers/{}", req.name),
    );
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Regional(region))))
}

pub async fn list_routers(State(state): State<AppState>, Path((project, region)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(records::list_routers(&state.kv, &project, &region)))
}

// ── Addresses ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReserveAddressRequest {
    pub name: String,
}

pub async fn reserve_address(
    State(state): State<AppState>,
    Path((project, region)): Path<(String, String)>,
    Json(req): Json<ReserveAddressRequest>,
) -> ApiResult<impl IntoResponse> {
    records::reserve_address(&state.kv, &project, Some(&region), &req.name)?;
    let link = respond::self_link(
        &base_url(&state),
        &format!("compute/v1/projects/{project}/regions/{region}/addresses/{}", req.name),
    );
    Ok(Json(done_operation(&state, &project, "insert", &link, OperationScope::Regional(region))))
}

pub async fn list_addresses(State(state): State<AppState>, Path((project, _region)): Path<(String, String)>) -> ApiResult<impl IntoResponse> {
    Ok(Json(records::list_addresses(&state.kv, &project)))
}
