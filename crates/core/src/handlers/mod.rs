//! HTTP surface (spec.md §6): thin axum handlers that parse a request,
//! call into the matching domain module, and shape the JSON response.
//! Keeps `main.rs` to router wiring only.

pub mod compute;
pub mod identity;
pub mod network;
pub mod operations;
pub mod storage;

use crate::state::AppState;

/// The absolute base URL this process is reachable at, used to build
/// `selfLink` fields (spec.md §4.8). Derived from config rather than the
/// request's `Host` header so links are stable regardless of how a client
/// reached the server.
pub fn base_url(state: &AppState) -> String {
    format!("http://{}", state.config.server.bind_address)
}

/// Resolves the project id a request should act under: the `project` query
/// parameter if given, otherwise the configured default project (spec.md §3
/// "Project" -- every resource belongs to exactly one).
pub fn project_or_default(state: &AppState, project: Option<&str>) -> String {
    project.map(str::to_string).unwrap_or_else(|| state.config.project.default_project_id.clone())
}
