//! Docker trait — abstract interface over the subset of Docker operations
//! the compute control plane needs.
//!
//! `live.rs` provides the real Bollard-backed implementation.
//! `fake.rs` provides an in-memory test double.

use std::collections::HashMap;
use std::pin::Pin;

use crate::docker::client::DockerError;
use crate::docker::container::CreateContainerRequest;
use crate::docker::inventory::ContainerInfo;

/// Unified async interface over the Docker daemon.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can live inside `Arc<AppState>`.
pub trait DockerOps: Send + Sync {
    // ── Container queries ───────────────────────────────────────

    fn list_containers(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<ContainerInfo>, DockerError>> + Send + '_>>;

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>>;

    fn inspect_container_raw<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::ContainerInspectResponse, DockerError>> + Send + 'a>>;

    // ── Container lifecycle ─────────────────────────────────────

    fn create_container<'a>(
        &'a self,
        request: CreateContainerRequest<'a>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String, DockerError>> + Send + 'a>>;

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    fn restart_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    // ── Images ──────────────────────────────────────────────────

    fn pull_image<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        registry_auth: Option<&'a str>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    // ── Networks ────────────────────────────────────────────────

    fn list_networks(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<bollard::models::Network>, DockerError>> + Send + '_>>;

    fn inspect_network<'a>(
        &'a self,
        network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkInspect, DockerError>> + Send + 'a>>;

    fn create_network<'a>(
        &'a self,
        name: &'a str,
        driver: Option<&'a str>,
        labels: HashMap<String, String>,
        internal: bool,
        attachable: bool,
        enable_ipv6: bool,
        options: HashMap<String, String>,
        ipam: Option<bollard::models::Ipam>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkCreateResponse, DockerError>> + Send + 'a>>;

    fn remove_network<'a>(
        &'a self,
        network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    fn network_connect<'a>(
        &'a self,
        network_id: &'a str,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    fn network_disconnect<'a>(
        &'a self,
        network_id: &'a str,
        container_id: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>>;

    // ── System ──────────────────────────────────────────────────

    fn system_info(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::SystemInfo, DockerError>> + Send + '_>>;
}
