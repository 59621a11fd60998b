//! Live — implements `DockerOps` for the real Bollard-backed `DockerClient`.

use std::collections::HashMap;
use std::pin::Pin;

use crate::client::docker::DockerOps;
use crate::docker::client::{DockerClient, DockerError};
use crate::docker::container::CreateContainerRequest;
use crate::docker::inventory::ContainerInfo;

impl DockerOps for DockerClient {
    // ── Container queries ───────────────────────────────────────

    fn list_containers(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<ContainerInfo>, DockerError>> + Send + '_>> {
        Box::pin(self.list_containers())
    }

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>> {
        Box::pin(self.inspect_container(id))
    }

    fn inspect_container_raw<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::ContainerInspectResponse, DockerError>> + Send + 'a>> {
        Box::pin(self.inspect_container_raw(id))
    }

    // ── Container lifecycle ─────────────────────────────────────

    fn create_container<'a>(
        &'a self,
        request: CreateContainerRequest<'a>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(self.create_container(request))
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.start_container(container_id))
    }

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.stop_container(container_id, timeout_secs))
    }

    fn restart_container<'a>(
        &'a self,
        container_id: &'a str,
        timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.restart_container(container_id, timeout_secs))
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.remove_container(container_id, force))
    }

    // ── Images ──────────────────────────────────────────────────

    fn pull_image<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        registry_auth: Option<&'a str>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.pull_image(image, tag, registry_auth))
    }

    // ── Networks ────────────────────────────────────────────────

    fn list_networks(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<bollard::models::Network>, DockerError>> + Send + '_>> {
        Box::pin(self.list_networks())
    }

    fn inspect_network<'a>(
        &'a self,
        network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkInspect, DockerError>> + Send + 'a>> {
        Box::pin(self.inspect_network(network_id))
    }

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
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkCreateResponse, DockerError>> + Send + 'a>> {
        Box::pin(self.create_network(name, driver, labels, internal, attachable, enable_ipv6, options, ipam))
    }

    fn remove_network<'a>(
        &'a self,
        network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.remove_network(network_id))
    }

    fn network_connect<'a>(
        &'a self,
        network_id: &'a str,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.network_connect(network_id, container_id))
    }

    fn network_disconnect<'a>(
        &'a self,
        network_id: &'a str,
        container_id: &'a str,
        force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.network_disconnect(network_id, container_id, force))
    }

    // ── System ──────────────────────────────────────────────────

    fn system_info(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::SystemInfo, DockerError>> + Send + '_>> {
        Box::pin(self.system_info())
    }
}
