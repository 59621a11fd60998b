//! Fake — test double for Docker operations.
//!
//! Provides a deterministic [`FakeDocker`] that implements [`DockerOps`]
//! using in-memory state. Lets the emulator run end to end, and its tests
//! run, with no Docker daemon available.

use std::collections::HashMap;
use std::pin::Pin;

use tokio::sync::Mutex;

use crate::client::docker::DockerOps;
use crate::docker::client::DockerError;
use crate::docker::container::CreateContainerRequest;
use crate::docker::inventory::ContainerInfo;

// ── In-memory state ─────────────────────────────────────────────

/// A canned container for the fake store.
#[derive(Clone, Debug)]
pub struct FakeContainer {
    pub info: ContainerInfo,
    pub running: bool,
}

/// Mutable inner state protected by a mutex.
#[derive(Default)]
struct Inner {
    containers: HashMap<String, FakeContainer>,
    networks: Vec<bollard::models::Network>,
    next_container_seq: u64,
}

/// A fake Docker client for deterministic testing.
///
/// All methods operate on in-memory state. The builder methods allow
/// pre-populating containers and networks before running test code.
pub struct FakeDocker {
    inner: Mutex<Inner>,
}

impl FakeDocker {
    /// Create an empty fake Docker client.
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Seed a container into the fake store.
    pub async fn add_container(&self, container: FakeContainer) {
        let mut state = self.inner.lock().await;
        state.containers.insert(container.info.id.clone(), container);
    }

    /// Seed a network.
    pub async fn add_network(&self, network: bollard::models::Network) {
        self.inner.lock().await.networks.push(network);
    }
}

impl Default for FakeDocker {
    fn default() -> Self {
        Self::new()
    }
}

// ── DockerOps implementation ────────────────────────────────────

impl DockerOps for FakeDocker {
    // ── Container queries ───────────────────────────────────────

    fn list_containers(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<ContainerInfo>, DockerError>> + Send + '_>> {
        Box::pin(async {
            let state = self.inner.lock().await;
            Ok(state.containers.values().map(|c| c.info.clone()).collect())
        })
    }

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            state.containers.get(id)
                .map(|c| c.info.clone())
                .ok_or_else(|| DockerError::ContainerNotFound(id.to_string()))
        })
    }

    fn inspect_container_raw<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::ContainerInspectResponse, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            if state.containers.contains_key(id) {
                Ok(bollard::models::ContainerInspectResponse {
                    id: Some(id.to_string()),
                    ..Default::default()
                })
            } else {
                Err(DockerError::ContainerNotFound(id.to_string()))
            }
        })
    }

    // ── Container lifecycle ─────────────────────────────────────

    fn create_container<'a>(
        &'a self,
        request: CreateContainerRequest<'a>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.next_container_seq += 1;
            let id = format!("fake-container-{:016x}", state.next_container_seq);

            let octet = 2 + (state.next_container_seq % 250);
            let ip_address = Some(format!("172.17.0.{}", octet));

            let info = ContainerInfo {
                id: id.clone(),
                name: request.name.to_string(),
                image: request.image.to_string(),
                state: "created".to_string(),
                status: "Created".to_string(),
                labels: request.labels,
                created_at: 0,
                ports: vec![],
                ip_address,
                state_info: None,
            };
            state.containers.insert(id.clone(), FakeContainer { info, running: false });
            Ok(id)
        })
    }

    fn start_container<'a>(
        &'a self,
        container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            match state.containers.get_mut(container_id) {
                Some(c) => { c.running = true; c.info.state = "running".into(); Ok(()) }
                None => Err(DockerError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn stop_container<'a>(
        &'a self,
        container_id: &'a str,
        _timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            match state.containers.get_mut(container_id) {
                Some(c) => { c.running = false; c.info.state = "exited".into(); Ok(()) }
                None => Err(DockerError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn restart_container<'a>(
        &'a self,
        container_id: &'a str,
        _timeout_secs: Option<u32>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            match state.containers.get_mut(container_id) {
                Some(c) => { c.running = true; c.info.state = "running".into(); Ok(()) }
                None => Err(DockerError::ContainerNotFound(container_id.to_string())),
            }
        })
    }

    fn remove_container<'a>(
        &'a self,
        container_id: &'a str,
        _force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.containers.remove(container_id)
                .map(|_| ())
                .ok_or_else(|| DockerError::ContainerNotFound(container_id.to_string()))
        })
    }

    // ── Images ──────────────────────────────────────────────────

    fn pull_image<'a>(
        &'a self,
        _image: &'a str,
        _tag: &'a str,
        _registry_auth: Option<&'a str>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    // ── Networks ────────────────────────────────────────────────

    fn list_networks(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<bollard::models::Network>, DockerError>> + Send + '_>> {
        Box::pin(async { Ok(self.inner.lock().await.networks.clone()) })
    }

    fn inspect_network<'a>(
        &'a self,
        _network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkInspect, DockerError>> + Send + 'a>> {
        Box::pin(async { Ok(Default::default()) })
    }

    fn create_network<'a>(
        &'a self,
        name: &'a str,
        _driver: Option<&'a str>,
        _labels: HashMap<String, String>,
        _internal: bool,
        _attachable: bool,
        _enable_ipv6: bool,
        _options: HashMap<String, String>,
        _ipam: Option<bollard::models::Ipam>,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::NetworkCreateResponse, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(bollard::models::NetworkCreateResponse {
                id: format!("fake-net-{}", name),
                warning: String::new(),
            })
        })
    }

    fn remove_network<'a>(
        &'a self,
        network_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            state.networks.retain(|n| n.id.as_deref() != Some(network_id));
            Ok(())
        })
    }

    fn network_connect<'a>(
        &'a self,
        _network_id: &'a str,
        _container_id: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn network_disconnect<'a>(
        &'a self,
        _network_id: &'a str,
        _container_id: &'a str,
        _force: bool,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    // ── System ──────────────────────────────────────────────────

    fn system_info(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bollard::models::SystemInfo, DockerError>> + Send + '_>> {
        Box::pin(async { Ok(Default::default()) })
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_container(id: &str, name: &str, state: &str) -> FakeContainer {
        FakeContainer {
            info: ContainerInfo {
                id: id.to_string(),
                name: name.to_string(),
                image: "docktail-emulator/vm-base:latest".to_string(),
                state: state.to_string(),
                status: "Up 2 hours".to_string(),
                labels: HashMap::new(),
                created_at: 1700000000,
                ports: vec![],
                ip_address: Some("172.17.0.2".to_string()),
                state_info: None,
            },
            running: state == "running",
        }
    }

    #[tokio::test]
    async fn list_containers_returns_seeded_containers() {
        let fake = FakeDocker::new();
        fake.add_container(make_container("abc123", "web", "running")).await;
        fake.add_container(make_container("def456", "db", "exited")).await;

        let containers = fake.list_containers().await.unwrap();
        assert_eq!(containers.len(), 2);
    }

    #[tokio::test]
    async fn inspect_container_found() {
        let fake = FakeDocker::new();
        fake.add_container(make_container("abc123", "web", "running")).await;

        let info = fake.inspect_container("abc123").await.unwrap();
        assert_eq!(info.name, "web");
    }

    #[tokio::test]
    async fn inspect_container_not_found() {
        let fake = FakeDocker::new();
        let result = fake.inspect_container("nonexistent").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_container_assigns_id_and_ip() {
        let fake = FakeDocker::new();
        let mut labels = HashMap::new();
        labels.insert("docktail.project".to_string(), "p1".to_string());

        let id = fake.create_container(CreateContainerRequest {
            name: "gce-p1-us-central1-a-vm1",
            image: "docktail-emulator/vm-base:latest",
            network: "bridge",
            labels,
        }).await.unwrap();

        let info = fake.inspect_container(&id).await.unwrap();
        assert_eq!(info.name, "gce-p1-us-central1-a-vm1");
        assert_eq!(info.state, "created");
        assert!(info.ip_address.is_some());
    }

    #[tokio::test]
    async fn container_lifecycle_transitions_state() {
        let fake = FakeDocker::new();
        fake.add_container(make_container("abc123", "web", "running")).await;

        fake.stop_container("abc123", None).await.unwrap();
        let info = fake.inspect_container("abc123").await.unwrap();
        assert_eq!(info.state, "exited");

        fake.start_container("abc123").await.unwrap();
        let info = fake.inspect_container("abc123").await.unwrap();
        assert_eq!(info.state, "running");

        fake.remove_container("abc123", false).await.unwrap();
        assert!(fake.inspect_container("abc123").await.is_err());
    }
}
