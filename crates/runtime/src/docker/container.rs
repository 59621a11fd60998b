//! Container domain — list, inspect, create, and lifecycle.

use super::client::{DockerClient, DockerError};
use super::inventory::ContainerInfo;

use bollard::container::Config;
use bollard::models::{ContainerInspectResponse, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
};
use std::collections::HashMap;

/// Parameters for creating the container that backs a VM instance.
pub struct CreateContainerRequest<'a> {
    /// Container name, e.g. `gce-<project>-<zone>-<instance>`.
    pub name: &'a str,
    pub image: &'a str,
    pub network: &'a str,
    pub labels: HashMap<String, String>,
}

impl DockerClient {
    pub async fn list_containers(&self) -> Result<Vec<ContainerInfo>, DockerError> {
        let options = Some(ListContainersOptions {
            all: true,
            ..Default::default()
        });
        let containers = self.client.list_containers(options).await?;
        Ok(containers.into_iter().map(|c| c.into()).collect())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, DockerError> {
        let details: ContainerInspectResponse = self.client.inspect_container(id, None).await?;
        Ok(ContainerInfo::from(details))
    }

    /// Returns the full `ContainerInspectResponse` from Docker for a container.
    pub async fn inspect_container_raw(
        &self,
        id: &str,
    ) -> Result<ContainerInspectResponse, DockerError> {
        let details: ContainerInspectResponse = self.client.inspect_container(id, None).await?;
        Ok(details)
    }

    /// Create a container attached to `request.network`, not yet started.
    /// Returns the Docker-assigned container ID.
    pub async fn create_container(
        &self,
        request: CreateContainerRequest<'_>,
    ) -> Result<String, DockerError> {
        let options = Some(CreateContainerOptions {
            name: Some(request.name.to_string()),
            ..Default::default()
        });

        let config = Config {
            image: Some(request.image.to_string()),
            labels: Some(request.labels),
            host_config: Some(HostConfig {
                network_mode: Some(request.network.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(options, config)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => DockerError::ImageNotFound(request.image.to_string()),
                other => DockerError::BollardError(other),
            })?;

        Ok(response.id)
    }

    // ── Container Lifecycle ───────────────────────────────────────

    /// Start a stopped container.
    pub async fn start_container(&self, container_id: &str) -> Result<(), DockerError> {
        self.client
            .start_container(container_id, None)
            .await
            .map_err(|e| container_not_found_or(container_id, e))
    }

    /// Stop a running container with an optional timeout (in seconds).
    pub async fn stop_container(
        &self,
        container_id: &str,
        timeout_secs: Option<u32>,
    ) -> Result<(), DockerError> {
        use bollard::query_parameters::StopContainerOptions;

        let options = timeout_secs.map(|t| StopContainerOptions {
            t: Some(t as i32),
            ..Default::default()
        });

        self.client
            .stop_container(container_id, options)
            .await
            .map_err(|e| container_not_found_or(container_id, e))
    }

    /// Remove a container, killing it first if `force` is true.
    pub async fn remove_container(
        &self,
        container_id: &str,
        force: bool,
    ) -> Result<(), DockerError> {
        let options = Some(RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        });

        self.client
            .remove_container(container_id, options)
            .await
            .map_err(|e| container_not_found_or(container_id, e))
    }
}

fn container_not_found_or(container_id: &str, e: bollard::errors::Error) -> DockerError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => DockerError::ContainerNotFound(container_id.to_string()),
        other => DockerError::BollardError(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_container_request_carries_labels() {
        let mut labels = HashMap::new();
        labels.insert("docktail.project".to_string(), "p1".to_string());
        let req = CreateContainerRequest {
            name: "gce-p1-us-central1-a-vm1",
            image: "docktail-emulator/vm-base:latest",
            network: "bridge",
            labels,
        };
        assert_eq!(req.name, "gce-p1-us-central1-a-vm1");
        assert_eq!(req.labels.get("docktail.project").unwrap(), "p1");
    }
}
