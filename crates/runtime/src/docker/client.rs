//! Docker client — core struct, constructor, error types.
//!
//! Domain methods live in sibling modules (`container`, `image`, `network`)
//! which add `impl DockerClient` blocks.

use bollard::Docker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Operation timed out after {0}s")]
    Timeout(u64),
    #[error("Bollard error: {0}")]
    BollardError(#[from] bollard::errors::Error),
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    /// The bollard Docker client. `pub(super)` so sibling domain modules
    /// can call bollard APIs directly.
    pub(super) client: Docker,
    /// The Docker socket path this client is connected to.
    pub(super) socket_path: String,
}

impl DockerClient {
    pub fn new(socket_path: &str) -> Result<Self, DockerError> {
        let connection = if socket_path.is_empty() {
            Docker::connect_with_defaults()
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        };

        Ok(DockerClient {
            client: connection,
            socket_path: socket_path.to_string(),
        })
    }

    /// Get Docker system information. Used at startup to confirm the daemon
    /// is reachable before the reconciler starts polling it.
    pub async fn system_info(&self) -> Result<bollard::models::SystemInfo, DockerError> {
        self.client.info().await.map_err(DockerError::from)
    }
}
