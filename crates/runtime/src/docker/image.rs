//! Image domain — pulling the default base image for new instances.

use super::client::{DockerClient, DockerError};
use futures_util::stream::StreamExt;

impl DockerClient {
    /// Pull an image from a registry. Returns when the pull is complete.
    pub async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        registry_auth: Option<&str>,
    ) -> Result<(), DockerError> {
        use bollard::auth::DockerCredentials;
        use bollard::query_parameters::CreateImageOptions;

        let options = Some(CreateImageOptions {
            from_image: Some(image.to_string()),
            tag: Some(tag.to_string()),
            ..Default::default()
        });

        let credentials = registry_auth.map(|auth| DockerCredentials {
            auth: Some(auth.to_string()),
            ..Default::default()
        });

        let mut stream = self.client.create_image(options, None, credentials);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    tracing::debug!(status = ?info.status, "image pull progress");
                }
                Err(e) => return Err(DockerError::from(e)),
            }
        }

        Ok(())
    }
}
