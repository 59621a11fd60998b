//! Configuration loading (SPEC_FULL.md §10): compiled-in defaults layered
//! under an optional `config/core.toml` file and `CORE__`-prefixed
//! environment variables, matching the teacher's `ClusterConfig::load`
//! (DESIGN.md "Config").

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub compute: ComputeConfig,
    pub lifecycle: LifecycleConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory under which `<bucket_id>/<object_name>/v<generation>`
    /// and `tmp/<session_id>` live (spec.md §6 "Persistent state layout").
    pub root: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComputeConfig {
    /// Container-runtime endpoint. Empty string means "use Docker's default
    /// connection" (env `DOCKER_HOST` or the platform default socket).
    pub runtime_endpoint: String,
    /// Use the in-memory fake runtime instead of a real Docker daemon.
    /// Lets the emulator run (and its tests run) with no daemon installed.
    pub use_fake_runtime: bool,
    /// Reconciler poll interval, seconds (spec.md §4.2 "default 5").
    pub reconciler_interval_secs: u64,
    /// Per-mutation container-runtime call timeout (spec.md §5, "default 30s").
    pub container_call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Lifecycle executor wake interval, minutes (spec.md §4.6 "default 5").
    pub interval_minutes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// HMAC secret for signed-URL verification (spec.md §4.1, §6).
    pub signed_url_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub default_project_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl CoreConfig {
    /// Load configuration from `config/core.toml` (optional) and
    /// `CORE__`-prefixed environment variables, layered over compiled-in
    /// defaults. Mirrors the teacher's `ClusterConfig::load` byte-for-byte
    /// in structure (DESIGN.md).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&CoreConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        let config_paths = ["/etc/docktail-emulator/core", "config/core"];
        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CORE")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration (spec.md §10: "bind address parses, storage
    /// root exists or is creatable, signed-url secret non-empty").
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .context("Invalid server.bind_address")?;

        std::fs::create_dir_all(&self.storage.root).with_context(|| {
            format!("storage.root '{}' does not exist and could not be created", self.storage.root)
        })?;

        if self.security.signed_url_secret.is_empty() {
            anyhow::bail!("security.signed_url_secret must not be empty");
        }

        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0:8080".to_string(),
                request_timeout_secs: 60,
                enable_cors: true,
                cors_origins: vec!["*".to_string()],
                max_body_bytes: 512 * 1024 * 1024,
            },
            storage: StorageConfig { root: "data/storage".to_string() },
            compute: ComputeConfig {
                runtime_endpoint: String::new(),
                use_fake_runtime: true,
                reconciler_interval_secs: 5,
                container_call_timeout_secs: 30,
            },
            lifecycle: LifecycleConfig { interval_minutes: 5 },
            security: SecurityConfig {
                signed_url_secret: "local-development-signing-secret".to_string(),
            },
            logging: LoggingConfig { level: "info,core=debug".to_string(), format: LogFormat::Pretty },
            project: ProjectConfig { default_project_id: "local-project".to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = CoreConfig::default();
        cfg.storage.root = tmp.path().join("storage").to_string_lossy().to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_signing_secret_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = CoreConfig::default();
        cfg.storage.root = tmp.path().join("storage").to_string_lossy().to_string();
        cfg.security.signed_url_secret = String::new();
        assert!(cfg.validate().is_err());
    }
}
