//! Shared application state (DESIGN.md "Global mutable state -> explicit
//! context"): a single `ServiceContext` threaded through every handler and
//! background loop in place of the process-wide globals the source used.

use crate::config::CoreConfig;
use crate::kv::Store;
use runtime::DockerOps;
use std::sync::Arc;

/// The `ServiceContext` named in spec.md §9's design notes, given an
/// axum-friendly name (`AppState`) matching the teacher's own naming.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub kv: Arc<Store>,
    pub runtime: Arc<dyn DockerOps>,
    /// Shared HTTP client for webhook delivery (spec.md §4.7); one pooled
    /// client per process rather than one per dispatch.
    pub http_client: reqwest::Client,
    /// Watch channel for background-task shutdown signaling. Unlike
    /// broadcast, watch never loses messages -- late subscribers still see
    /// the latest value.
    pub shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: CoreConfig, runtime: Arc<dyn DockerOps>) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("reqwest client builder never fails with these options");

        Self {
            config: Arc::new(config),
            kv: Arc::new(Store::new()),
            runtime,
            http_client,
            shutdown_tx,
        }
    }

    /// Signal shutdown to every background task selecting on this channel.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
