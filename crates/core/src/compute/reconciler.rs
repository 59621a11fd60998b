//! Background reconciliation loop (spec.md §4.2 "Reconciler"): every
//! `reconciler_interval_secs`, re-checks every `RUNNING`/`STOPPING`
//! instance against the runtime and corrects drift.
//!
//! Shaped like the teacher's `AgentRegistry::start_health_monitoring`: a
//! `tokio::time::interval` tick raced against a `watch` shutdown signal
//! (SPEC_FULL.md §4.2 supplement "task supervision").

use std::sync::Arc;
use std::time::Duration;

use runtime::DockerOps;
use tokio::sync::watch;

use crate::kv::{InstanceStatus, Store};

pub async fn run(store: Arc<Store>, runtime: Arc<dyn DockerOps>, interval_secs: u64, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => reconcile_once(&store, &runtime).await,
            _ = shutdown.changed() => {
                tracing::info!("reconciler shutting down");
                break;
            }
        }
    }
}

async fn reconcile_once(store: &Store, runtime: &Arc<dyn DockerOps>) {
    let candidates: Vec<String> = store
        .instances
        .iter()
        .filter(|i| matches!(i.status, InstanceStatus::Running | InstanceStatus::Stopping))
        .map(|i| crate::kv::Instance::key(&i.project, &i.zone, &i.name))
        .collect();

    for key in candidates {
        let Some(mut instance) = store.instances.get(&key).map(|i| i.clone()) else { continue };
        let Some(container_id) = instance.container_id.clone() else { continue };

        match runtime.inspect_container(&container_id).await {
            Ok(info) => {
                if let Some(ip) = &info.ip_address {
                    if instance.internal_ip.as_deref() != Some(ip.as_str()) {
                        instance.internal_ip = Some(ip.clone());
                        if let Some(nic) = instance.network_interfaces.first_mut() {
                            nic.network_ip = Some(ip.clone());
                        }
                        store.instances.insert(key.clone(), instance.clone());
                    }
                }
                if !info.ports.is_empty() && info.state != "running" && instance.status == InstanceStatus::Running {
                    tracing::warn!(instance = %instance.name, "container reports non-running state while instance row says RUNNING");
                }
            }
            Err(_) => {
                tracing::warn!(instance = %instance.name, container_id = %container_id, "backing container missing; marking instance TERMINATED");
                instance.status = InstanceStatus::Terminated;
                instance.container_id = None;
                store.instances.insert(key.clone(), instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::instance;
    use crate::compute::machine_type::seed_catalogue;
    use runtime::FakeDocker;
    use std::collections::HashMap;

    #[tokio::test]
    async fn crashed_container_flips_instance_to_terminated() {
        let store = Store::new();
        seed_catalogue(&store);
        let runtime: Arc<dyn DockerOps> = Arc::new(FakeDocker::new());

        let req = instance::CreateInstanceRequest {
            name: "vm1".into(),
            machine_type: "e2-medium".into(),
            tags: instance::TagsWrapper { items: vec![] },
            labels: HashMap::new(),
            metadata: instance::MetadataWrapper { items: vec![] },
        };
        let created = instance::create(&store, &runtime, "p1", "us-central1-a", req).await.unwrap();
        let container_id = created.container_id.clone().unwrap();
        runtime.remove_container(&container_id, true).await.unwrap();

        reconcile_once(&store, &runtime).await;

        let row = instance::get(&store, "p1", "us-central1-a", "vm1").unwrap();
        assert_eq!(row.status, InstanceStatus::Terminated);
    }
}
