//! VM instance state machine, backed by a container per instance
//! (spec.md §4.2). Every mutation drives the row synchronously through its
//! full transition before the request returns — there is no async
//! provisioning queue, only the reconciler catching drift afterward.

use std::collections::HashMap;
use std::sync::Arc;

use runtime::{ContainerInfo, DockerOps};
use serde::{Deserialize, Serialize};

use crate::compute::machine_type;
use crate::error::ApiError;
use crate::kv::{Instance, InstanceStatus, NetworkInterface, Store};
use crate::network::allocator;
use crate::validation;

/// Image bound to every container regardless of machine type (SPEC_FULL.md
/// §4.2 supplement; machine-type-specific images are an open question).
pub const DEFAULT_IMAGE: &str = "docktail-emulator/vm-base:latest";
const DEFAULT_BRIDGE_NETWORK: &str = "bridge";

#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    #[serde(rename = "machineType")]
    pub machine_type: String,
    #[serde(default)]
    pub tags: TagsWrapper,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: MetadataWrapper,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagsWrapper {
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetadataWrapper {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

fn status_str(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Provisioning => "PROVISIONING",
        InstanceStatus::Staging => "STAGING",
        InstanceStatus::Running => "RUNNING",
        InstanceStatus::Stopping => "STOPPING",
        InstanceStatus::Terminated => "TERMINATED",
    }
}

fn invalid_state(name: &str, status: InstanceStatus, action: &str) -> ApiError {
    ApiError::Invalid(format!(
        "instance '{name}' is {}, cannot {action}",
        status_str(status)
    ))
}

/// Creates an instance and synchronously drives it `PROVISIONING ->
/// STAGING -> RUNNING` (spec.md §4.2 "create").
pub async fn create(
    store: &Store,
    runtime: &Arc<dyn DockerOps>,
    project: &str,
    zone: &str,
    req: CreateInstanceRequest,
) -> Result<Instance, ApiError> {
    validation::validate_resource_name(&req.name)?;
    validation::validate_zone(zone)?;
    machine_type::get(store, zone, &req.machine_type)?;

    let key = Instance::key(project, zone, &req.name);
    let _txn = store.row_locks.begin([key.clone()]);
    if store.instances.contains_key(&key) {
        return Err(ApiError::Conflict(format!("instance '{}' already exists in {project}/{zone}", req.name)));
    }

    let metadata = req.metadata.items.into_iter().map(|i| (i.key, i.value)).collect();
    let mut instance = Instance {
        name: req.name,
        project: project.to_string(),
        zone: zone.to_string(),
        machine_type: machine_type::short_name(&req.machine_type).to_string(),
        status: InstanceStatus::Provisioning,
        container_id: None,
        internal_ip: None,
        external_ip: None,
        tags: req.tags.items,
        labels: req.labels,
        user_metadata: metadata,
        network_interfaces: vec![],
        created_at: chrono::Utc::now(),
        last_start_at: None,
        last_stop_at: None,
    };
    store.instances.insert(key.clone(), instance.clone());

    bind_container_and_run(store, runtime, &key, &mut instance).await?;
    Ok(instance)
}

/// Drives `PROVISIONING -> STAGING -> RUNNING` (or, on restart from
/// `TERMINATED`, `STAGING -> RUNNING` reusing the existing external IP):
/// allocates IPs, creates or restarts the backing container, and refreshes
/// the row in the store at each step (spec.md §4.2 "Container binding").
async fn bind_container_and_run(
    store: &Store,
    runtime: &Arc<dyn DockerOps>,
    key: &str,
    instance: &mut Instance,
) -> Result<(), ApiError> {
    instance.status = InstanceStatus::Staging;
    store.instances.insert(key.to_string(), instance.clone());

    if instance.internal_ip.is_none() {
        instance.internal_ip = Some(allocator::allocate_internal(store, &instance.project)?);
    }
    if instance.external_ip.is_none() {
        instance.external_ip = Some(allocator::allocate_external(store, &instance.project)?);
    }

    let container_id = match &instance.container_id {
        Some(id) if runtime.inspect_container(id).await.is_ok() => {
            runtime.start_container(id).await?;
            id.clone()
        }
        _ => {
            let mut labels = instance.labels.clone();
            labels.insert("docktail.project".to_string(), instance.project.clone());
            labels.insert("docktail.zone".to_string(), instance.zone.clone());
            let name = instance.container_name();
            let id = runtime
                .create_container(runtime::docker::container::CreateContainerRequest {
                    name: &name,
                    image: DEFAULT_IMAGE,
                    network: DEFAULT_BRIDGE_NETWORK,
                    labels,
                })
                .await?;
            runtime.start_container(&id).await?;
            id
        }
    };

    if let Ok(info) = runtime.inspect_container(&container_id).await {
        refresh_ip_from_runtime(instance, &info);
    }

    instance.container_id = Some(container_id);
    instance.status = InstanceStatus::Running;
    instance.last_start_at = Some(chrono::Utc::now());
    instance.network_interfaces = vec![NetworkInterface {
        network_ip: instance.internal_ip.clone(),
        nat_ip: instance.external_ip.clone(),
    }];
    store.instances.insert(key.to_string(), instance.clone());
    Ok(())
}

fn refresh_ip_from_runtime(instance: &mut Instance, info: &ContainerInfo) {
    if let Some(ip) = &info.ip_address {
        if instance.internal_ip.as_deref() != Some(ip.as_str()) {
            instance.internal_ip = Some(ip.clone());
        }
    }
}

/// `start`: only legal from `TERMINATED` (spec.md §4.2).
pub async fn start(
    store: &Store,
    runtime: &Arc<dyn DockerOps>,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<Instance, ApiError> {
    let key = Instance::key(project, zone, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let mut instance = get(store, project, zone, name)?;
    if instance.status != InstanceStatus::Terminated {
        return Err(invalid_state(name, instance.status, "start"));
    }

    bind_container_and_run(store, runtime, &key, &mut instance).await?;
    Ok(instance)
}

/// `stop`: only legal from `RUNNING`; the container is preserved, not
/// removed (spec.md §4.2).
pub async fn stop(
    store: &Store,
    runtime: &Arc<dyn DockerOps>,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<Instance, ApiError> {
    let key = Instance::key(project, zone, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let mut instance = get(store, project, zone, name)?;
    if instance.status != InstanceStatus::Running {
        return Err(invalid_state(name, instance.status, "stop"));
    }

    instance.status = InstanceStatus::Stopping;
    store.instances.insert(key.clone(), instance.clone());

    if let Some(id) = &instance.container_id {
        let _ = runtime.stop_container(id, Some(10)).await;
    }

    instance.status = InstanceStatus::Terminated;
    instance.last_stop_at = Some(chrono::Utc::now());
    store.instances.insert(key, instance.clone());
    Ok(instance)
}

/// `delete`: legal from any state. If `RUNNING`, drives the stop
/// sub-sequence first, then removes the container and the row. The
/// internal IP is not returned to a free list -- the allocator's counters
/// never reuse addresses, released or not (spec.md §4.3).
pub async fn delete(
    store: &Store,
    runtime: &Arc<dyn DockerOps>,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<(), ApiError> {
    let key = Instance::key(project, zone, name);
    let _txn = store.row_locks.begin([key.clone()]);

    let instance = get(store, project, zone, name)?;
    if instance.status == InstanceStatus::Running {
        if let Some(id) = &instance.container_id {
            let _ = runtime.stop_container(id, Some(10)).await;
        }
    }
    if let Some(id) = &instance.container_id {
        let _ = runtime.remove_container(id, true).await;
    }
    store.instances.remove(&key);
    Ok(())
}

pub fn get(store: &Store, project: &str, zone: &str, name: &str) -> Result<Instance, ApiError> {
    store
        .instances
        .get(&Instance::key(project, zone, name))
        .map(|i| i.clone())
        .ok_or_else(|| ApiError::NotFound(format!("instance '{name}' not found")))
}

/// `zone == "-"` or `"*"` aggregates across every zone the project has
/// instances in (spec.md §4.2 "List/Get").
pub fn list(store: &Store, project: &str, zone: &str) -> Vec<Instance> {
    let aggregate = zone == "-" || zone == "*";
    store
        .instances
        .iter()
        .filter(|i| i.project == project && (aggregate || i.zone == zone))
        .map(|i| i.clone())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct InstanceResponse {
    pub kind: &'static str,
    pub name: String,
    pub zone: String,
    #[serde(rename = "machineType")]
    pub machine_type: String,
    pub status: &'static str,
    #[serde(rename = "networkInterfaces")]
    pub network_interfaces: Vec<InstanceNetworkInterface>,
    pub tags: InstanceTags,
    pub labels: HashMap<String, String>,
    #[serde(rename = "selfLink")]
    pub self_link: String,
    #[serde(rename = "creationTimestamp")]
    pub creation_timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct InstanceTags {
    pub items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceNetworkInterface {
    #[serde(rename = "networkIP", skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    #[serde(rename = "accessConfigs")]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Serialize)]
pub struct AccessConfig {
    #[serde(rename = "natIP", skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

pub fn to_response(base_url: &str, instance: &Instance) -> InstanceResponse {
    InstanceResponse {
        kind: "compute#instance",
        name: instance.name.clone(),
        zone: instance.zone.clone(),
        machine_type: instance.machine_type.clone(),
        status: status_str(instance.status),
        network_interfaces: instance
            .network_interfaces
            .iter()
            .map(|n| InstanceNetworkInterface {
                network_ip: n.network_ip.clone(),
                access_configs: vec![AccessConfig { nat_ip: n.nat_ip.clone() }],
            })
            .collect(),
        tags: InstanceTags { items: instance.tags.clone() },
        labels: instance.labels.clone(),
        self_link: crate::respond::self_link(
            base_url,
            &format!("compute/v1/projects/{}/zones/{}/instances/{}", instance.project, instance.zone, instance.name),
        ),
        creation_timestamp: crate::respond::format_timestamp(instance.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::machine_type::seed_catalogue;
    use runtime::FakeDocker;

    fn fixture() -> (Store, Arc<dyn DockerOps>) {
        let store = Store::new();
        seed_catalogue(&store);
        (store, Arc::new(FakeDocker::new()) as Arc<dyn DockerOps>)
    }

    fn create_req() -> CreateInstanceRequest {
        CreateInstanceRequest {
            name: "vm1".into(),
            machine_type: "e2-medium".into(),
            tags: TagsWrapper { items: vec!["web".into()] },
            labels: HashMap::new(),
            metadata: MetadataWrapper { items: vec![] },
        }
    }

    #[tokio::test]
    async fn create_drives_instance_to_running_with_bound_ips() {
        let (store, runtime) = fixture();
        let instance = create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Running);
        assert!(instance.internal_ip.is_some());
        assert!(instance.external_ip.is_some());
        assert!(instance.container_id.is_some());
    }

    #[tokio::test]
    async fn duplicate_create_in_same_zone_conflicts() {
        let (store, runtime) = fixture();
        create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        let err = create(&store, &runtime, "p1", "us-central1-a", create_req()).await;
        assert!(matches!(err, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn full_lifecycle_stop_then_start_preserves_external_ip() {
        let (store, runtime) = fixture();
        let created = create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        let external_before = created.external_ip.clone();

        let stopped = stop(&store, &runtime, "p1", "us-central1-a", "vm1").await.unwrap();
        assert_eq!(stopped.status, InstanceStatus::Terminated);

        let restarted = start(&store, &runtime, "p1", "us-central1-a", "vm1").await.unwrap();
        assert_eq!(restarted.status, InstanceStatus::Running);
        assert_eq!(restarted.external_ip, external_before);
    }

    #[tokio::test]
    async fn stop_on_terminated_is_an_invalid_state_error() {
        let (store, runtime) = fixture();
        create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        stop(&store, &runtime, "p1", "us-central1-a", "vm1").await.unwrap();

        let err = stop(&store, &runtime, "p1", "us-central1-a", "vm1").await;
        assert!(matches!(err, Err(ApiError::Invalid(_))));
    }

    #[tokio::test]
    async fn start_on_running_is_an_invalid_state_error() {
        let (store, runtime) = fixture();
        create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        let err = start(&store, &runtime, "p1", "us-central1-a", "vm1").await;
        assert!(matches!(err, Err(ApiError::Invalid(_))));
    }

    #[tokio::test]
    async fn delete_from_running_stops_and_removes_the_container() {
        let (store, runtime) = fixture();
        let instance = create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        let container_id = instance.container_id.clone().unwrap();

        delete(&store, &runtime, "p1", "us-central1-a", "vm1").await.unwrap();
        assert!(get(&store, "p1", "us-central1-a", "vm1").is_err());
        assert!(runtime.inspect_container(&container_id).await.is_err());
    }

    #[tokio::test]
    async fn aggregated_list_spans_every_zone() {
        let (store, runtime) = fixture();
        create(&store, &runtime, "p1", "us-central1-a", create_req()).await.unwrap();
        let mut req2 = create_req();
        req2.name = "vm2".into();
        create(&store, &runtime, "p1", "us-central1-b", req2).await.unwrap();

        assert_eq!(list(&store, "p1", "us-central1-a").len(), 1);
        assert_eq!(list(&store, "p1", "-").len(), 2);
    }
}
