//! The data model (spec.md §3): every KV row shape, verbatim in field
//! content though represented here as typed structs rather than untyped
//! dictionaries (see DESIGN.md, "Dynamic JSON <-> static types").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub numeric_id: u64,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsRule {
    pub origin: Vec<String>,
    pub method: Vec<String>,
    #[serde(default)]
    pub response_header: Vec<String>,
    #[serde(default)]
    pub max_age_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub id: String,
    pub webhook_url: String,
    #[serde(default)]
    pub object_name_prefix: Option<String>,
    #[serde(default)]
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum LifecycleAction {
    Delete,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub action: LifecycleAction,
    pub age_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    /// Internal surrogate key, never surfaced in responses (spec.md §4.8).
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub location: String,
    pub storage_class: String,
    pub versioning_enabled: bool,
    #[serde(default)]
    pub cors_rules: Vec<CorsRule>,
    #[serde(default)]
    pub notification_configs: Vec<NotificationConfig>,
    #[serde(default)]
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRow {
    pub bucket_id: String,
    pub name: String,
    pub generation: i64,
    pub metageneration: i64,
    pub size: u64,
    pub content_type: String,
    pub md5: String,
    pub crc32c: String,
    pub file_path: String,
    pub is_latest: bool,
    pub deleted: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ObjectRow {
    pub fn key(bucket_id: &str, name: &str) -> String {
        format!("{bucket_id}\u{0}{name}")
    }
}

/// Every historical content state of an object. Same shape as [`ObjectRow`]
/// plus `object_id`; `(bucket_id, name, generation)` is unique.
pub type ObjectVersion = ObjectRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumableSession {
    pub session_id: String,
    pub bucket_id: String,
    pub object_name: String,
    pub declared_total_size: Option<u64>,
    pub current_offset: u64,
    pub temp_path: String,
    pub pending_metadata: HashMap<String, String>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub network_ip: Option<String>,
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub project: String,
    pub zone: String,
    pub machine_type: String,
    pub status: InstanceStatus,
    pub container_id: Option<String>,
    pub internal_ip: Option<String>,
    pub external_ip: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    pub created_at: DateTime<Utc>,
    pub last_start_at: Option<DateTime<Utc>>,
    pub last_stop_at: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn key(project: &str, zone: &str, name: &str) -> String {
        format!("{project}\u{0}{zone}\u{0}{name}")
    }

    pub fn container_name(&self) -> String {
        format!("gce-{}-{}-{}", self.project, self.zone, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineType {
    pub name: String,
    pub zone: String,
    pub vcpus: u32,
    pub memory_mib: u64,
    pub shared_cpu_flag: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkAllocation {
    pub project_id: String,
    pub internal_counter: u32,
    pub external_counter: u32,
    pub allocated_internal: Vec<String>,
    pub allocated_external: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirewallDirection {
    Ingress,
    Egress,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirewallAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallProtocolRule {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub project_id: String,
    pub direction: FirewallDirection,
    pub priority: u32,
    pub action: FirewallAction,
    pub rules: Vec<FirewallProtocolRule>,
    #[serde(default)]
    pub source_ranges: Vec<String>,
    #[serde(default)]
    pub destination_ranges: Vec<String>,
    #[serde(default)]
    pub target_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl FirewallRule {
    pub fn key(project_id: &str, name: &str) -> String {
        format!("{project_id}\u{0}{name}")
    }

    /// Rule<->instance matching, for tests only -- never enforced (spec.md §4.3).
    pub fn matches_tags(&self, instance_tags: &[String]) -> bool {
        self.target_tags.is_empty()
            || self.target_tags.iter().any(|t| instance_tags.contains(t))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub name: String,
    pub project_id: String,
    pub auto_create_subnetworks: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub project_id: String,
    pub region: String,
    pub network: String,
    pub ip_cidr_range: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub project_id: String,
    pub network: String,
    pub dest_range: String,
    pub next_hop: String,
    pub priority: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterRecord {
    pub name: String,
    pub project_id: String,
    pub region: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAddress {
    pub name: String,
    pub project_id: String,
    pub region: Option<String>,
    pub address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub email: String,
    pub project_id: String,
    pub unique_id: String,
    pub display_name: String,
    pub description: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub id: String,
    pub service_account_email: String,
    pub algorithm: String,
    pub private_key_material: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub resource_name: String,
    pub etag: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationScope {
    Global,
    Regional(String),
    Zonal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub operation_type: String,
    pub target_link: String,
    pub status: OperationStatus,
    pub progress: u8,
    pub scope: OperationScope,
    pub project: String,
    pub insert_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    #[serde(rename = "OBJECT_FINALIZE")]
    ObjectFinalize,
    #[serde(rename = "OBJECT_DELETE")]
    ObjectDelete,
    #[serde(rename = "OBJECT_METADATA_UPDATE")]
    ObjectMetadataUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub bucket: String,
    pub object_name: String,
    pub event_type: EventType,
    pub generation: i64,
    pub metadata: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}
