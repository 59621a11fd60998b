//! The in-process store standing in for the assumed external "transactional
//! KV with secondary indices" (spec.md §1). Each table is a `DashMap`;
//! multi-row mutations go through [`super::txn::RowLocks`].

use super::model::*;
use super::txn::RowLocks;
use dashmap::DashMap;

pub struct Store {
    pub row_locks: RowLocks,

    pub projects: DashMap<String, Project>,

    /// Keyed by an internal surrogate id, never surfaced (spec.md §4.8).
    pub buckets: DashMap<String, Bucket>,
    /// `"<project_id>\0<name>"` -> bucket id. Bucket names are unique per
    /// project but reusable across projects (spec.md §3), so there is no
    /// global name -> id index.
    pub bucket_index: DashMap<String, String>,

    /// `ObjectRow::key(bucket_id, name)` -> the current latest, non-deleted
    /// row, if one exists.
    pub objects: DashMap<String, ObjectRow>,
    /// Same key -> every version ever written, ordered by generation.
    pub object_versions: DashMap<String, Vec<ObjectVersion>>,
    /// Same key -> highest generation ever allocated. Tracked separately
    /// from `object_versions` so a generation number is never reused even
    /// after its version row is hard-deleted (spec.md §3 ObjectVersion
    /// invariant, §8 property 2).
    pub object_generation_counters: DashMap<String, i64>,

    pub resumable_sessions: DashMap<String, ResumableSession>,

    /// `Instance::key(project, zone, name)` -> row.
    pub instances: DashMap<String, Instance>,
    /// `"<zone>\0<name>"` -> catalogue entry.
    pub machine_types: DashMap<String, MachineType>,

    /// Keyed by `project_id`.
    pub network_allocations: DashMap<String, NetworkAllocation>,
    /// `FirewallRule::key(project_id, name)` -> row.
    pub firewall_rules: DashMap<String, FirewallRule>,

    pub networks: DashMap<String, NetworkRecord>,
    pub subnets: DashMap<String, Subnet>,
    pub routes: DashMap<String, Route>,
    pub routers: DashMap<String, RouterRecord>,
    pub external_addresses: DashMap<String, ExternalAddress>,

    /// Keyed by email.
    pub service_accounts: DashMap<String, ServiceAccount>,
    /// Keyed by key id.
    pub service_account_keys: DashMap<String, ServiceAccountKey>,
    /// Keyed by resource name.
    pub policies: DashMap<String, Policy>,

    /// Keyed by operation id.
    pub operations: DashMap<String, Operation>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            row_locks: RowLocks::new(),
            projects: DashMap::new(),
            buckets: DashMap::new(),
            bucket_index: DashMap::new(),
            objects: DashMap::new(),
            object_versions: DashMap::new(),
            object_generation_counters: DashMap::new(),
            resumable_sessions: DashMap::new(),
            instances: DashMap::new(),
            machine_types: DashMap::new(),
            network_allocations: DashMap::new(),
            firewall_rules: DashMap::new(),
            networks: DashMap::new(),
            subnets: DashMap::new(),
            routes: DashMap::new(),
            routers: DashMap::new(),
            external_addresses: DashMap::new(),
            service_accounts: DashMap::new(),
            service_account_keys: DashMap::new(),
            policies: DashMap::new(),
            operations: DashMap::new(),
        }
    }

    pub fn bucket_index_key(project_id: &str, name: &str) -> String {
        format!("{project_id}\u{0}{name}")
    }

    /// Looks up a bucket by `(project, name)`. If `project` is absent, falls
    /// back to scanning for a unique match by name alone -- the only
    /// ambiguity spec.md's "(project?, name)" lookup introduces, resolved in
    /// DESIGN.md.
    pub fn find_bucket(&self, project_id: Option<&str>, name: &str) -> Option<Bucket> {
        if let Some(project_id) = project_id {
            let id = self.bucket_index.get(&Self::bucket_index_key(project_id, name))?;
            return self.buckets.get(id.as_str()).map(|b| b.clone());
        }
        let mut found = None;
        for entry in self.buckets.iter() {
            if entry.name == name {
                if found.is_some() {
                    // Ambiguous across projects; caller should have supplied one.
                    return None;
                }
                found = Some(entry.clone());
            }
        }
        found
    }

    /// Allocates the next generation number for `(bucket_id, name)`,
    /// monotonically increasing and never reused even across hard deletes
    /// of the highest existing version (spec.md §3, §8 property 2). Caller
    /// must hold the row lock for `key`.
    pub fn next_generation(&self, key: &str) -> i64 {
        let mut counter = self.object_generation_counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Ensures a project row exists (projects are implicit in spec.md --
    /// they are referenced by id everywhere but never explicitly created by
    /// an endpoint in §6's key-endpoint list).
    pub fn ensure_project(&self, project_id: &str) -> Project {
        if let Some(p) = self.projects.get(project_id) {
            return p.clone();
        }
        let project = Project {
            id: project_id.to_string(),
            numeric_id: crate::ids::stable_numeric_id(project_id),
            display_name: project_id.to_string(),
            created_at: chrono::Utc::now(),
        };
        self.projects.insert(project_id.to_string(), project.clone());
        project
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bucket(id: &str, project: &str, name: &str) -> Bucket {
        Bucket {
            id: id.to_string(),
            name: name.to_string(),
            project_id: project.to_string(),
            location: "US".to_string(),
            storage_class: "STANDARD".to_string(),
            versioning_enabled: false,
            cors_rules: vec![],
            notification_configs: vec![],
            lifecycle_rules: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn bucket_names_reused_across_projects_resolve_distinctly() {
        let store = Store::new();
        let b1 = make_bucket("id-1", "p1", "shared");
        let b2 = make_bucket("id-2", "p2", "shared");
        store.buckets.insert(b1.id.clone(), b1.clone());
        store.bucket_index.insert(Store::bucket_index_key("p1", "shared"), b1.id.clone());
        store.buckets.insert(b2.id.clone(), b2.clone());
        store.bucket_index.insert(Store::bucket_index_key("p2", "shared"), b2.id.clone());

        assert_eq!(store.find_bucket(Some("p1"), "shared").unwrap().id, "id-1");
        assert_eq!(store.find_bucket(Some("p2"), "shared").unwrap().id, "id-2");
        assert!(store.find_bucket(None, "shared").is_none());
    }

    #[test]
    fn ensure_project_is_idempotent() {
        let store = Store::new();
        let p1 = store.ensure_project("proj-a");
        let p2 = store.ensure_project("proj-a");
        assert_eq!(p1.numeric_id, p2.numeric_id);
    }
}
