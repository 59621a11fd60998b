//! Machine-type catalogue (SPEC_FULL.md §4.2 supplement): a fixed set of
//! zones and type families seeded once at boot, never mutated afterward.

use crate::error::ApiError;
use crate::kv::{MachineType, Store};
use serde::Serialize;

const ZONES: [&str; 4] = ["us-central1-a", "us-central1-b", "us-east1-b", "europe-west1-b"];

/// `(name, vcpus, memory_mib, shared_cpu_flag)` for each seeded family.
const FAMILIES: [(&str, u32, u64, bool); 6] = [
    ("e2-micro", 2, 1024, true),
    ("e2-small", 2, 2048, true),
    ("e2-medium", 2, 4096, true),
    ("n2-standard-2", 2, 8192, false),
    ("n2-standard-4", 4, 16384, false),
    ("n2-standard-8", 8, 32768, false),
];

/// Seeds every `(zone, family)` pair into the store. Idempotent: re-running
/// at boot after a restart just overwrites identical rows.
pub fn seed_catalogue(store: &Store) {
    for zone in ZONES {
        for (name, vcpus, memory_mib, shared_cpu_flag) in FAMILIES {
            store.machine_types.insert(
                format!("{zone}\u{0}{name}"),
                MachineType { name: name.to_string(), zone: zone.to_string(), vcpus, memory_mib, shared_cpu_flag },
            );
        }
    }
}

/// Accepts either the short name (`e2-medium`) or a fully-qualified path
/// (`.../zones/us-central1-a/machineTypes/e2-medium`) and extracts the
/// short name (spec.md §4.2 "Validating a machine-type string...").
pub fn short_name(raw: &str) -> &str {
    raw.rsplit('/').next().unwrap_or(raw)
}

pub fn get(store: &Store, zone: &str, machine_type: &str) -> Result<MachineType, ApiError> {
    let name = short_name(machine_type);
    store
        .machine_types
        .get(&format!("{zone}\u{0}{name}"))
        .map(|m| m.clone())
        .ok_or_else(|| ApiError::NotFound(format!("machine type '{name}' not found in zone '{zone}'")))
}

#[derive(Debug, Serialize)]
pub struct MachineTypeResponse {
    pub kind: &'static str,
    pub name: String,
    pub zone: String,
    #[serde(rename = "guestCpus")]
    pub guest_cpus: u32,
    #[serde(rename = "memoryMb")]
    pub memory_mb: u64,
    #[serde(rename = "isSharedCpu")]
    pub is_shared_cpu: bool,
}

pub fn to_response(m: &MachineType) -> MachineTypeResponse {
    MachineTypeResponse {
        kind: "compute#machineType",
        name: m.name.clone(),
        zone: m.zone.clone(),
        guest_cpus: m.vcpus,
        memory_mb: m.memory_mib,
        is_shared_cpu: m.shared_cpu_flag,
    }
}

pub fn list(store: &Store, zone: &str) -> Vec<MachineTypeResponse> {
    store
        .machine_types
        .iter()
        .filter(|m| m.zone == zone)
        .map(|m| to_response(&m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_covers_every_zone_and_family() {
        let store = Store::new();
        seed_catalogue(&store);
        assert_eq!(store.machine_types.len(), ZONES.len() * FAMILIES.len());
        let m = get(&store, "us-central1-a", "e2-medium").unwrap();
        assert_eq!(m.vcpus, 2);
        assert_eq!(m.memory_mib, 4096);
    }

    #[test]
    fn fully_qualified_path_resolves_to_short_name() {
        let store = Store::new();
        seed_catalogue(&store);
        let path = "https://compute.googleapis.com/compute/v1/projects/p1/zones/us-central1-a/machineTypes/n2-standard-4";
        let m = get(&store, "us-central1-a", path).unwrap();
        assert_eq!(m.name, "n2-standard-4");
    }

    #[test]
    fn unknown_machine_type_is_not_found() {
        let store = Store::new();
        seed_catalogue(&store);
        assert!(get(&store, "us-central1-a", "bogus-type").is_err());
    }
}
