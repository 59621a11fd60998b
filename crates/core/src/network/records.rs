//! Networks, subnets, routes, routers, and external (reserved) addresses —
//! metadata records mirroring the provider's shapes, not enforced in any
//! packet plane (spec.md §4.3).

use crate::error::ApiError;
use crate::kv::{ExternalAddress, NetworkRecord, RouterRecord, Route, Store, Subnet};
use crate::respond::{self, ListEnvelope};
use crate::validation;
use serde::Serialize;

pub fn create_network(store: &Store, project_id: &str, name: &str, auto_create_subnetworks: bool) -> Result<NetworkRecord, ApiError> {
    validation::validate_resource_name(name)?;
    let key = format!("{project_id}\u{0}{name}");
    let _txn = store.row_locks.begin([key.clone()]);
    if store.networks.contains_key(&key) {
        return Err(ApiError::Conflict(format!("network '{name}' already exists in project '{project_id}'")));
    }
    let record = NetworkRecord {
        name: name.to_string(),
        project_id: project_id.to_string(),
        auto_create_subnetworks,
        created_at: chrono::Utc::now(),
    };
    store.networks.insert(key, record.clone());
    Ok(record)
}

pub fn get_network(store: &Store, project_id: &str, name: &str) -> Result<NetworkRecord, ApiError> {
    store
        .networks
        .get(&format!("{project_id}\u{0}{name}"))
        .map(|n| n.clone())
        .ok_or_else(|| ApiError::NotFound(format!("network '{name}' not found")))
}

pub fn list_networks(store: &Store, project_id: &str) -> ListEnvelope<serde_json::Value> {
    let items = store
        .networks
        .iter()
        .filter(|n| n.project_id == project_id)
        .map(|n| serde_json::json!({"kind": "compute#network", "name": n.name, "autoCreateSubnetworks": n.auto_create_subnetworks}))
        .collect();
    ListEnvelope::new("compute#networkList", items)
}

pub fn delete_network(store: &Store, project_id: &str, name: &str) -> Result<(), ApiError> {
    store
        .networks
        .remove(&format!("{project_id}\u{0}{name}"))
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("network '{name}' not found")))
}

/// Creates a subnet with a CIDR range restricted to `/8..29` (spec.md §4.3,
/// distinct from the firewall validator's wider `/0..32` range).
pub fn create_subnet(
    store: &Store,
    project_id: &str,
    region: &str,
    network: &str,
    name: &str,
    ip_cidr_range: &str,
) -> Result<Subnet, ApiError> {
    validation::validate_resource_name(name)?;
    validation::validate_subnet_cidr(ip_cidr_range)?;
    let key = format!("{project_id}\u{0}{region}\u{0}{name}");
    let _txn = store.row_locks.begin([key.clone()]);
    if store.subnets.contains_key(&key) {
        return Err(ApiError::Conflict(format!("subnet '{name}' already exists in region '{region}'")));
    }
    let record = Subnet {
        name: name.to_string(),
        project_id: project_id.to_string(),
        region: region.to_string(),
        network: network.to_string(),
        ip_cidr_range: ip_cidr_range.to_string(),
        created_at: chrono::Utc::now(),
    };
    store.subnets.insert(key, record.clone());
    Ok(record)
}

pub fn list_subnets(store: &Store, project_id: &str, region: &str) -> ListEnvelope<serde_json::Value> {
    let items = store
        .subnets
        .iter()
        .filter(|s| s.project_id == project_id && s.region == region)
        .map(|s| serde_json::json!({"kind": "compute#subnetwork", "name": s.name, "network": s.network, "ipCidrRange": s.ip_cidr_range}))
        .collect();
    ListEnvelope::new("compute#subnetworkList", items)
}

pub fn create_route(
    store: &Store,
    project_id: &str,
    name: &str,
    network: &str,
    dest_range: &str,
    next_hop: &str,
    priority: u32,
) -> Result<Route, ApiError> {
    validation::validate_resource_name(name)?;
    let key = format!("{project_id}\u{0}{name}");
    let _txn = store.row_locks.begin([key.clone()]);
    if store.routes.contains_key(&key) {
        return Err(ApiError::Conflict(format!("route '{name}' already exists")));
    }
    let record = Route {
        name: name.to_string(),
        project_id: project_id.to_string(),
        network: network.to_string(),
        dest_range: dest_range.to_string(),
        next_hop: next_hop.to_string(),
        priority,
        created_at: chrono::Utc::now(),
    };
    store.routes.insert(key, record.clone());
    Ok(record)
}

pub fn list_routes(store: &Store, project_id: &str) -> ListEnvelope<serde_json::Value> {
    let items = store
        .routes
        .iter()
        .filter(|r| r.project_id == project_id)
        .map(|r| serde_json::json!({"kind": "compute#route", "name": r.name, "destRange": r.dest_range, "nextHopIp": r.next_hop}))
        .collect();
    ListEnvelope::new("compute#routeList", items)
}

pub fn create_router(store: &Store, project_id: &str, region: &str, name: &str, network: &str) -> Result<RouterRecord, ApiError> {
    validation::validate_resource_name(name)?;
    let key = format!("{project_id}\u{0}{region}\u{0}{name}");
    let _txn = store.row_locks.begin([key.clone()]);
    if store.routers.contains_key(&key) {
        return Err(ApiError::Conflict(format!("router '{name}' already exists in region '{region}'")));
    }
    let record = RouterRecord {
        name: name.to_string(),
        project_id: project_id.to_string(),
        region: region.to_string(),
        network: network.to_string(),
        created_at: chrono::Utc::now(),
    };
    store.routers.insert(key, record.clone());
    Ok(record)
}

pub fn list_routers(store: &Store, project_id: &str, region: &str) -> ListEnvelope<serde_json::Value> {
    let items = store
        .routers
        .iter()
        .filter(|r| r.project_id == project_id && r.region == region)
        .map(|r| serde_json::json!({"kind": "compute#router", "name": r.name, "network": r.network}))
        .collect();
    ListEnvelope::new("compute#routerList", items)
}

/// Reserves a static external address from the project's allocator (spec.md
/// §4.3 "External IPs"), recording it as an `ExternalAddress` row distinct
/// from an instance's ephemeral `accessConfigs[].natIP`.
pub fn reserve_address(
    store: &Store,
    project_id: &str,
    region: Option<&str>,
    name: &str,
) -> Result<ExternalAddress, ApiError> {
    validation::validate_resource_name(name)?;
    let key = format!("{project_id}\u{0}{name}");
    let _txn = store.row_locks.begin([key.clone(), format!("network-alloc\u{0}{project_id}")]);
    if store.external_addresses.contains_key(&key) {
        return Err(ApiError::Conflict(format!("address '{name}' already exists")));
    }
    let address = super::allocator::allocate_external(store, project_id)?;
    let record = ExternalAddress {
        name: name.to_string(),
        project_id: project_id.to_string(),
        region: region.map(str::to_string),
        address,
        status: "RESERVED".to_string(),
        created_at: chrono::Utc::now(),
    };
    store.external_addresses.insert(key, record.clone());
    Ok(record)
}

pub fn list_addresses(store: &Store, project_id: &str) -> ListEnvelope<serde_json::Value> {
    let items = store
        .external_addresses
        .iter()
        .filter(|a| a.project_id == project_id)
        .map(|a| serde_json::json!({"kind": "compute#address", "name": a.name, "address": a.address, "status": a.status}))
        .collect();
    ListEnvelope::new("compute#addressList", items)
}

#[derive(Serialize)]
pub struct SelfLinked {
    pub self_link: String,
}

pub fn network_self_link(base_url: &str, project_id: &str, name: &str) -> String {
    respond::self_link(base_url, &format!("compute/v1/projects/{project_id}/global/networks/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_name_must_be_unique_per_project() {
        let store = Store::new();
        create_network(&store, "p1", "default", true).unwrap();
        assert!(matches!(create_network(&store, "p1", "default", true), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn subnet_cidr_out_of_range_is_rejected() {
        let store = Store::new();
        let err = create_subnet(&store, "p1", "us-central1", "default", "sub1", "10.0.0.0/30");
        assert!(matches!(err, Err(ApiError::Invalid(_))));
    }

    #[test]
    fn reserved_address_comes_from_the_external_pool() {
        let store = Store::new();
        let addr = reserve_address(&store, "p1", Some("us-central1"), "my-ip").unwrap();
        assert_eq!(addr.address, "203.0.113.10");
    }
}
