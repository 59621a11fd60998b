//! Per-project IP allocation (spec.md §4.3 "Internal IPs"/"External IPs").
//!
//! Internal addresses are drawn from `10.0.0.0/16`, counter starting at 1;
//! external from `203.0.113.0/24` (TEST-NET-3), counter starting at 10.
//! Both counters are read-modify-written under the project's row lock so
//! two concurrent creates never produce the same address; no address is
//! ever reused even after release (spec.md §3 NetworkAllocation invariant).

use crate::error::ApiError;
use crate::kv::{NetworkAllocation, Store};

const INTERNAL_BASE_OCTET: u8 = 10;
const EXTERNAL_BASE_OCTETS: (u8, u8, u8) = (203, 0, 113);

fn internal_address(counter: u32) -> String {
    let b = (counter / 65536) % 256;
    let c = (counter / 256) % 256;
    let d = counter % 256;
    format!("{INTERNAL_BASE_OCTET}.{b}.{c}.{d}")
}

/// Advances past `.0` and `.255` of each `/24` — a counter value whose low
/// byte lands on either is skipped forward to the next usable address.
fn next_usable_internal_counter(mut counter: u32) -> u32 {
    loop {
        let low = counter % 256;
        if low != 0 && low != 255 {
            return counter;
        }
        counter += 1;
    }
}

fn ensure_allocation<'a>(store: &'a Store, project_id: &str) -> dashmap::mapref::one::RefMut<'a, String, NetworkAllocation> {
    store.network_allocations.entry(project_id.to_string()).or_insert_with(|| NetworkAllocation {
        project_id: project_id.to_string(),
        internal_counter: 1,
        external_counter: 10,
        allocated_internal: vec![],
        allocated_external: vec![],
    })
}

/// Allocates the next internal IP for `project_id`. Caller must hold the
/// project's row lock (spec.md §5 "IP allocation serializes through a
/// per-project lock held during the transaction").
pub fn allocate_internal(store: &Store, project_id: &str) -> Result<String, ApiError> {
    let mut alloc = ensure_allocation(store, project_id);
    let counter = next_usable_internal_counter(alloc.internal_counter);
    let address = internal_address(counter);
    alloc.internal_counter = counter + 1;
    alloc.allocated_internal.push(address.clone());
    Ok(address)
}

/// Allocates the next external IP for `project_id`. Errors when the `/24`
/// (`203.0.113.1..=203.0.113.254`) is exhausted (spec.md §4.3).
pub fn allocate_external(store: &Store, project_id: &str) -> Result<String, ApiError> {
    let mut alloc = ensure_allocation(store, project_id);
    if alloc.external_counter > 254 {
        return Err(ApiError::Internal(format!(
            "external IP pool exhausted for project '{project_id}'"
        )));
    }
    let (a, b, c) = EXTERNAL_BASE_OCTETS;
    let address = format!("{a}.{b}.{c}.{}", alloc.external_counter);
    alloc.external_counter += 1;
    alloc.allocated_external.push(address.clone());
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_addresses_are_monotonic_and_never_reused() {
        let store = Store::new();
        let a = allocate_internal(&store, "p1").unwrap();
        let b = allocate_internal(&store, "p1").unwrap();
        assert_eq!(a, "10.0.0.1");
        assert_eq!(b, "10.0.0.2");

        let alloc = store.network_allocations.get("p1").unwrap();
        assert_eq!(alloc.allocated_internal, vec![a, b]);
    }

    #[test]
    fn internal_allocation_skips_network_and_broadcast_octets() {
        let store = Store::new();
        {
            let mut alloc = store.network_allocations.entry("p1".to_string()).or_insert_with(|| NetworkAllocation {
                project_id: "p1".to_string(),
                internal_counter: 254,
                external_counter: 10,
                allocated_internal: vec![],
                allocated_external: vec![],
            });
            alloc.internal_counter = 254;
        }
        let addr = allocate_internal(&store, "p1").unwrap();
        assert_eq!(addr, "10.0.0.254");
        let addr2 = allocate_internal(&store, "p1").unwrap();
        // 255 (.255 of the /24) and 256 (.0 of the next /24) are both
        // skipped; the next usable counter is 257 -> 10.0.1.1.
        assert_eq!(addr2, "10.0.1.1");
    }

    #[test]
    fn external_addresses_start_at_dot_ten() {
        let store = Store::new();
        let a = allocate_external(&store, "p1").unwrap();
        assert_eq!(a, "203.0.113.10");
    }

    #[test]
    fn external_pool_exhaustion_errors() {
        let store = Store::new();
        {
            let mut alloc = store.network_allocations.entry("p1".to_string()).or_insert_with(|| NetworkAllocation {
                project_id: "p1".to_string(),
                internal_counter: 1,
                external_counter: 255,
                allocated_internal: vec![],
                allocated_external: vec![],
            });
            alloc.external_counter = 255;
        }
        assert!(allocate_external(&store, "p1").is_err());
    }

    #[test]
    fn concurrent_allocation_under_same_project_lock_yields_distinct_ips() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new());
        let mut handles = vec![];
        for _ in 0..16 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                let _txn = store.row_locks.begin(["network-alloc\u{0}p1".to_string()]);
                allocate_internal(&store, "p1").unwrap()
            }));
        }
        let mut addrs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 16);
    }
}
