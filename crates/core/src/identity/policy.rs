//! IAM policy storage and echo (spec.md §4.4 "Policies"): no API on this
//! core actually enforces these bindings, it is a storage and echo surface
//! only, matched by `testIamPermissions`' static role->permission table.

use crate::error::ApiError;
use crate::ids;
use crate::kv::{Binding, Policy, Store};

/// A minimal role->permission table, enough to make `testIamPermissions`
/// behave sensibly without pretending to model the real provider's full
/// permission graph.
fn role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        "roles/viewer" => &["compute.instances.get", "storage.objects.get", "storage.buckets.get"],
        "roles/editor" => &[
            "compute.instances.get",
            "compute.instances.create",
            "compute.instances.delete",
            "storage.objects.get",
            "storage.objects.create",
            "storage.objects.delete",
            "storage.buckets.get",
            "storage.buckets.create",
        ],
        "roles/owner" => &[
            "compute.instances.get",
            "compute.instances.create",
            "compute.instances.delete",
            "storage.objects.get",
            "storage.objects.create",
            "storage.objects.delete",
            "storage.buckets.get",
            "storage.buckets.create",
            "resourcemanager.projects.setIamPolicy",
        ],
        _ => &[],
    }
}

fn fresh_etag() -> String {
    ids::new_operation_id()
}

/// Returns the stored policy, or a fresh empty one with a new etag if none
/// has ever been set for `resource_name`.
pub fn get(store: &Store, resource_name: &str) -> Policy {
    store.policies.get(resource_name).map(|p| p.clone()).unwrap_or_else(|| Policy {
        resource_name: resource_name.to_string(),
        etag: fresh_etag(),
        bindings: vec![],
    })
}

/// Replaces the policy iff `incoming.etag` matches the currently stored
/// etag (or no policy has ever been stored); issues a fresh etag on
/// success. Mismatch -> `conditionNotMet` (spec.md §4.4).
pub fn set(store: &Store, resource_name: &str, incoming_etag: &str, bindings: Vec<Binding>) -> Result<Policy, ApiError> {
    let current = get(store, resource_name);
    if current.etag != incoming_etag {
        return Err(ApiError::ConditionNotMet(format!(
            "etag mismatch for policy on '{resource_name}': expected '{}', got '{incoming_etag}'",
            current.etag
        )));
    }

    let policy = Policy { resource_name: resource_name.to_string(), etag: fresh_etag(), bindings };
    store.policies.insert(resource_name.to_string(), policy.clone());
    Ok(policy)
}

/// Returns the subset of `requested` that `member` holds via any role bound
/// in the resource's policy.
pub fn test_permissions(store: &Store, resource_name: &str, member: &str, requested: &[String]) -> Vec<String> {
    let policy = get(store, resource_name);
    let granted: std::collections::HashSet<&str> = policy
        .bindings
        .iter()
        .filter(|b| b.members.iter().any(|m| m == member))
        .flat_map(|b| role_permissions(&b.role).iter().copied())
        .collect();

    requested.iter().filter(|p| granted.contains(p.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_with_no_prior_policy_returns_empty_with_fresh_etag() {
        let store = Store::new();
        let policy = get(&store, "projects/p1");
        assert!(policy.bindings.is_empty());
        assert!(!policy.etag.is_empty());
    }

    #[test]
    fn set_with_stale_etag_is_condition_not_met() {
        let store = Store::new();
        let current = get(&store, "projects/p1");
        set(&store, "projects/p1", &current.etag, vec![]).unwrap();

        let err = set(&store, "projects/p1", &current.etag, vec![]);
        assert!(matches!(err, Err(ApiError::ConditionNotMet(_))));
    }

    #[test]
    fn test_permissions_returns_intersection_via_bound_role() {
        let store = Store::new();
        let current = get(&store, "projects/p1");
        let bindings = vec![Binding { role: "roles/viewer".to_string(), members: vec!["user:alice@example.com".to_string()] }];
        set(&store, "projects/p1", &current.etag, bindings).unwrap();

        let granted = test_permissions(
            &store,
            "projects/p1",
            "user:alice@example.com",
            &["storage.objects.get".to_string(), "compute.instances.delete".to_string()],
        );
        assert_eq!(granted, vec!["storage.objects.get".to_string()]);
    }
}
