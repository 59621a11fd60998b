//! Long-running-operation registry (spec.md §4.5). Every mutating
//! compute/VPC API returns an Operation; since every mutation in this core
//! completes synchronously within the request, the operation is created,
//! marked `DONE`, persisted, and returned in the same response.

use crate::ids;
use crate::kv::{Operation, OperationScope, OperationStatus, Store};
use crate::respond;
use serde::Serialize;

/// Creates and persists an already-`DONE` operation for a mutation that
/// completed synchronously, wrapping spec.md §4.5's "operation is created,
/// marked DONE, persisted, and returned in the same response" in one call.
pub fn record_done(
    store: &Store,
    project: &str,
    operation_type: &str,
    target_link: &str,
    scope: OperationScope,
    error: Option<String>,
) -> Operation {
    let now = chrono::Utc::now();
    let status = OperationStatus::Done;
    let op = Operation {
        id: ids::new_operation_id(),
        name: ids::new_operation_id(),
        operation_type: operation_type.to_string(),
        target_link: target_link.to_string(),
        status,
        progress: 100,
        scope,
        project: project.to_string(),
        insert_time: now,
        start_time: Some(now),
        end_time: Some(now),
        error,
    };
    store.operations.insert(op.id.clone(), op.clone());
    op
}

pub fn get(store: &Store, project: &str, name: &str) -> Option<Operation> {
    store
        .operations
        .iter()
        .find(|op| op.project == project && op.name == name)
        .map(|op| op.clone())
}

pub fn list(store: &Store, project: &str, scope: &OperationScope) -> Vec<Operation> {
    store
        .operations
        .iter()
        .filter(|op| op.project == project && &op.scope == scope)
        .map(|op| op.clone())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub kind: &'static str,
    pub id: String,
    pub name: String,
    #[serde(rename = "operationType")]
    pub operation_type: String,
    #[serde(rename = "targetLink")]
    pub target_link: String,
    pub status: &'static str,
    pub progress: u8,
    #[serde(rename = "insertTime")]
    pub insert_time: String,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    #[serde(rename = "selfLink")]
    pub self_link: String,
}

#[derive(Debug, Serialize)]
pub struct OperationError {
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Serialize)]
pub struct OperationErrorItem {
    pub message: String,
}

pub fn to_response(base_url: &str, op: &Operation) -> OperationResponse {
    let (zone, region) = match &op.scope {
        OperationScope::Global => (None, None),
        OperationScope::Zonal(z) => (Some(z.clone()), None),
        OperationScope::Regional(r) => (None, Some(r.clone())),
    };
    let scope_path = match &op.scope {
        OperationScope::Global => "global".to_string(),
        OperationScope::Zonal(z) => format!("zones/{z}"),
        OperationScope::Regional(r) => format!("regions/{r}"),
    };
    OperationResponse {
        kind: "compute#operation",
        id: op.id.clone(),
        name: op.name.clone(),
        operation_type: op.operation_type.clone(),
        target_link: op.target_link.clone(),
        status: status_str(op.status),
        progress: op.progress,
        insert_time: respond::format_timestamp(op.insert_time),
        start_time: op.start_time.map(respond::format_timestamp),
        end_time: op.end_time.map(respond::format_timestamp),
        zone,
        region,
        error: op.error.as_ref().map(|e| OperationError {
            errors: vec![OperationErrorItem { message: e.clone() }],
        }),
        self_link: respond::self_link(
            base_url,
            &format!("compute/v1/projects/{}/{scope_path}/operations/{}", op.project, op.name),
        ),
    }
}

fn status_str(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "PENDING",
        OperationStatus::Running => "RUNNING",
        OperationStatus::Done => "DONE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_operation_is_immediately_retrievable_by_scope() {
        let store = Store::new();
        let op = record_done(
            &store,
            "p1",
            "insert",
            "https://.../instances/vm1",
            OperationScope::Zonal("us-central1-a".to_string()),
            None,
        );
        let fetched = get(&store, "p1", &op.name).unwrap();
        assert_eq!(fetched.status, OperationStatus::Done);
        assert_eq!(fetched.progress, 100);

        let listed = list(&store, "p1", &OperationScope::Zonal("us-central1-a".to_string()));
        assert_eq!(listed.len(), 1);
    }
}
