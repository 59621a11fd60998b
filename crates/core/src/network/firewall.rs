//! Firewall rule CRUD — metadata only, never enforced (spec.md §4.3).

use crate::error::ApiError;
use crate::kv::{FirewallRule, Store};
use crate::respond::{self, ListEnvelope};
use crate::validation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FirewallRuleRequest {
    pub name: String,
    pub direction: crate::kv::FirewallDirection,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_action")]
    pub action: crate::kv::FirewallAction,
    #[serde(default, alias = "allowed", alias = "denied")]
    pub rules: Vec<RuleEntryRequest>,
    #[serde(default, rename = "sourceRanges")]
    pub source_ranges: Vec<String>,
    #[serde(default, rename = "destinationRanges")]
    pub destination_ranges: Vec<String>,
    #[serde(default, rename = "targetTags")]
    pub target_tags: Vec<String>,
}

fn default_priority() -> u32 {
    1000
}
fn default_action() -> crate::kv::FirewallAction {
    crate::kv::FirewallAction::Allow
}

#[derive(Debug, Deserialize)]
pub struct RuleEntryRequest {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FirewallResponse {
    pub kind: &'static str,
    pub name: String,
    #[serde(rename = "selfLink")]
    pub self_link: String,
    pub direction: crate::kv::FirewallDirection,
    pub priority: u32,
    #[serde(rename = "sourceRanges")]
    pub source_ranges: Vec<String>,
    #[serde(rename = "destinationRanges")]
    pub destination_ranges: Vec<String>,
    #[serde(rename = "targetTags")]
    pub target_tags: Vec<String>,
    #[serde(rename = "timeCreated")]
    pub time_created: String,
}

pub fn to_response(base_url: &str, rule: &FirewallRule) -> FirewallResponse {
    FirewallResponse {
        kind: "compute#firewall",
        name: rule.name.clone(),
        self_link: respond::self_link(
            base_url,
            &format!("compute/v1/projects/{}/global/firewalls/{}", rule.project_id, rule.name),
        ),
        direction: rule.direction,
        priority: rule.priority,
        source_ranges: rule.source_ranges.clone(),
        destination_ranges: rule.destination_ranges.clone(),
        target_tags: rule.target_tags.clone(),
        time_created: respond::format_timestamp(rule.created_at),
    }
}

fn validate_protocol_rule(rule: &RuleEntryRequest) -> Result<(), ApiError> {
    const VALID: [&str; 4] = ["tcp", "udp", "icmp", "all"];
    if !VALID.contains(&rule.ip_protocol.as_str()) {
        return Err(ApiError::Invalid(format!(
            "IPProtocol '{}' must be one of tcp, udp, icmp, all",
            rule.ip_protocol
        )));
    }
    for port in &rule.ports {
        port.parse::<u32>().map_err(|_| {
            ApiError::Invalid(format!("port '{port}' is not an integer string"))
        })?;
    }
    Ok(())
}

/// Validates and creates a firewall rule. `(project_id, name)` must be
/// unique (spec.md §3 FirewallRule invariant).
pub fn create(store: &Store, project_id: &str, req: FirewallRuleRequest) -> Result<FirewallRule, ApiError> {
    validation::validate_resource_name(&req.name)?;
    if req.priority > 65535 {
        return Err(ApiError::Invalid("priority must be in [0, 65535]".to_string()));
    }
    for rule in &req.rules {
        validate_protocol_rule(rule)?;
    }
    for range in req.source_ranges.iter().chain(req.destination_ranges.iter()) {
        validation::validate_firewall_cidr(range)?;
    }

    let key = FirewallRule::key(project_id, &req.name);
    let _txn = store.row_locks.begin([key.clone()]);
    if store.firewall_rules.contains_key(&key) {
        return Err(ApiError::Conflict(format!(
            "firewall rule '{}' already exists in project '{project_id}'",
            req.name
        )));
    }

    let rule = FirewallRule {
        name: req.name,
        project_id: project_id.to_string(),
        direction: req.direction,
        priority: req.priority,
        action: req.action,
        rules: req
            .rules
            .into_iter()
            .map(|r| crate::kv::FirewallProtocolRule { ip_protocol: r.ip_protocol, ports: r.ports })
            .collect(),
        source_ranges: req.source_ranges,
        destination_ranges: req.destination_ranges,
        target_tags: req.target_tags,
        created_at: chrono::Utc::now(),
    };
    store.firewall_rules.insert(key, rule.clone());
    Ok(rule)
}

pub fn get(store: &Store, project_id: &str, name: &str) -> Result<FirewallRule, ApiError> {
    store
        .firewall_rules
        .get(&FirewallRule::key(project_id, name))
        .map(|r| r.clone())
        .ok_or_else(|| ApiError::NotFound(format!("firewall rule '{name}' not found")))
}

pub fn list(store: &Store, project_id: &str) -> ListEnvelope<serde_json::Value> {
    let items: Vec<serde_json::Value> = store
        .firewall_rules
        .iter()
        .filter(|r| r.project_id == project_id)
        .map(|r| serde_json::to_value(to_response("", &r)).unwrap())
        .collect();
    ListEnvelope::new("compute#firewallList", items)
}

pub fn delete(store: &Store, project_id: &str, name: &str) -> Result<(), ApiError> {
    let key = FirewallRule::key(project_id, name);
    store
        .firewall_rules
        .remove(&key)
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("firewall rule '{name}' not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::FirewallDirection;

    fn allow_http_request() -> FirewallRuleRequest {
        FirewallRuleRequest {
            name: "allow-http".into(),
            direction: FirewallDirection::Ingress,
            priority: default_priority(),
            action: default_action(),
            rules: vec![RuleEntryRequest { ip_protocol: "tcp".into(), ports: vec!["80".into(), "443".into()] }],
            source_ranges: vec!["0.0.0.0/0".into()],
            destination_ranges: vec![],
            target_tags: vec!["web".into()],
        }
    }

    #[test]
    fn firewall_rule_scenario_from_spec() {
        let store = Store::new();
        let rule = create(&store, "p1", allow_http_request()).unwrap();
        assert_eq!(rule.name, "allow-http");

        let fetched = get(&store, "p1", "allow-http").unwrap();
        assert_eq!(fetched.rules[0].ports, vec!["80", "443"]);

        let err = create(&store, "p1", allow_http_request());
        assert!(matches!(err, Err(ApiError::Conflict(_))));
    }

    #[test]
    fn bad_protocol_is_rejected() {
        let store = Store::new();
        let mut req = allow_http_request();
        req.rules[0].ip_protocol = "sctp".into();
        assert!(matches!(create(&store, "p1", req), Err(ApiError::Invalid(_))));
    }

    #[test]
    fn priority_out_of_range_is_rejected() {
        let store = Store::new();
        let mut req = allow_http_request();
        req.priority = 70000;
        assert!(matches!(create(&store, "p1", req), Err(ApiError::Invalid(_))));
    }
}
