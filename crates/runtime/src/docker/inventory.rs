use bollard::models::{ContainerSummary, ContainerInspectResponse};
use chrono::DateTime;

/// Port mapping information
#[derive(Debug, Clone, serde::Serialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: String,
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
}

/// Detailed container state information from docker inspect
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerStateInfo {
    pub oom_killed: bool,
    pub pid: i64,
    pub exit_code: i32,
    pub started_at: String,
    pub finished_at: String,
    pub restart_count: i32,
}

/// Basic container information derived from Docker's list/inspect APIs.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: std::collections::HashMap<String, String>,
    pub created_at: i64,
    pub ports: Vec<PortMapping>,
    /// IP address on the container's primary network, if connected.
    /// Used to keep an instance's internal IP in sync with what the
    /// backing container actually has.
    pub ip_address: Option<String>,
    pub state_info: Option<ContainerStateInfo>,
}

impl From<ContainerSummary> for ContainerInfo {
    fn from(s: ContainerSummary) -> Self {
        let ports = s.ports
            .unwrap_or_default()
            .into_iter()
            .map(|p| {
                let protocol = p.typ
                    .map(|t| t.to_string().to_lowercase())
                    .unwrap_or_else(|| "tcp".to_string());

                PortMapping {
                    container_port: p.private_port,
                    protocol,
                    host_ip: if p.public_port.is_some() { p.ip } else { None },
                    host_port: p.public_port,
                }
            })
            .collect();

        let ip_address = s.network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .and_then(|nets| nets.values().next())
            .and_then(|n| n.ip_address.clone())
            .filter(|ip| !ip.is_empty());

        Self {
            id: s.id.unwrap_or_default(),
            name: s.names.as_deref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or("unknown")
                .to_string(),
            image: s.image.unwrap_or_default(),
            state: s.state
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into()),
            status: s.status.unwrap_or_default(),
            labels: s.labels.unwrap_or_default(),
            created_at: s.created.unwrap_or_default(),
            ports,
            ip_address,
            state_info: None, // Not available in list API
        }
    }
}

impl From<ContainerInspectResponse> for ContainerInfo {
    fn from(details: ContainerInspectResponse) -> Self {
        let created_at = details.created.as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.timestamp())
            .unwrap_or(0);

        let ports = details.network_settings
            .as_ref()
            .and_then(|ns| ns.ports.as_ref())
            .map(|port_map| {
                port_map.iter()
                    .flat_map(|(container_port_str, bindings)| {
                        let (port_num, protocol) = container_port_str
                            .split_once('/')
                            .unwrap_or((container_port_str.as_str(), "tcp"));
                        let container_port = port_num.parse::<u16>().unwrap_or(0);

                        let bindings_list = bindings.as_deref().unwrap_or(&[]);

                        if !bindings_list.is_empty() {
                            bindings_list.iter().map(|binding| {
                                let host_ip = binding.host_ip.clone();
                                let host_port = binding.host_port.as_ref()
                                    .and_then(|p| p.parse::<u16>().ok());

                                PortMapping {
                                    container_port,
                                    protocol: protocol.to_string(),
                                    host_ip,
                                    host_port,
                                }
                            }).collect::<Vec<_>>()
                        } else {
                            vec![PortMapping {
                                container_port,
                                protocol: protocol.to_string(),
                                host_ip: None,
                                host_port: None,
                            }]
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let ip_address = details.network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .and_then(|nets| nets.values().next())
            .and_then(|n| n.ip_address.clone())
            .filter(|ip| !ip.is_empty());

        let state_info = details.state.as_ref().map(|s| {
            ContainerStateInfo {
                oom_killed: s.oom_killed.unwrap_or(false),
                pid: s.pid.map(|p| p as i64).unwrap_or(0),
                exit_code: s.exit_code.map(|c| c as i32).unwrap_or(0),
                started_at: s.started_at.clone().unwrap_or_default(),
                finished_at: s.finished_at.clone().unwrap_or_default(),
                restart_count: details.restart_count.map(|c| c as i32).unwrap_or(0),
            }
        });

        Self {
            id: details.id.unwrap_or_default(),
            name: details.name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| "unknown".into()),
            image: details.image.unwrap_or_default(),
            state: details.state.as_ref()
                .and_then(|s| s.status.as_ref())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into()),
            status: details.state.as_ref()
                .and_then(|s| s.status.as_ref())
                .map(|s| format!("{:?}", s))
                .unwrap_or_default(),
            labels: details.config
                .and_then(|c| c.labels)
                .unwrap_or_default(),
            created_at,
            ports,
            ip_address,
            state_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_info_defaults_ip_address_to_none_when_unset() {
        let info = ContainerInfo {
            id: "abc".into(),
            name: "n".into(),
            image: "i".into(),
            state: "running".into(),
            status: "Up".into(),
            labels: Default::default(),
            created_at: 0,
            ports: vec![],
            ip_address: None,
            state_info: None,
        };
        assert!(info.ip_address.is_none());
    }
}
