/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use serde::{Deserialize, Serialize, Serializer};

/// Bytes in one mebibyte; nvidia-smi reports memory in MiB
pub const MIB: u64 = 1024 * 1024;

/// IP version of a listening socket
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum IpVersion {
    IPv4,
    IPv6,
}

/// State of a reported socket. Only listening sockets are collected.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SocketStatus {
    #[serde(rename = "LISTENING")]
    Listening,
}

/// Owner attribution of a socket (process name or user)
///
/// `PermissionDenied` means the tool was asked for process information but
/// withheld it for this row; `NotReported` means the tool was run in a mode
/// that never reports process information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Resolved(String),
    PermissionDenied,
    NotReported,
}

impl Attribution {
    // Bracketed so no process or user name can collide with a sentinel
    pub const PERMISSION_DENIED: &'static str = "[permission denied]";
    pub const NOT_REPORTED: &'static str = "[not reported]";

    /// The value if it was resolved
    pub fn resolved(&self) -> Option<&str> {
        match self {
            Attribution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Attribution::Resolved(value) => value,
            Attribution::PermissionDenied => Self::PERMISSION_DENIED,
            Attribution::NotReported => Self::NOT_REPORTED,
        }
    }
}

impl Serialize for Attribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single listening socket observed in one collection cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    /// Protocol column as reported (tcp, tcp6, udp, ...)
    pub protocol: String,
    /// Local host:port
    pub local_address: String,
    /// Peer host:port, or "-" when the socket has no peer
    pub remote_address: String,
    pub status: SocketStatus,
    pub pid: Option<u32>,
    pub process_name: Attribution,
    /// Resident memory of the owning process
    pub memory_usage_bytes: Option<u64>,
    pub ip_version: IpVersion,
    pub user: Attribution,
}

impl PortRecord {
    /// Numeric port from the trailing segment of the local address, 0 if unparsable
    pub fn port(&self) -> u16 {
        self.local_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }
}

/// Resident memory and owner of a process, keyed by pid during enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub resident_memory_bytes: u64,
    pub user: String,
}

/// A GPU as reported by the device query or the bus listing fallback
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
    pub memory_used_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,
    pub memory_used_mib: Option<u64>,
    pub memory_total_mib: Option<u64>,
    pub gpu_utilization_percent: Option<u32>,
    pub temperature_celsius: Option<i32>,
    pub power_draw_watts: Option<f64>,
    /// round(used / total * 100)
    pub memory_utilization_percent: Option<u32>,
    /// Set when the record comes from the bus listing and carries no metrics
    pub degraded: bool,
}

impl GpuDevice {
    /// Device known only from a bus listing line
    pub fn listed(index: u32, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            memory_used_bytes: None,
            memory_total_bytes: None,
            memory_used_mib: None,
            memory_total_mib: None,
            gpu_utilization_percent: None,
            temperature_celsius: None,
            power_draw_watts: None,
            memory_utilization_percent: None,
            degraded: true,
        }
    }
}

/// A compute process resident on a GPU
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpuProcess {
    /// Opaque device identity; always reported even when the index join misses
    pub gpu_uuid: String,
    pub gpu_index: Option<u32>,
    pub pid: u32,
    pub process_name: String,
    pub used_memory_bytes: Option<u64>,
    pub used_memory_mib: Option<u64>,
    pub user: Option<String>,
    /// Full, untruncated command line
    pub command_line: Option<String>,
}

/// A model directory large enough to be listed
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    /// Human-readable size
    pub size: String,
}

/// Size of the model directory and free space on its disk
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_bytes: u64,
    pub total: String,
    pub free_bytes: Option<u64>,
    pub free: String,
    pub device: String,
    pub dir: String,
}

/// Result of probing the preferred and fallback tools for one collection path
///
/// Computed once per collection cycle and then dispatched over.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The preferred tool ran; carries its stdout
    Full(String),
    /// Only the fallback tool ran; carries its stdout
    Degraded(String),
    /// Neither ran; carries one reason per attempted tool
    Unavailable(Vec<String>),
}

/// Which socket listing variant produced the output being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortListingMode {
    /// Listing includes a pid/program column
    Full,
    /// Listing has socket columns only
    Degraded,
}

/// Service configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Directory whose subdirectories are listed as models
    pub model_dir: String,
    /// Block device whose free space is reported
    pub disk_device: String,
    /// Models smaller than this are not listed
    pub min_model_size_bytes: u64,
    /// Freshness window of the port snapshot cache
    pub port_cache_ttl_ms: u64,
    /// Timeout applied to every external command
    pub command_timeout_secs: u64,
    /// Enable verbose logging
    pub verbose: bool,
    /// Allow cross-origin requests from anywhere
    pub cors_allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            model_dir: "/publicdata/model".to_string(),
            disk_device: "/dev/nvme1n1p1".to_string(),
            min_model_size_bytes: 10 * MIB,
            port_cache_ttl_ms: 5000,
            command_timeout_secs: 30,
            verbose: false,
            cors_allow_any_origin: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(local: &str) -> PortRecord {
        PortRecord {
            protocol: "tcp".to_string(),
            local_address: local.to_string(),
            remote_address: "-".to_string(),
            status: SocketStatus::Listening,
            pid: None,
            process_name: Attribution::NotReported,
            memory_usage_bytes: None,
            ip_version: IpVersion::IPv4,
            user: Attribution::NotReported,
        }
    }

    #[test]
    fn test_port_from_local_address() {
        assert_eq!(record("0.0.0.0:8080").port(), 8080);
        assert_eq!(record(":::22").port(), 22);
        assert_eq!(record("0.0.0.0:*").port(), 0);
    }

    #[test]
    fn test_port_record_json_shape() {
        let mut rec = record("127.0.0.1:5432");
        rec.pid = Some(4821);
        rec.process_name = Attribution::Resolved("postgres".to_string());
        rec.user = Attribution::PermissionDenied;

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["localAddress"], "127.0.0.1:5432");
        assert_eq!(json["status"], "LISTENING");
        assert_eq!(json["ipVersion"], "IPv4");
        assert_eq!(json["processName"], "postgres");
        assert_eq!(json["user"], Attribution::PERMISSION_DENIED);
        assert!(json["memoryUsageBytes"].is_null());
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(
            Attribution::PermissionDenied.as_str(),
            Attribution::NotReported.as_str()
        );
        assert_eq!(Attribution::PermissionDenied.resolved(), None);
    }

    #[test]
    fn test_sentinels_differ_from_resolved_names() {
        let unknown_user = Attribution::Resolved("unknown".to_string());
        let unknown_user = serde_json::to_value(&unknown_user).unwrap();
        let not_reported = serde_json::to_value(Attribution::NotReported).unwrap();
        let denied = serde_json::to_value(Attribution::PermissionDenied).unwrap();

        assert_eq!(not_reported, "[not reported]");
        assert_eq!(denied, "[permission denied]");
        assert_ne!(unknown_user, not_reported);
    }

    #[test]
    fn test_server_config_partial_toml() {
        let config: ServerConfig = toml::from_str("model_dir = \"/srv/models\"").unwrap();
        assert_eq!(config.model_dir, "/srv/models");
        assert_eq!(config.port_cache_ttl_ms, 5000);
        assert_eq!(config.listen_addr, "0.0.0.0:3001");
    }
}
