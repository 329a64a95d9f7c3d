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

//! Listening-socket table parsing functions

use crate::domain::{
    Attribution, IpVersion, PortListingMode, PortRecord, ProcessInfo, SocketStatus,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

lazy_static! {
    static ref PID_PROGRAM_RE: Regex = Regex::new(r"^(\d+)/(.+)$").unwrap();
}

/// Sentinel written in place of a peer address when the socket has none
pub const NO_PEER: &str = "-";

/// Minimum whitespace-separated fields of a socket row
const MIN_FIELDS: usize = 6;

/// Parse `netstat -tuln` / `netstat -tulnp` output into listening-port records
///
/// Expected row shape:
/// `tcp  0  0 0.0.0.0:22  0.0.0.0:*  LISTEN  812/sshd`
///
/// Header and malformed rows (fewer than six fields) are skipped, as are
/// sockets in any state other than listening. Records are sorted by the
/// numeric local port. Memory and user are left unresolved; see
/// [`apply_process_info`].
///
/// # Arguments
/// * `output` - Raw netstat output
/// * `mode` - Whether the output carries the PID/Program name column
pub fn parse_netstat_output(output: &str, mode: PortListingMode) -> Vec<PortRecord> {
    let mut records: Vec<PortRecord> = output
        .lines()
        .filter_map(|line| parse_socket_row(line, mode))
        .collect();

    records.sort_by_key(PortRecord::port);
    records
}

fn parse_socket_row(line: &str, mode: PortListingMode) -> Option<PortRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < MIN_FIELDS || !is_listening(parts[5]) {
        return None;
    }

    let local_address = parts[3].to_string();

    let (pid, process_name, user) = match mode {
        PortListingMode::Degraded => (None, Attribution::NotReported, Attribution::NotReported),
        PortListingMode::Full => {
            // Program names may contain spaces, e.g. "1021/nginx: master"
            let composite = parts[6..].join(" ");
            match parse_pid_program(&composite) {
                Some((pid, program)) => (
                    Some(pid),
                    Attribution::Resolved(program),
                    Attribution::PermissionDenied,
                ),
                None => (
                    None,
                    Attribution::PermissionDenied,
                    Attribution::PermissionDenied,
                ),
            }
        }
    };

    Some(PortRecord {
        protocol: parts[0].to_string(),
        ip_version: infer_ip_version(&local_address),
        local_address,
        remote_address: normalize_remote_address(parts[4]),
        status: SocketStatus::Listening,
        pid,
        process_name,
        memory_usage_bytes: None,
        user,
    })
}

fn is_listening(state: &str) -> bool {
    state == "LISTEN" || state == "LISTENING"
}

/// Split a `<digits>/<program>` composite field
pub fn parse_pid_program(field: &str) -> Option<(u32, String)> {
    let captures = PID_PROGRAM_RE.captures(field.trim())?;
    let pid = captures[1].parse().ok()?;
    Some((pid, captures[2].to_string()))
}

/// Guess the IP version from the textual local address
///
/// netstat has no explicit family column, so a `::` compression or a
/// bracketed literal is taken to mean IPv6. Uncompressed IPv6 literals are
/// misclassified as IPv4.
pub fn infer_ip_version(local_address: &str) -> IpVersion {
    if local_address.contains("::") || local_address.starts_with('[') {
        IpVersion::IPv6
    } else {
        IpVersion::IPv4
    }
}

/// Replace a wildcard peer (`0.0.0.0:*`, `:::*`, `[::]:*`) with [`NO_PEER`]
pub fn normalize_remote_address(remote: &str) -> String {
    let host = match remote.rfind(':') {
        Some(pos) => &remote[..pos],
        None => remote,
    };

    match host {
        "0.0.0.0" | "::" | "[::]" | "*" => NO_PEER.to_string(),
        _ => remote.to_string(),
    }
}

/// Distinct PIDs referenced by a record set
pub fn collect_pids(records: &[PortRecord]) -> BTreeSet<u32> {
    records.iter().filter_map(|r| r.pid).collect()
}

/// Join records against the batch process lookup
///
/// Records whose pid is missing from `processes` keep their unresolved
/// memory and user fields.
pub fn apply_process_info(records: &mut [PortRecord], processes: &HashMap<u32, ProcessInfo>) {
    for record in records.iter_mut() {
        let Some(info) = record.pid.and_then(|pid| processes.get(&pid)) else {
            continue;
        };
        record.memory_usage_bytes = Some(info.resident_memory_bytes);
        record.user = Attribution::Resolved(info.user.clone());
    }
}
