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

//! Process table parsing functions

use crate::domain::ProcessInfo;
use std::collections::HashMap;

/// Parse batched `ps -o pid=,rss=,user= -p <pid,pid,...>` output
///
/// RSS is reported in KiB and converted to bytes. Rows that do not parse to a
/// (pid, rss, user) triple are skipped individually.
///
/// # Returns
/// Mapping of pid to process info.
pub fn parse_ps_batch_output(output: &str) -> HashMap<u32, ProcessInfo> {
    let mut processes = HashMap::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let (Ok(pid), Ok(rss_kib)) = (parts[0].parse::<u32>(), parts[1].parse::<u64>()) else {
            continue;
        };

        processes.insert(
            pid,
            ProcessInfo {
                pid,
                resident_memory_bytes: rss_kib.saturating_mul(1024),
                user: parts[2].to_string(),
            },
        );
    }

    processes
}

/// Parse the output of a single-column `ps -o <field>= -p <pid>` lookup
///
/// Returns `None` for empty output. The value is kept whole, so command
/// lines are never truncated at whitespace.
pub fn parse_ps_single_field(output: &str) -> Option<String> {
    let value = output.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Comma-joined pid list accepted by `ps -p`
pub fn format_pid_list<'a>(pids: impl IntoIterator<Item = &'a u32>) -> String {
    pids.into_iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
