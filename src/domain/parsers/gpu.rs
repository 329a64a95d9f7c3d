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

//! GPU information parsing functions

use super::common::{mib_to_bytes, parse_field, split_csv_row};
use crate::domain::{GpuDevice, GpuProcess};
use std::collections::HashMap;

/// Parse nvidia-smi device metrics CSV output
///
/// Expected format from command:
/// `nvidia-smi --query-gpu=index,name,memory.used,memory.total,utilization.gpu,temperature.gpu,power.draw --format=csv,noheader,nounits`
///
/// Rows with fewer than seven fields, or without a numeric index, are
/// dropped. Memory is reported in MiB and kept in both MiB and bytes; if
/// either figure is missing both are left empty.
///
/// # Arguments
///
/// * `output` - CSV output from nvidia-smi
///
/// # Returns
///
/// List of GPU devices.
pub fn parse_gpu_metrics_output(output: &str) -> Vec<GpuDevice> {
    output.lines().filter_map(parse_gpu_metrics_row).collect()
}

fn parse_gpu_metrics_row(line: &str) -> Option<GpuDevice> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parts = split_csv_row(line);
    if parts.len() < 7 {
        return None;
    }

    let index: u32 = parse_field(parts[0])?;

    let (memory_used_mib, memory_total_mib) =
        match (parse_field::<u64>(parts[2]), parse_field::<u64>(parts[3])) {
            (Some(used), Some(total)) => (Some(used), Some(total)),
            _ => (None, None),
        };

    Some(GpuDevice {
        index,
        name: parts[1].to_string(),
        memory_used_bytes: memory_used_mib.map(mib_to_bytes),
        memory_total_bytes: memory_total_mib.map(mib_to_bytes),
        memory_used_mib,
        memory_total_mib,
        gpu_utilization_percent: parse_field(parts[4]),
        temperature_celsius: parse_field(parts[5]),
        power_draw_watts: parse_field(parts[6]),
        memory_utilization_percent: memory_utilization(memory_used_mib, memory_total_mib),
        degraded: false,
    })
}

/// round(used / total * 100); `None` when either input is missing or total is zero
pub fn memory_utilization(used: Option<u64>, total: Option<u64>) -> Option<u32> {
    match (used, total) {
        (Some(used), Some(total)) if total > 0 => {
            Some((used as f64 / total as f64 * 100.0).round() as u32)
        }
        _ => None,
    }
}

/// Parse lspci output into degraded GPU records
///
/// Expected command: `lspci`
///
/// Only display controllers (VGA compatible or 3D controller lines) are
/// kept. Each becomes a record named after the whole line, numbered in
/// listing order, with every metric empty.
pub fn parse_lspci_gpu_output(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| is_display_controller(line))
        .enumerate()
        .map(|(index, line)| GpuDevice::listed(index as u32, line))
        .collect()
}

fn is_display_controller(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("vga") || line_lower.contains("3d controller")
}

/// Parse `nvidia-smi --query-gpu=index,uuid --format=csv,noheader,nounits`
///
/// # Returns
///
/// Mapping of GPU UUID to device index. Unparsable rows are skipped.
pub fn parse_gpu_uuid_map(output: &str) -> HashMap<String, u32> {
    let mut map = HashMap::new();

    for line in output.lines() {
        let parts = split_csv_row(line);
        if parts.len() < 2 || parts[1].is_empty() {
            continue;
        }
        if let Some(index) = parse_field::<u32>(parts[0]) {
            map.insert(parts[1].to_string(), index);
        }
    }

    map
}

/// Parse compute-process CSV output
///
/// Expected format from command:
/// `nvidia-smi --query-compute-apps=gpu_uuid,pid,process_name,used_memory --format=csv,noheader,nounits`
///
/// The device index is joined through `uuid_map`; a miss leaves
/// `gpu_index` empty but keeps the record. User and command line are left
/// empty for the caller to resolve.
pub fn parse_compute_apps_output(
    output: &str,
    uuid_map: &HashMap<String, u32>,
) -> Vec<GpuProcess> {
    let mut processes = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts = split_csv_row(line);
        if parts.len() < 4 {
            continue;
        }

        let Some(pid) = parse_field::<u32>(parts[1]) else {
            continue;
        };

        let gpu_uuid = parts[0].to_string();
        let used_memory_mib: Option<u64> = parse_field(parts[3]);

        processes.push(GpuProcess {
            gpu_index: uuid_map.get(&gpu_uuid).copied(),
            gpu_uuid,
            pid,
            process_name: parts[2].to_string(),
            used_memory_bytes: used_memory_mib.map(mib_to_bytes),
            used_memory_mib,
            user: None,
            command_line: None,
        });
    }

    processes
}
