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

//! Linux telemetry provider

use crate::domain::{
    apply_process_info, bytes_to_human_readable, collect_pids, format_pid_list,
    parse_compute_apps_output, parse_df_available, parse_gpu_metrics_output, parse_gpu_uuid_map,
    parse_leading_bytes, parse_lspci_gpu_output, parse_netstat_output, parse_ps_batch_output,
    parse_ps_single_field, CommandError, GpuDevice, GpuProcess, ModelEntry, PortListingMode,
    PortRecord, ProbeOutcome, ProcessInfo, StorageStats, SystemError,
};
use crate::ports::{CommandExecutor, SystemCommand, TelemetryProvider};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

const GPU_METRICS_QUERY: &str =
    "--query-gpu=index,name,memory.used,memory.total,utilization.gpu,temperature.gpu,power.draw";
const GPU_UUID_QUERY: &str = "--query-gpu=index,uuid";
const COMPUTE_APPS_QUERY: &str = "--query-compute-apps=gpu_uuid,pid,process_name,used_memory";
const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

/// Linux telemetry provider using standard system commands
///
/// Tools: netstat (net-tools), ps, nvidia-smi, lspci, du, df.
pub struct LinuxTelemetryProvider {
    command_executor: Arc<dyn CommandExecutor>,
}

impl LinuxTelemetryProvider {
    /// Create a new Linux telemetry provider
    pub fn new(command_executor: Arc<dyn CommandExecutor>) -> Self {
        Self { command_executor }
    }

    /// Check which of the external tools are missing
    pub async fn check_required_commands(&self) -> Vec<String> {
        let required_commands = ["netstat", "ps", "nvidia-smi", "lspci", "du", "df"];

        let mut missing = Vec::new();
        for cmd in &required_commands {
            if !self.command_executor.is_command_available(cmd).await {
                missing.push(cmd.to_string());
            }
        }
        missing
    }

    /// Run the preferred command, falling back to the reduced one
    async fn probe(&self, preferred: SystemCommand, fallback: SystemCommand) -> ProbeOutcome {
        let preferred_err = match self.command_executor.run(&preferred).await {
            Ok(stdout) => return ProbeOutcome::Full(stdout),
            Err(e) => e,
        };
        log::warn!("{preferred} failed ({preferred_err}), falling back to {fallback}");

        match self.command_executor.run(&fallback).await {
            Ok(stdout) => ProbeOutcome::Degraded(stdout),
            Err(fallback_err) => {
                ProbeOutcome::Unavailable(vec![preferred_err.to_string(), fallback_err.to_string()])
            }
        }
    }

    async fn probe_socket_listing(&self) -> ProbeOutcome {
        self.probe(
            SystemCommand::new("netstat").args(&["-tulnp"]),
            SystemCommand::new("netstat").args(&["-tuln"]),
        )
        .await
    }

    /// Resident memory and user of every pid, in a single ps invocation
    ///
    /// A failed lookup yields an empty map; the affected records simply
    /// stay unresolved.
    async fn lookup_processes(&self, pids: &BTreeSet<u32>) -> HashMap<u32, ProcessInfo> {
        if pids.is_empty() {
            return HashMap::new();
        }

        let ps_cmd = SystemCommand::new("ps")
            .args(&["-o", "pid=,rss=,user=", "-p"])
            .arg(format_pid_list(pids));

        match self.command_executor.run(&ps_cmd).await {
            Ok(stdout) => parse_ps_batch_output(&stdout),
            Err(e) => {
                log::warn!("process lookup for {} pids failed: {e}", pids.len());
                HashMap::new()
            }
        }
    }

    /// One `ps -o <field>= -p <pid>` lookup; any failure yields `None`
    async fn lookup_process_field(&self, pid: u32, field: &str) -> Option<String> {
        let ps_cmd = SystemCommand::new("ps")
            .args(&["-o"])
            .arg(format!("{field}="))
            .args(&["-p"])
            .arg(pid.to_string());

        match self.command_executor.run(&ps_cmd).await {
            Ok(stdout) => parse_ps_single_field(&stdout),
            Err(e) => {
                log::debug!("ps {field} lookup for pid {pid} failed: {e}");
                None
            }
        }
    }

    async fn gpu_uuid_map(&self) -> HashMap<String, u32> {
        let uuid_cmd = SystemCommand::new("nvidia-smi").args(&[GPU_UUID_QUERY, CSV_FORMAT]);

        match self.command_executor.run(&uuid_cmd).await {
            Ok(stdout) => parse_gpu_uuid_map(&stdout),
            Err(e) => {
                log::warn!("GPU uuid query failed, indices will be empty: {e}");
                HashMap::new()
            }
        }
    }

    /// Size of a path in bytes via `du -sb`
    ///
    /// `du` exits 1 when part of the tree is unreadable but still prints the
    /// total of what it could read. Any printed total is accepted.
    async fn disk_usage(&self, path: &str) -> Result<u64, SystemError> {
        let du_cmd = SystemCommand::new("du").args(&["-sb", path]);
        let output = self.command_executor.execute(&du_cmd).await?;

        match parse_leading_bytes(&output.stdout) {
            Some(size) => {
                if !output.success {
                    log::debug!("partial du total for {path}: {}", output.stderr.trim());
                }
                Ok(size)
            }
            None if !output.success => Err(CommandError::unavailable(
                "du",
                format!("no total for {path}: {}", output.stderr.trim()),
            )
            .into()),
            None => Err(SystemError::Parse(format!("unexpected du output for {path}"))),
        }
    }
}

#[async_trait]
impl TelemetryProvider for LinuxTelemetryProvider {
    async fn get_listening_ports(&self) -> Result<Vec<PortRecord>, SystemError> {
        let mut records = match self.probe_socket_listing().await {
            ProbeOutcome::Full(stdout) => parse_netstat_output(&stdout, PortListingMode::Full),
            ProbeOutcome::Degraded(stdout) => {
                parse_netstat_output(&stdout, PortListingMode::Degraded)
            }
            ProbeOutcome::Unavailable(reasons) => {
                return Err(SystemError::ToolsUnavailable(reasons))
            }
        };

        let pids = collect_pids(&records);
        let processes = self.lookup_processes(&pids).await;
        apply_process_info(&mut records, &processes);

        Ok(records)
    }

    async fn get_gpu_devices(&self) -> Result<Vec<GpuDevice>, SystemError> {
        let outcome = self
            .probe(
                SystemCommand::new("nvidia-smi").args(&[GPU_METRICS_QUERY, CSV_FORMAT]),
                SystemCommand::new("lspci"),
            )
            .await;

        match outcome {
            ProbeOutcome::Full(stdout) => Ok(parse_gpu_metrics_output(&stdout)),
            ProbeOutcome::Degraded(stdout) => {
                let devices = parse_lspci_gpu_output(&stdout);
                if devices.is_empty() {
                    return Err(SystemError::NotFound(
                        "no display controllers in lspci output".to_string(),
                    ));
                }
                Ok(devices)
            }
            ProbeOutcome::Unavailable(reasons) => Err(SystemError::ToolsUnavailable(reasons)),
        }
    }

    async fn get_gpu_processes(&self) -> Result<Vec<GpuProcess>, SystemError> {
        let outcome = self
            .probe(
                SystemCommand::new("nvidia-smi").args(&[COMPUTE_APPS_QUERY, CSV_FORMAT]),
                SystemCommand::new("nvidia-smi").args(&["pmon", "-c", "1", "-s", "um"]),
            )
            .await;

        let stdout = match outcome {
            ProbeOutcome::Full(stdout) => stdout,
            ProbeOutcome::Degraded(_) => {
                return Err(SystemError::NotFound(
                    "nvidia-smi only offers pmon output, which is not a per-process query"
                        .to_string(),
                ))
            }
            ProbeOutcome::Unavailable(reasons) => {
                return Err(SystemError::ToolsUnavailable(reasons))
            }
        };

        let uuid_map = self.gpu_uuid_map().await;
        let mut processes = parse_compute_apps_output(&stdout, &uuid_map);

        // Two lookups per process, deliberately not batched
        for process in processes.iter_mut() {
            let (user, command_line) = tokio::join!(
                self.lookup_process_field(process.pid, "user"),
                self.lookup_process_field(process.pid, "cmd"),
            );
            process.user = user;
            process.command_line = command_line;
        }

        Ok(processes)
    }

    async fn get_models(
        &self,
        dir: &str,
        min_size_bytes: u64,
    ) -> Result<Vec<ModelEntry>, SystemError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SystemError::Io(format!("{dir}: {e}")))?;

        let mut models = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SystemError::Io(format!("{dir}: {e}")))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let path = Path::new(dir).join(&name).to_string_lossy().to_string();

            let size_bytes = match self.disk_usage(&path).await {
                Ok(size) => size,
                Err(e) => {
                    log::debug!("skipping {path}: {e}");
                    continue;
                }
            };
            if size_bytes < min_size_bytes {
                continue;
            }

            models.push(ModelEntry {
                name,
                path,
                size_bytes,
                size: bytes_to_human_readable(size_bytes),
            });
        }

        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    async fn get_storage_stats(&self, dir: &str, device: &str) -> Result<StorageStats, SystemError> {
        let total_bytes = self.disk_usage(dir).await?;

        let df_cmd = SystemCommand::new("df").args(&["--output=avail,source", "-B1"]);
        let free_bytes = match self.command_executor.run(&df_cmd).await {
            Ok(stdout) => parse_df_available(&stdout, device),
            Err(e) => {
                log::warn!("free space query failed: {e}");
                None
            }
        };

        Ok(StorageStats {
            total_bytes,
            total: bytes_to_human_readable(total_bytes),
            free_bytes,
            free: free_bytes.map_or_else(|| "unknown".to_string(), bytes_to_human_readable),
            device: device.to_string(),
            dir: dir.to_string(),
        })
    }
}
