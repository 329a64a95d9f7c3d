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

use crate::domain::{GpuDevice, GpuProcess, ModelEntry, PortRecord, StorageStats, SystemError};
use async_trait::async_trait;

/// Secondary port - Host telemetry provider
///
/// This interface abstracts platform-specific telemetry collection. Every
/// call is one complete collection cycle: records returned together come from
/// the same set of tool invocations.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Collect listening sockets, enriched with owning-process memory and user
    ///
    /// # Returns
    /// * `Ok(Vec<PortRecord>)` - Records sorted by local port
    /// * `Err(SystemError)` - Neither socket listing variant could run
    async fn get_listening_ports(&self) -> Result<Vec<PortRecord>, SystemError>;

    /// Collect GPU devices with metrics, or a degraded bus listing
    ///
    /// # Returns
    /// * `Ok(Vec<GpuDevice>)` - Devices in index order
    /// * `Err(SystemError)` - Neither the metrics query nor the listing could run
    async fn get_gpu_devices(&self) -> Result<Vec<GpuDevice>, SystemError>;

    /// Collect compute processes resident on GPUs
    ///
    /// # Returns
    /// * `Ok(Vec<GpuProcess>)` - One record per process row
    /// * `Err(SystemError)` - The process query is unsupported or unavailable
    async fn get_gpu_processes(&self) -> Result<Vec<GpuProcess>, SystemError>;

    /// List model directories under `dir` that are at least `min_size_bytes`
    async fn get_models(&self, dir: &str, min_size_bytes: u64)
        -> Result<Vec<ModelEntry>, SystemError>;

    /// Size of `dir` and free space of `device`
    async fn get_storage_stats(&self, dir: &str, device: &str)
        -> Result<StorageStats, SystemError>;
}
