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

use crate::domain::{GpuDevice, GpuProcess, ModelEntry, PortRecord, StorageStats, TelemetryError};
use async_trait::async_trait;
use std::sync::Arc;

/// Primary port - Main interface offered by the telemetry domain
///
/// This is what external systems (the HTTP API, library consumers) use to
/// read host telemetry. Every method is idempotent and safe to retry.
#[async_trait]
pub trait TelemetryService: Send + Sync {
    /// Listening ports, served from the snapshot cache while it is fresh
    ///
    /// # Returns
    /// * `Ok(Arc<Vec<PortRecord>>)` - The snapshot; shared with the cache
    /// * `Err(TelemetryError)` - No socket listing tool could run
    async fn ports(&self) -> Result<Arc<Vec<PortRecord>>, TelemetryError>;

    /// GPU devices, collected fresh on every call
    async fn gpus(&self) -> Result<Vec<GpuDevice>, TelemetryError>;

    /// GPU compute processes, collected fresh on every call
    async fn gpu_processes(&self) -> Result<Vec<GpuProcess>, TelemetryError>;

    /// Model directories above the configured size threshold
    async fn models(&self) -> Result<Vec<ModelEntry>, TelemetryError>;

    /// Model directory size and free disk space
    async fn storage_stats(&self) -> Result<StorageStats, TelemetryError>;
}
