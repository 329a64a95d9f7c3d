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

//! Host Telemetry Library
//!
//! Collects point-in-time snapshots of listening ports, GPU devices and
//! GPU-resident processes on a single host by running the usual inspection
//! tools (netstat, ps, nvidia-smi, lspci, du, df) and parsing their text
//! output. The results are served as JSON over a small polling HTTP API.
//! The design is Ports and Adapters (Hexagonal).
//!
//! # Architecture
//!
//! - **Domain**: Entities, pure parsers, the snapshot cache and the collection service
//! - **Ports**: Interfaces for external interactions
//! - **Adapters**: The Linux tool runner and the HTTP API
//!
//! # Usage
//!
//! ```rust,no_run
//! use host_telemetry::{ServerConfig, ServiceContainer, TelemetryService};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let container = ServiceContainer::new(ServerConfig::default());
//!     let service = container.create_telemetry_service()?;
//!
//!     for port in service.ports().await?.iter() {
//!         println!("{} {}", port.local_address, port.process_name.as_str());
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapters::{router, AppState, LinuxTelemetryProvider, UnixCommandExecutor};
pub use container::{
    load_server_config, validate_server_config, ServerConfigBuilder, ServiceContainer,
    SimpleConfigurationProvider,
};
pub use domain::{
    Attribution, ConfigError, GpuDevice, GpuProcess, IpVersion, ModelEntry, PortRecord,
    ServerConfig, SnapshotCache, StorageStats, TelemetryError,
};
pub use ports::{CommandExecutor, ConfigurationProvider, TelemetryProvider, TelemetryService};
