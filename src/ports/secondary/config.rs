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

use crate::domain::ServerConfig;
use std::time::Duration;

/// Secondary port - Configuration provider abstraction
///
/// This interface abstracts how configuration is loaded and managed,
/// allowing for different sources (CLI args, files, environment, etc.)
pub trait ConfigurationProvider: Send + Sync {
    /// Get the full service configuration
    fn server_config(&self) -> &ServerConfig;

    /// Directory listed by the model browser
    fn model_dir(&self) -> &str {
        &self.server_config().model_dir
    }

    /// Block device whose free space is reported
    fn disk_device(&self) -> &str {
        &self.server_config().disk_device
    }

    /// Smallest model directory that is listed
    fn min_model_size_bytes(&self) -> u64 {
        self.server_config().min_model_size_bytes
    }

    /// Freshness window of the port snapshot cache
    fn port_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.server_config().port_cache_ttl_ms)
    }

    /// Timeout applied to each external command
    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.server_config().command_timeout_secs)
    }
}
