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

//! Dependency injection container for the telemetry service

use crate::adapters::{router, AppState, LinuxTelemetryProvider, UnixCommandExecutor};
use crate::domain::{ConfigError, ServerConfig, TelemetryCollectionService};
use crate::ports::{CommandExecutor, ConfigurationProvider, TelemetryProvider, TelemetryService};
use axum::Router;
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Load a TOML config file; keys left out keep their defaults
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

/// Reject configurations the service cannot start with
pub fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "listen_addr '{}' is not a socket address",
            config.listen_addr
        )));
    }
    if config.command_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "command_timeout_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Configuration provider backed by an in-memory `ServerConfig`
pub struct SimpleConfigurationProvider {
    config: ServerConfig,
}

impl SimpleConfigurationProvider {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}

impl ConfigurationProvider for SimpleConfigurationProvider {
    fn server_config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ServerConfig,
}

impl ServiceContainer {
    /// Create a new service container with configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Create the configuration provider
    pub fn create_configuration_provider(&self) -> Arc<dyn ConfigurationProvider> {
        Arc::new(SimpleConfigurationProvider::new(self.config.clone()))
    }

    /// Create the command executor
    pub fn create_command_executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::new(UnixCommandExecutor::new(
            self.create_configuration_provider().command_timeout(),
        ))
    }

    /// Create the platform-specific telemetry provider
    pub fn create_telemetry_provider(&self) -> Result<Arc<LinuxTelemetryProvider>, Box<dyn Error>> {
        if !cfg!(target_os = "linux") {
            return Err("Unsupported operating system: netstat/ps output formats are Linux-specific".into());
        }
        Ok(Arc::new(LinuxTelemetryProvider::new(
            self.create_command_executor(),
        )))
    }

    /// Create the complete telemetry service
    pub fn create_telemetry_service(&self) -> Result<Arc<dyn TelemetryService>, Box<dyn Error>> {
        let provider: Arc<dyn TelemetryProvider> = self.create_telemetry_provider()?;
        let service =
            TelemetryCollectionService::new(provider, self.create_configuration_provider());
        Ok(Arc::new(service))
    }

    /// Create the HTTP router with a fresh service behind it
    pub fn create_router(&self) -> Result<Router, Box<dyn Error>> {
        let state = AppState {
            telemetry: self.create_telemetry_service()?,
        };
        Ok(router(state, self.config.cors_allow_any_origin))
    }

    /// List external tools that are not installed
    pub async fn validate_dependencies(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let provider = self.create_telemetry_provider()?;
        Ok(provider.check_required_commands().await)
    }
}

/// Builder pattern for service configuration
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Start from an existing configuration, e.g. one loaded from a file
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the model directory
    pub fn model_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.model_dir = dir.into();
        self
    }

    /// Set the block device whose free space is reported
    pub fn disk_device(mut self, device: impl Into<String>) -> Self {
        self.config.disk_device = device.into();
        self
    }

    /// Set the port cache window in milliseconds
    pub fn port_cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.config.port_cache_ttl_ms = ttl_ms;
        self
    }

    /// Set the per-command timeout in seconds
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.config.command_timeout_secs = secs;
        self
    }

    /// Enable verbose logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
