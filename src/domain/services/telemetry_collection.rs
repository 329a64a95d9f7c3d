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

use crate::domain::{
    GpuDevice, GpuProcess, ModelEntry, PortRecord, SnapshotCache, StorageStats, SystemError,
    TelemetryError,
};
use crate::ports::{ConfigurationProvider, TelemetryProvider, TelemetryService};
use async_trait::async_trait;
use std::sync::Arc;

/// Domain service that implements telemetry collection
///
/// Ports go through a single-slot snapshot cache so that polling clients do
/// not respawn netstat and ps on every request. GPU devices and processes
/// are collected fresh on every call.
pub struct TelemetryCollectionService {
    /// Platform-specific telemetry provider
    provider: Arc<dyn TelemetryProvider>,
    /// Configuration provider
    config_provider: Arc<dyn ConfigurationProvider>,
    port_cache: SnapshotCache<Vec<PortRecord>>,
}

impl TelemetryCollectionService {
    /// Create a new telemetry collection service
    ///
    /// # Arguments
    /// * `provider` - Platform-specific telemetry provider
    /// * `config_provider` - Configuration provider; also sets the port cache window
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        config_provider: Arc<dyn ConfigurationProvider>,
    ) -> Self {
        let port_cache = SnapshotCache::new(config_provider.port_cache_ttl());
        Self {
            provider,
            config_provider,
            port_cache,
        }
    }
}

#[async_trait]
impl TelemetryService for TelemetryCollectionService {
    async fn ports(&self) -> Result<Arc<Vec<PortRecord>>, TelemetryError> {
        self.port_cache
            .get_or_refresh(move || async move {
                let ports = self.provider.get_listening_ports().await?;
                log::debug!("collected {} listening ports", ports.len());
                Ok::<_, SystemError>(ports)
            })
            .await
            .map_err(TelemetryError::Ports)
    }

    async fn gpus(&self) -> Result<Vec<GpuDevice>, TelemetryError> {
        self.provider
            .get_gpu_devices()
            .await
            .map_err(TelemetryError::Gpu)
    }

    async fn gpu_processes(&self) -> Result<Vec<GpuProcess>, TelemetryError> {
        self.provider
            .get_gpu_processes()
            .await
            .map_err(TelemetryError::GpuProcesses)
    }

    async fn models(&self) -> Result<Vec<ModelEntry>, TelemetryError> {
        self.provider
            .get_models(
                self.config_provider.model_dir(),
                self.config_provider.min_model_size_bytes(),
            )
            .await
            .map_err(TelemetryError::Models)
    }

    async fn storage_stats(&self) -> Result<StorageStats, TelemetryError> {
        self.provider
            .get_storage_stats(
                self.config_provider.model_dir(),
                self.config_provider.disk_device(),
            )
            .await
            .map_err(TelemetryError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SimpleConfigurationProvider;
    use crate::domain::{Attribution, IpVersion, ServerConfig, SocketStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingProvider {
        port_calls: AtomicUsize,
        gpu_calls: AtomicUsize,
        fail_ports: Mutex<bool>,
        seen_model_args: Mutex<Option<(String, u64)>>,
    }

    #[async_trait]
    impl TelemetryProvider for CountingProvider {
        async fn get_listening_ports(&self) -> Result<Vec<PortRecord>, SystemError> {
            let call = self.port_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_ports.lock().unwrap() {
                return Err(SystemError::ToolsUnavailable(vec!["netstat: missing".into()]));
            }
            Ok(vec![PortRecord {
                protocol: "tcp".to_string(),
                local_address: format!("0.0.0.0:{}", 8000 + call),
                remote_address: "-".to_string(),
                status: SocketStatus::Listening,
                pid: Some(42),
                process_name: Attribution::Resolved("python3".to_string()),
                memory_usage_bytes: Some(1024),
                ip_version: IpVersion::IPv4,
                user: Attribution::Resolved("alice".to_string()),
            }])
        }

        async fn get_gpu_devices(&self) -> Result<Vec<GpuDevice>, SystemError> {
            self.gpu_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![GpuDevice::listed(0, "VGA compatible controller")])
        }

        async fn get_gpu_processes(&self) -> Result<Vec<GpuProcess>, SystemError> {
            Err(SystemError::NotFound("pmon only".to_string()))
        }

        async fn get_models(
            &self,
            dir: &str,
            min_size_bytes: u64,
        ) -> Result<Vec<ModelEntry>, SystemError> {
            *self.seen_model_args.lock().unwrap() = Some((dir.to_string(), min_size_bytes));
            Ok(Vec::new())
        }

        async fn get_storage_stats(
            &self,
            _dir: &str,
            _device: &str,
        ) -> Result<StorageStats, SystemError> {
            Err(SystemError::Io("du failed".to_string()))
        }
    }

    fn service(
        provider: Arc<CountingProvider>,
        ttl_ms: u64,
    ) -> TelemetryCollectionService {
        let config = ServerConfig {
            port_cache_ttl_ms: ttl_ms,
            model_dir: "/srv/models".to_string(),
            ..Default::default()
        };
        TelemetryCollectionService::new(
            provider,
            Arc::new(SimpleConfigurationProvider::new(config)),
        )
    }

    #[tokio::test]
    async fn test_ports_within_window_are_byte_identical() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), 60_000);

        let first = serde_json::to_string(&*service.ports().await.unwrap()).unwrap();
        let second = serde_json::to_string(&*service.ports().await.unwrap()).unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.port_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ports_recollected_after_window() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), 0);

        service.ports().await.unwrap();
        service.ports().await.unwrap();

        assert_eq!(provider.port_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_port_failure_is_surfaced() {
        let provider = Arc::new(CountingProvider::default());
        *provider.fail_ports.lock().unwrap() = true;
        let service = service(provider.clone(), 60_000);

        let err = service.ports().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Ports(_)));
        assert!(err.suggestion().is_some());

        // Failures are not cached
        service.ports().await.unwrap_err();
        assert_eq!(provider.port_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gpus_are_not_cached() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), 60_000);

        service.gpus().await.unwrap();
        service.gpus().await.unwrap();

        assert_eq!(provider.gpu_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_models_use_configured_directory() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider.clone(), 0);

        service.models().await.unwrap();

        let seen = provider.seen_model_args.lock().unwrap().clone();
        assert_eq!(seen, Some(("/srv/models".to_string(), 10 * 1024 * 1024)));
    }

    #[tokio::test]
    async fn test_error_variants_per_endpoint() {
        let provider = Arc::new(CountingProvider::default());
        let service = service(provider, 0);

        assert!(matches!(
            service.gpu_processes().await.unwrap_err(),
            TelemetryError::GpuProcesses(SystemError::NotFound(_))
        ));
        assert!(matches!(
            service.storage_stats().await.unwrap_err(),
            TelemetryError::Storage(_)
        ));
    }
}
