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

//! HTTP API adapter
//!
//! Every endpoint is a GET returning JSON. Failures are `500` with
//! `{"error": ..., "suggestion": ...}`; `suggestion` is omitted when there is
//! no remediation hint.

use crate::domain::{GpuDevice, GpuProcess, ModelEntry, PortRecord, StorageStats, TelemetryError};
use crate::ports::TelemetryService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<dyn TelemetryService>,
}

/// Build the API router
///
/// # Arguments
/// * `state` - Handler state
/// * `allow_any_origin` - Attach a permissive CORS layer
pub fn router(state: AppState, allow_any_origin: bool) -> Router {
    let router = Router::new()
        .route("/api/models", get(models))
        .route("/api/stats", get(stats))
        .route("/api/ports", get(ports))
        .route("/api/gpu", get(gpus))
        .route("/api/gpu/processes", get(gpu_processes))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
}

/// A telemetry failure rendered as a JSON 500 response
#[derive(Debug)]
pub struct ApiError(TelemetryError);

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::warn!("request failed: {}", self.0);
        let body = ErrorBody {
            error: self.0.to_string(),
            suggestion: self.0.suggestion(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn models(State(state): State<AppState>) -> Result<Json<Vec<ModelEntry>>, ApiError> {
    Ok(Json(state.telemetry.models().await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StorageStats>, ApiError> {
    Ok(Json(state.telemetry.storage_stats().await?))
}

/// Serve the port snapshot; repeated polls inside the cache window share it.
async fn ports(State(state): State<AppState>) -> Result<Json<Arc<Vec<PortRecord>>>, ApiError> {
    Ok(Json(state.telemetry.ports().await?))
}

async fn gpus(State(state): State<AppState>) -> Result<Json<Vec<GpuDevice>>, ApiError> {
    Ok(Json(state.telemetry.gpus().await?))
}

async fn gpu_processes(State(state): State<AppState>) -> Result<Json<Vec<GpuProcess>>, ApiError> {
    Ok(Json(state.telemetry.gpu_processes().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SystemError;
    use async_trait::async_trait;

    struct StubTelemetry;

    #[async_trait]
    impl TelemetryService for StubTelemetry {
        async fn ports(&self) -> Result<Arc<Vec<PortRecord>>, TelemetryError> {
            Err(TelemetryError::Ports(SystemError::ToolsUnavailable(vec![
                "netstat unavailable: failed to execute".to_string(),
            ])))
        }

        async fn gpus(&self) -> Result<Vec<GpuDevice>, TelemetryError> {
            Ok(vec![GpuDevice::listed(0, "01:00.0 3D controller: NVIDIA")])
        }

        async fn gpu_processes(&self) -> Result<Vec<GpuProcess>, TelemetryError> {
            Ok(Vec::new())
        }

        async fn models(&self) -> Result<Vec<ModelEntry>, TelemetryError> {
            Err(TelemetryError::Models(SystemError::Io(
                "/publicdata/model: No such file or directory".to_string(),
            )))
        }

        async fn storage_stats(&self) -> Result<StorageStats, TelemetryError> {
            Ok(StorageStats {
                total_bytes: 1024,
                total: "1.0KB".to_string(),
                free_bytes: None,
                free: "unknown".to_string(),
                device: "/dev/nvme1n1p1".to_string(),
                dir: "/publicdata/model".to_string(),
            })
        }
    }

    fn state() -> AppState {
        AppState {
            telemetry: Arc::new(StubTelemetry),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_includes_suggestion() {
        let response = ports(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("unable to list listening ports"));
        assert!(body["suggestion"].is_string());
    }

    #[tokio::test]
    async fn test_error_without_suggestion_omits_field() {
        let response = models(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body.get("suggestion").is_none());
    }

    #[tokio::test]
    async fn test_success_bodies() {
        let response = gpus(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["degraded"], true);
        assert!(body[0]["memoryTotalBytes"].is_null());

        let body = body_json(stats(State(state())).await.into_response()).await;
        assert_eq!(body["freeBytes"], serde_json::Value::Null);
        assert_eq!(body["dir"], "/publicdata/model");

        let body = body_json(gpu_processes(State(state())).await.into_response()).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state(), true);
        let _ = router(state(), false);
    }
}
