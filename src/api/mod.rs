//! HTTP API
//!
//! Routes are grouped per concern and nested under `/api`:
//! - `/api/update`: version, upstream check and the self-update pipeline
//! - `/api/dryer`: drying process control and history
//! - `/api/presets`: drying presets
//! - `/api/stats`: dryer counters and host telemetry

mod completion;
mod dryer;
mod presets;
mod stats;
mod update;

use crate::dryer::DryerControl;
use crate::presets::PresetStore;
use crate::system::RebootScheduler;
use crate::update::UpdateGate;
use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub updates: UpdateGate,
    pub reboots: RebootScheduler,
    pub dryer: Arc<dyn DryerControl>,
    pub presets: PresetStore,
}

/// Error response rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail.to_string())
    }

    pub fn internal(detail: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the full router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/update", update::routes())
        .nest("/api/dryer", dryer::routes())
        .nest("/api/presets", presets::routes())
        .route("/api/stats", get(stats::get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until the listener fails
pub async fn serve(listen: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("API listening on http://{}", listen);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::command::CommandSpec;
    use crate::dryer::SimulatedDryer;
    use crate::system::{DeviceReboot, HardwareCapability};
    use crate::update::{GitOracle, StageCommand, StageCommands, UpdateOrchestrator};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    /// App wired to a scripted runner; one runner serves git, the stage
    /// commands and the reboot
    pub struct TestApp {
        pub router: Router,
        pub runner: Arc<ScriptedRunner>,
        pub dryer: Arc<SimulatedDryer>,
        _dir: tempfile::TempDir,
    }

    impl TestApp {
        pub fn new(runner: ScriptedRunner) -> Self {
            let runner = Arc::new(runner);
            let timeout = Duration::from_secs(300);
            let stages = StageCommands {
                deps: vec![StageCommand::new(CommandSpec::new("cargo", ["fetch"]), "")],
                build: vec![StageCommand::new(CommandSpec::new("cargo", ["build"]), "")],
            };
            let orchestrator = UpdateOrchestrator::new(
                "/opt/dryer",
                Arc::new(GitOracle::new(runner.clone(), timeout)),
                runner.clone(),
                stages,
                timeout,
            );
            let reboot = DeviceReboot::new(
                HardwareCapability::forced(true),
                runner.clone(),
                CommandSpec::new("sudo", ["reboot"]),
                Duration::from_secs(30),
            );

            let dir = tempfile::tempdir().unwrap();
            let dryer = Arc::new(SimulatedDryer::new(50.0, 0.0));
            let state = Arc::new(AppState {
                updates: UpdateGate::new(orchestrator),
                reboots: RebootScheduler::new(Arc::new(reboot), Duration::from_secs(3)),
                dryer: dryer.clone(),
                presets: PresetStore::new(dir.path().join("presets.json")),
            });

            Self {
                router: router(state),
                runner,
                dryer,
                _dir: dir,
            }
        }

        /// Send a request and return status plus the body parsed as JSON
        pub async fn call(
            &self,
            method: &str,
            uri: &str,
            body: Option<serde_json::Value>,
        ) -> (StatusCode, serde_json::Value) {
            let request = match body {
                Some(json) => Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestApp;
    use super::*;
    use crate::command::testing::ScriptedRunner;

    #[test]
    fn test_api_error_body() {
        let response = ApiError::internal("fatal: not a git repository").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new(ScriptedRunner::new());
        let (status, _) = app.call("GET", "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
