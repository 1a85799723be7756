//! `/api/dryer` - drying process control

use super::{ApiError, ApiResult, AppState};
use crate::dryer::{DryerStatus, HistorySample, HistoryWindow};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/status/:status", post(set_status))
        .route("/history", get(get_history))
        .route("/setpoint/:value", post(set_setpoint))
        .route("/filter/reset", post(reset_filter))
        .route("/filter/set/:hours", post(set_filter))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    mode: &'static str,
    history: Vec<HistorySample>,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<DryerStatus> {
    Json(state.dryer.status().await)
}

async fn set_status(State(state): State<Arc<AppState>>, Path(running): Path<bool>) -> Json<Value> {
    state.dryer.set_running(running).await;
    let status = if running { "running" } else { "stopped" };
    Json(json!({ "status": status }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let window = match query.mode.as_deref() {
        Some(mode) => mode.parse::<HistoryWindow>().map_err(ApiError::bad_request)?,
        None => HistoryWindow::default(),
    };
    Ok(Json(HistoryResponse {
        mode: window.as_str(),
        history: state.dryer.history(window).await,
    }))
}

async fn set_setpoint(
    State(state): State<Arc<AppState>>,
    Path(value): Path<f64>,
) -> ApiResult<Json<Value>> {
    let setpoint = state
        .dryer
        .set_setpoint(value)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(json!({ "setpoint": setpoint })))
}

async fn reset_filter(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.dryer.reset_filter_hours().await;
    Json(json!({ "filter_hours": 0.0 }))
}

async fn set_filter(
    State(state): State<Arc<AppState>>,
    Path(hours): Path<f64>,
) -> ApiResult<Json<Value>> {
    let hours = state
        .dryer
        .set_filter_hours(hours)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(json!({ "filter_hours": hours })))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use crate::command::testing::ScriptedRunner;
    use crate::dryer::DryerControl;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_and_stop() {
        let app = TestApp::new(ScriptedRunner::new());

        let (status, body) = app.call("POST", "/api/dryer/status/true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "running" }));
        assert!(app.dryer.is_running().await);

        let (_, body) = app.call("GET", "/api/dryer/status", None).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["setpoint"], 50.0);

        let (_, body) = app.call("POST", "/api/dryer/status/false", None).await;
        assert_eq!(body, json!({ "status": "stopped" }));
        assert!(!app.dryer.is_running().await);
    }

    #[tokio::test]
    async fn test_setpoint_validation() {
        let app = TestApp::new(ScriptedRunner::new());

        let (status, body) = app.call("POST", "/api/dryer/setpoint/65", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "setpoint": 65.0 }));

        let (status, body) = app.call("POST", "/api/dryer/setpoint/90", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Temperature must be between 0 and 70°C");
    }

    #[tokio::test]
    async fn test_history_modes() {
        let app = TestApp::new(ScriptedRunner::new());

        let (status, body) = app.call("GET", "/api/dryer/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "1h");
        assert!(body["history"].is_array());

        let (_, body) = app.call("GET", "/api/dryer/history?mode=12h", None).await;
        assert_eq!(body["mode"], "12h");

        let (status, _) = app.call("GET", "/api/dryer/history?mode=1d", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_counter() {
        let app = TestApp::new(ScriptedRunner::new());

        let (_, body) = app.call("POST", "/api/dryer/filter/set/12.5", None).await;
        assert_eq!(body, json!({ "filter_hours": 12.5 }));
        assert_eq!(app.dryer.operating_hours().await.filter_hours, 12.5);

        let (_, body) = app.call("POST", "/api/dryer/filter/reset", None).await;
        assert_eq!(body, json!({ "filter_hours": 0.0 }));
        assert_eq!(app.dryer.operating_hours().await.filter_hours, 0.0);

        let (status, _) = app.call("POST", "/api/dryer/filter/set/-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
