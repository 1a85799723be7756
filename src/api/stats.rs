//! `/api/stats` - dryer counters and host telemetry

use super::{ApiError, ApiResult, AppState};
use crate::stats::{collect_system, DryerStats, StatsReport};
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsReport>> {
    let hours = state.dryer.operating_hours().await;
    let running = state.dryer.is_running().await;

    let system = tokio::task::spawn_blocking(collect_system)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(StatsReport {
        dryer: DryerStats::new(hours, running),
        system,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use crate::command::testing::ScriptedRunner;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_stats_shape() {
        let app = TestApp::new(ScriptedRunner::new());

        let (status, body) = app.call("GET", "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dryer"]["status"], false);
        assert_eq!(body["dryer"]["filter_hours"], 0.0);
        assert!(body["system"].get("uptime_seconds").is_some());
        assert!(body["system"].get("cpu_temp_c").is_some());
    }
}
