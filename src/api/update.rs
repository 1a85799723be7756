//! `/api/update` - version info, upstream check and the self-update pipeline

use super::completion::notify_on_complete;
use super::{ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crate::update::UpdateInProgress;
use dryer_shared::{UpdateCheck, UpdateResult, VersionInfo};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/version", get(get_version))
        .route("/check", get(check_update))
        .route("/apply", post(apply_update))
}

async fn get_version(State(state): State<Arc<AppState>>) -> ApiResult<Json<VersionInfo>> {
    state
        .updates
        .orchestrator()
        .current_version()
        .await
        .map(Json)
        .map_err(|e| {
            error!("Version query failed: {:#}", e);
            ApiError::internal(e)
        })
}

async fn check_update(State(state): State<Arc<AppState>>) -> ApiResult<Json<UpdateCheck>> {
    let update_available = state
        .updates
        .orchestrator()
        .update_available()
        .await
        .map_err(|e| {
            error!("Update check failed: {:#}", e);
            ApiError::internal(e)
        })?;
    Ok(Json(UpdateCheck { update_available }))
}

/// Runs the pipeline on its own task so a dropped connection cannot abandon
/// it. On full success the reboot is scheduled there too, gated on the
/// response body completing (or being dropped with the connection).
async fn apply_update(State(state): State<Arc<AppState>>) -> Response {
    let (sent_tx, sent_rx) = oneshot::channel();
    let run = tokio::spawn(async move {
        let result = state.updates.try_full_update().await?;
        if result.reboot_requested() {
            info!("Update applied, reboot scheduled after response");
            state.reboots.schedule_reboot(sent_rx);
        }
        Ok::<UpdateResult, UpdateInProgress>(result)
    });

    match run.await {
        Ok(Ok(result)) if result.reboot_requested() => {
            notify_on_complete(Json(result).into_response(), sent_tx)
        }
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(busy)) => ApiError::new(StatusCode::CONFLICT, busy.to_string()).into_response(),
        Err(e) => {
            error!("Update task failed: {}", e);
            ApiError::internal(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use crate::command::testing::{failure, ScriptedRunner};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    fn apply_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/update/apply")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_version() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .reply_ok("0123456789abcdef")
                .reply_ok("0123456")
                .reply_ok("main")
                .reply_ok("2026-10-01T12:00:00+02:00\nTune heater hysteresis"),
        );

        let (status, body) = app.call("GET", "/api/update/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "commit": "0123456789abcdef",
                "shortCommit": "0123456",
                "branch": "main",
                "date": "2026-10-01T12:00:00+02:00",
                "message": "Tune heater hysteresis",
            })
        );
    }

    #[tokio::test]
    async fn test_version_error_is_500_with_detail() {
        let app = TestApp::new(
            ScriptedRunner::new().reply_err(failure("git rev-parse HEAD", "fatal: not a git repository")),
        );

        let (status, body) = app.call("GET", "/api/update/version", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "fatal: not a git repository" }));
    }

    #[tokio::test]
    async fn test_check() {
        let app = TestApp::new(ScriptedRunner::new().reply_ok("").reply_ok("2"));

        let (status, body) = app.call("GET", "/api/update/check", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "updateAvailable": true }));
        assert_eq!(
            app.runner.commands(),
            vec!["git fetch --quiet", "git rev-list --count HEAD..@{u}"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_noop_never_reboots() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .reply_ok("aaa")
                .reply_ok("Already up to date.")
                .reply_ok("aaa"),
        );

        let (status, body) = app.call("POST", "/api/update/apply", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "updateApplied": false,
                "message": "Already up to date.",
                "steps": ["sync"],
            })
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(app.runner.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_reboots_after_response_and_delay() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .reply_ok("aaa")
                .reply_ok("Fast-forward")
                .reply_ok("bbb"),
        );

        let (status, body) = app.call("POST", "/api/update/apply", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "updateApplied": true,
                "message": "Update applied. Rebooting...",
                "steps": ["sync", "deps", "build"],
                "reboot": true,
            })
        );

        // Body fully read; the reboot still waits out the minimum delay
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(!app.runner.commands().contains(&"sudo reboot".to_string()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            app.runner.commands(),
            vec![
                "git rev-parse HEAD",
                "git pull --ff-only",
                "git rev-parse HEAD",
                "cargo fetch",
                "cargo build",
                "sudo reboot",
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_failure_is_200_without_reboot() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .reply_ok("aaa")
                .reply_ok("Fast-forward")
                .reply_ok("bbb")
                .reply_err(failure("cargo fetch", "error: failed to download")),
        );

        let (status, body) = app.call("POST", "/api/update/apply", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updateApplied"], false);
        assert_eq!(body["error"], true);
        assert_eq!(body["steps"], json!(["sync"]));
        assert_eq!(body["message"], "Update failed: error: failed to download");
        assert!(body.get("reboot").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_disconnect_does_not_abandon_pipeline() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .with_delay(Duration::from_millis(1500))
                .reply_ok("aaa")
                .reply_ok("Fast-forward")
                .reply_ok("bbb"),
        );

        // Client gives up while sync is still running
        let abandoned =
            tokio::time::timeout(Duration::from_millis(500), app.router.clone().oneshot(apply_request()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            app.runner.finished(),
            vec![
                "git rev-parse HEAD",
                "git pull --ff-only",
                "git rev-parse HEAD",
                "cargo fetch",
                "cargo build",
                "sudo reboot",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_while_running_is_409() {
        let app = TestApp::new(
            ScriptedRunner::new()
                .with_delay(Duration::from_millis(1500))
                .reply_ok("aaa")
                .reply_ok("Already up to date.")
                .reply_ok("aaa"),
        );

        let first = tokio::spawn(app.router.clone().oneshot(apply_request()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (status, body) = app.call("POST", "/api/update/apply", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "detail": "Update already in progress" }));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(app.runner.commands().len(), 3);
    }
}
