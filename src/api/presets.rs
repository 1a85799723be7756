//! `/api/presets` - drying preset CRUD

use super::{ApiError, ApiResult, AppState};
use crate::presets::{Preset, PresetCreate, PresetError, PresetUpdate};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_presets).post(create_preset))
        .route("/:id", put(update_preset).delete(delete_preset))
}

impl From<PresetError> for ApiError {
    fn from(err: PresetError) -> Self {
        let status = match err {
            PresetError::TemperatureOutOfRange(_) | PresetError::Builtin(_) => StatusCode::BAD_REQUEST,
            PresetError::NotFound => StatusCode::NOT_FOUND,
            PresetError::Io(_) | PresetError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

async fn list_presets(State(state): State<Arc<AppState>>) -> Json<Vec<Preset>> {
    Json(state.presets.list().await)
}

async fn create_preset(
    State(state): State<Arc<AppState>>,
    Json(new): Json<PresetCreate>,
) -> ApiResult<Json<Preset>> {
    Ok(Json(state.presets.create(new).await?))
}

async fn update_preset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<PresetUpdate>,
) -> ApiResult<Json<Preset>> {
    Ok(Json(state.presets.update(&id, changes).await?))
}

async fn delete_preset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.presets.delete(&id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}
