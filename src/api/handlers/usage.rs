use crate::{telemetry::TelemetrySnapshot, AppState};
use axum::{extract::State, Json};

/// Per-model call, retry and token counters since startup.
#[utoipa::path(
    get,
    path = "/api/usage",
    responses(
        (status = 200, description = "Usage snapshot", body = TelemetrySnapshot)
    ),
    tag = "usage"
)]
pub async fn get_usage(State(state): State<AppState>) -> Json<TelemetrySnapshot> {
    Json(state.telemetry.snapshot())
}
