use axum::{Json, extract::State};
use serde::Serialize;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Serialize)]
pub struct HealthData {
    status: String,
    database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            "unavailable"
        }
    };

    let data = HealthData {
        status: "ok".to_string(),
        database: database.to_string(),
    };

    Json(ApiResponse::success(
        "Health check",
        data,
        Some(Meta::empty()),
    ))
}
