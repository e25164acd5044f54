use axum::{extract::State, response::Json as ResponseJson, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ResponseJson<HealthResponse> {
    let mut providers = state.pipeline.capabilities();
    providers.insert("docking".to_string(), state.docking.is_available());
    providers.insert(
        "structure-fetch".to_string(),
        state.structure.is_available(),
    );

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        providers,
    })
}
