use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};

use crate::models::{AppState, ResearchApiRequest, ResearchApiResponse, ResearchOptions};
use crate::types::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/research", post(start_research))
        .route("/api/research/{protein_id}", get(research_by_id))
        .with_state(state)
}

async fn start_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchApiRequest>,
) -> Result<ResponseJson<ResearchApiResponse>, axum::http::StatusCode> {
    info!(query = %request.query, "Received research request");

    let options = ResearchOptions {
        include_novel: request.include_novel.unwrap_or(true),
        months_recent: request.months_recent.unwrap_or(6),
        model_preference: request.model,
    };

    run_and_respond(&state, &request.query, options).await
}

async fn research_by_id(
    State(state): State<AppState>,
    Path(protein_id): Path<String>,
) -> Result<ResponseJson<ResearchApiResponse>, axum::http::StatusCode> {
    info!(protein_id = %protein_id, "Received research request by id");
    run_and_respond(&state, &protein_id, ResearchOptions::default()).await
}

async fn run_and_respond(
    state: &AppState,
    query: &str,
    options: ResearchOptions,
) -> Result<ResponseJson<ResearchApiResponse>, axum::http::StatusCode> {
    let result = state.pipeline.run(query, options).await.map_err(|e| match e {
        AppError::InvalidRequest(message) => {
            warn!(error = %message, "Rejecting research request");
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        }
        other => {
            warn!(error = %other, "Research run failed");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    // The run counter lives in the service layer; the pipeline stays
    // stateless across calls.
    let run_count = state.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let interval = state.config.pipeline.retrain_interval;
    let retrain_due = interval > 0 && run_count % interval == 0;
    if retrain_due {
        info!(run_count, "Retraining threshold reached");
    }

    Ok(Json(ResearchApiResponse {
        result,
        run_count,
        retrain_due,
    }))
}
