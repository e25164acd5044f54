//! API Routes
//!
//! HTTP endpoints exposed to the frontend:
//! - `/api/research` - Agentic protein research
//! - `/api/docking` - Ligand docking
//! - `/api/structure` - Predicted structure retrieval
//! - `/api/health` - Health checks
//!
//! Handlers never surface pipeline degradation as HTTP errors; a degraded
//! run still returns 200 with `degraded: true` and its reasons. Only invalid
//! input maps to a 4xx status.

pub mod docking;
pub mod health;
pub mod research;
pub mod structure;

use axum::Router;
use tracing::info;

use crate::middleware::cors::apply_cors;
use crate::models::AppState;

/// Create the main application router. All routes are prefixed with `/api/`.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(research::router(state.clone()))
        .merge(docking::router(state.clone()))
        .merge(structure::router(state.clone()))
        .merge(health::router(state));

    apply_cors(api_router)
}
