// Protein Architect - expressibility-aware protein design backend

pub mod config;
pub mod fallback;
pub mod middleware;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod routes;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
