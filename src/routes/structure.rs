use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::fallback::FallbackPolicy;
use crate::models::{AppState, StructureApiResponse};
use crate::providers::Capability;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/structure/{protein_id}", get(fetch_structure))
        .with_state(state)
}

async fn fetch_structure(
    State(state): State<AppState>,
    Path(protein_id): Path<String>,
) -> Result<ResponseJson<StructureApiResponse>, axum::http::StatusCode> {
    let accession = protein_id.trim().to_uppercase();
    if accession.is_empty() {
        return Err(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    info!(protein = %accession, "Received structure request");

    let fallback = FallbackPolicy::new();
    let mut reasons = Vec::new();

    let structure = if state.structure.is_available() {
        let result = state.structure.fetch_structure(&accession).await;
        match result.outcome {
            Ok(structure) => structure,
            Err(failure) => {
                reasons.push(fallback.reason_for_failure(Capability::StructureFetch, &failure));
                fallback.protein_structure(&accession)
            }
        }
    } else {
        reasons.push(fallback.reason(Capability::StructureFetch, "no structure backend configured"));
        fallback.protein_structure(&accession)
    };

    Ok(Json(StructureApiResponse {
        protein_id: structure.accession,
        source: structure.source,
        url: structure.url,
        pdb_data: structure.pdb_data,
        degraded: !reasons.is_empty(),
        reasons,
    }))
}
