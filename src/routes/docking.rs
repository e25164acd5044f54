use axum::{
    extract::State,
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::fallback::FallbackPolicy;
use crate::models::{AppState, DockingApiRequest, DockingApiResponse};
use crate::providers::{Capability, DockingRequest};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/docking", post(dock_ligand))
        .with_state(state)
}

async fn dock_ligand(
    State(state): State<AppState>,
    Json(request): Json<DockingApiRequest>,
) -> Result<ResponseJson<DockingApiResponse>, axum::http::StatusCode> {
    if request.protein_id.trim().is_empty() || request.ligand_smiles.trim().is_empty() {
        return Err(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    info!(protein = %request.protein_id, "Received docking request");

    let docking_request = DockingRequest {
        protein_id: request.protein_id.trim().to_string(),
        ligand_smiles: request.ligand_smiles.trim().to_string(),
        num_modes: request.num_modes.unwrap_or(9),
    };

    let fallback = FallbackPolicy::new();
    let mut reasons = Vec::new();

    let (tool, poses) = if state.docking.is_available() {
        let result = state.docking.dock(&docking_request).await;
        match result.outcome {
            Ok(poses) => (state.docking.tool_name().to_string(), poses),
            Err(failure) => {
                reasons.push(fallback.reason_for_failure(Capability::Docking, &failure));
                ("mock".to_string(), fallback.docking_poses(&docking_request))
            }
        }
    } else {
        reasons.push(fallback.reason(Capability::Docking, "no docking backend configured"));
        ("mock".to_string(), fallback.docking_poses(&docking_request))
    };

    Ok(Json(DockingApiResponse {
        protein_id: docking_request.protein_id,
        ligand_smiles: docking_request.ligand_smiles,
        tool,
        degraded: !reasons.is_empty(),
        reasons,
        poses,
    }))
}
