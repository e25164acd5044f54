//! Docking backend
//!
//! Poses come from a remote docking service when one is configured;
//! otherwise the capability reports unavailable and the route falls back to
//! the deterministic mock generator. The backend is chosen once at startup,
//! not per request.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::DockingPose;
use crate::providers::{classify_status, classify_transport, timed, DockingBackend};
use crate::types::{ProviderFailure, ProviderResult};

const PROVIDER: &str = "docking";

/// One docking invocation against a prepared receptor.
#[derive(Debug, Clone, Serialize)]
pub struct DockingRequest {
    pub protein_id: String,
    pub ligand_smiles: String,
    pub num_modes: u32,
}

#[derive(Debug, Deserialize)]
struct RemotePose {
    mode: u32,
    affinity: f64,
    #[serde(default)]
    rmsd_lb: f64,
    #[serde(default)]
    rmsd_ub: f64,
}

#[derive(Debug, Deserialize)]
struct RemoteDockingResponse {
    #[serde(default)]
    poses: Vec<RemotePose>,
}

pub struct RemoteDockingBackend {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl RemoteDockingBackend {
    pub fn new(endpoint: Option<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }

    async fn run_dock(
        &self,
        endpoint: &str,
        request: &DockingRequest,
    ) -> Result<Vec<DockingPose>, ProviderFailure> {
        debug!(protein = %request.protein_id, "Submitting docking job");

        let response = self
            .client
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body));
        }

        let parsed: RemoteDockingResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let poses = parsed
            .poses
            .into_iter()
            .map(|p| DockingPose {
                mode: p.mode,
                affinity_kcal_mol: p.affinity,
                rmsd_lower: p.rmsd_lb,
                rmsd_upper: p.rmsd_ub,
            })
            .collect();

        Ok(poses)
    }
}

#[async_trait]
impl DockingBackend for RemoteDockingBackend {
    fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    fn tool_name(&self) -> &str {
        "remote-vina"
    }

    async fn dock(&self, request: &DockingRequest) -> ProviderResult<Vec<DockingPose>> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                return ProviderResult::failure(
                    PROVIDER,
                    ProviderFailure::new(
                        PROVIDER,
                        crate::types::ProviderErrorKind::Unknown,
                        "no docking endpoint configured",
                    ),
                )
            }
        };

        let result = timed(PROVIDER, self.timeout, self.run_dock(&endpoint, request)).await;
        if let Ok(poses) = &result.outcome {
            info!(protein = %request.protein_id, poses = poses.len(), "Docking completed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remote_poses_are_mapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/dock")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"poses":[{"mode":1,"affinity":-9.2,"rmsd_lb":0.0,"rmsd_ub":1.4},
                            {"mode":2,"affinity":-8.1,"rmsd_lb":1.1,"rmsd_ub":2.9}]}"#,
            )
            .create_async()
            .await;

        let backend = RemoteDockingBackend::new(
            Some(format!("{}/dock", server.url())),
            reqwest::Client::new(),
            Duration::from_secs(5),
        );
        assert!(backend.is_available());

        let request = DockingRequest {
            protein_id: "P01308".to_string(),
            ligand_smiles: "CCO".to_string(),
            num_modes: 2,
        };
        let result = backend.dock(&request).await;
        let poses = result.outcome.expect("docking should succeed");
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].mode, 1);
        assert!(poses[0].affinity_kcal_mol < poses[1].affinity_kcal_mol);
    }

    #[tokio::test]
    async fn unconfigured_backend_is_unavailable() {
        let backend =
            RemoteDockingBackend::new(None, reqwest::Client::new(), Duration::from_secs(5));
        assert!(!backend.is_available());
        let request = DockingRequest {
            protein_id: "P01308".to_string(),
            ligand_smiles: "CCO".to_string(),
            num_modes: 3,
        };
        assert!(!backend.dock(&request).await.succeeded());
    }
}
