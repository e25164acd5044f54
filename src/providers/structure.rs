//! AlphaFold DB structure fetch
//!
//! Resolves an accession to a predicted 3D structure by downloading the
//! AlphaFold DB model PDB. A missing model is an ordinary `NotFound`
//! failure; the route substitutes a placeholder structure so the viewer
//! always has something to render.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::models::ProteinStructure;
use crate::providers::{classify_status, classify_transport, timed, StructureFetch};
use crate::types::{ProviderFailure, ProviderResult};

const PROVIDER: &str = "alphafold-db";

pub struct AlphaFoldClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl AlphaFoldClient {
    pub fn new(base_url: String, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url,
            client,
            timeout,
        }
    }

    async fn fetch_pdb(&self, accession: &str) -> Result<ProteinStructure, ProviderFailure> {
        let accession = accession.trim().to_uppercase();
        let url = format!("{}/files/AF-{}-F1-model_v4.pdb", self.base_url, accession);
        debug!(url = %url, "Fetching AlphaFold model");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body));
        }

        let pdb_data = response
            .text()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        Ok(ProteinStructure {
            accession,
            source: "alphafold-db".to_string(),
            url: Some(url),
            pdb_data,
        })
    }
}

#[async_trait]
impl StructureFetch for AlphaFoldClient {
    fn is_available(&self) -> bool {
        // AlphaFold DB needs no credential; only a configured base URL.
        !self.base_url.is_empty()
    }

    async fn fetch_structure(&self, accession: &str) -> ProviderResult<ProteinStructure> {
        let result = timed(PROVIDER, self.timeout, self.fetch_pdb(accession)).await;
        if let Ok(structure) = &result.outcome {
            info!(
                accession = %structure.accession,
                bytes = structure.pdb_data.len(),
                "Structure fetched"
            );
        }
        result
    }
}
