//! UniProt identity lookup
//!
//! Resolves an accession to protein metadata via the UniProt REST API.
//! A lookup miss is an ordinary `NotFound` failure; the pipeline substitutes
//! a minimal entity and carries on.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::models::Entity;
use crate::providers::{classify_status, classify_transport, timed, IdentityLookup};
use crate::types::{ProviderFailure, ProviderResult};

const PROVIDER: &str = "uniprot";

pub struct UniProtClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

// Wire format: the subset of the UniProtKB entry JSON we care about.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniProtEntry {
    primary_accession: String,
    #[serde(default)]
    protein_description: Option<ProteinDescription>,
    #[serde(default)]
    organism: Option<Organism>,
    #[serde(default)]
    genes: Vec<Gene>,
    #[serde(default)]
    sequence: Option<SequenceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProteinDescription {
    #[serde(default)]
    recommended_name: Option<RecommendedName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedName {
    #[serde(default)]
    full_name: Option<EvidencedString>,
}

#[derive(Debug, Deserialize)]
struct EvidencedString {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organism {
    #[serde(default)]
    scientific_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gene {
    #[serde(default)]
    gene_name: Option<EvidencedString>,
}

#[derive(Debug, Deserialize)]
struct SequenceInfo {
    #[serde(default)]
    length: Option<u32>,
}

impl UniProtClient {
    pub fn new(base_url: String, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url,
            client,
            timeout,
        }
    }

    async fn fetch_entry(&self, accession: &str) -> Result<Entity, ProviderFailure> {
        let url = format!("{}/uniprotkb/{}.json", self.base_url, accession);
        debug!(url = %url, "Fetching UniProt entry");

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

        let entry: UniProtEntry = response
            .json()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        Ok(entry_to_entity(entry))
    }
}

fn entry_to_entity(entry: UniProtEntry) -> Entity {
    let display_name = entry
        .protein_description
        .as_ref()
        .and_then(|d| d.recommended_name.as_ref())
        .and_then(|n| n.full_name.as_ref())
        .map(|n| n.value.clone())
        .unwrap_or_else(|| entry.primary_accession.clone());

    let mut attributes = HashMap::new();
    if let Some(gene) = entry
        .genes
        .iter()
        .find_map(|g| g.gene_name.as_ref().map(|n| n.value.clone()))
    {
        attributes.insert("gene".to_string(), gene);
    }
    if let Some(length) = entry.sequence.as_ref().and_then(|s| s.length) {
        attributes.insert("sequence_length".to_string(), length.to_string());
    }

    Entity {
        id: entry.primary_accession,
        display_name,
        organism: entry.organism.and_then(|o| o.scientific_name),
        attributes,
    }
}

#[async_trait]
impl IdentityLookup for UniProtClient {
    fn is_available(&self) -> bool {
        // UniProt needs no credential; only a configured base URL.
        !self.base_url.is_empty()
    }

    async fn lookup(&self, accession: &str) -> ProviderResult<Entity> {
        let result = timed(PROVIDER, self.timeout, self.fetch_entry(accession)).await;
        if let Ok(entity) = &result.outcome {
            info!(accession = %accession, name = %entity.display_name, "Identity lookup resolved");
        }
        result
    }
}
