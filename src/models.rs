use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::ResearchPipeline;
use crate::providers::{DockingBackend, StructureFetch};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<ResearchPipeline>,
    pub docking: Arc<dyn DockingBackend>,
    pub structure: Arc<dyn StructureFetch>,
    /// Process-wide research run counter. The pipeline itself is stateless;
    /// the service layer owns the counter and echoes it back as data.
    pub run_counter: Arc<AtomicU64>,
}

/// The subject of a research run. Immutable once fetched; lives for one run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Entity {
    /// Minimal entity carrying only the raw id, used when identity lookup
    /// is unavailable or returns nothing.
    pub fn minimal(raw_id: &str) -> Self {
        Self {
            id: raw_id.to_string(),
            display_name: raw_id.to_string(),
            organism: None,
            attributes: HashMap::new(),
        }
    }
}

/// One raw hit from the literature pre-search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LiteratureHit {
    pub title: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

/// A numbered citation extracted from agent output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Citation {
    pub number: String,
    pub title: String,
    pub url: String,
}

/// A resolved 3D structure for one protein. `pdb_data` always carries a
/// complete PDB document; `source` records where it came from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProteinStructure {
    pub accession: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub pdb_data: String,
}

/// Metadata fetched for a single link during enrichment.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LinkMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub external_ids: HashMap<String, String>,
}

/// A structured record extracted from a parsed section and completed by the
/// enrichment step. `summary` and `description` are always populated in the
/// final result; `synthesized` marks records whose missing fields were
/// filled with templated text instead of fetched metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnrichedItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub external_ids: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub summary: String,
    pub description: String,
    pub synthesized: bool,
}

/// Final output of one research run. Constructed once, returned to the
/// caller, never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineResult {
    pub run_id: uuid::Uuid,
    pub entity: Entity,
    /// Section name (lowercased key) to extracted text. Missing sections
    /// hold a "not found" marker, never an absent key.
    pub sections: HashMap<String, String>,
    pub items: Vec<EnrichedItem>,
    pub citations: Vec<Citation>,
    pub degraded: bool,
    pub reasons: Vec<String>,
    pub raw_text: String,
}

/// Caller-supplied knobs for one research run.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub include_novel: bool,
    pub months_recent: u32,
    pub model_preference: Option<String>,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            include_novel: true,
            months_recent: 6,
            model_preference: None,
        }
    }
}

// API request/response bodies

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResearchApiRequest {
    pub query: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub include_novel: Option<bool>,
    #[serde(default)]
    pub months_recent: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ResearchApiResponse {
    #[serde(flatten)]
    pub result: PipelineResult,
    pub run_count: u64,
    pub retrain_due: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DockingApiRequest {
    pub protein_id: String,
    pub ligand_smiles: String,
    #[serde(default)]
    pub num_modes: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DockingPose {
    pub mode: u32,
    pub affinity_kcal_mol: f64,
    pub rmsd_lower: f64,
    pub rmsd_upper: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DockingApiResponse {
    pub protein_id: String,
    pub ligand_smiles: String,
    pub tool: String,
    pub poses: Vec<DockingPose>,
    pub degraded: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StructureApiResponse {
    pub protein_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub pdb_data: String,
    pub degraded: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub providers: HashMap<String, bool>,
}
