//! Fallback policy
//!
//! When a provider is absent, erroring, or timed out, the pipeline
//! substitutes a synthetic payload from here instead of failing the run.
//! Every generator is seeded by its request, so repeated calls with the same
//! input produce the same payload. Each substitution carries a
//! human-readable reason that the pipeline surfaces in `reasons`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::models::{DockingPose, Entity, LiteratureHit, ProteinStructure};
use crate::pipeline::query::ResearchQuery;
use crate::providers::{Capability, DockingRequest};
use crate::types::ProviderFailure;

#[derive(Debug, Clone, Default)]
pub struct FallbackPolicy;

fn seed_from(input: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    hasher.finish()
}

impl FallbackPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Reason string recorded whenever a capability degrades.
    pub fn reason(&self, capability: Capability, detail: &str) -> String {
        let reason = format!("{} fell back: {}", capability, detail);
        warn!(capability = %capability, detail = %detail, "Capability degraded");
        reason
    }

    pub fn reason_for_failure(&self, capability: Capability, failure: &ProviderFailure) -> String {
        self.reason(capability, &format!("{} ({})", failure.message, failure.kind))
    }

    /// Minimal entity carrying only the raw id.
    pub fn entity(&self, raw_id: &str) -> Entity {
        Entity::minimal(raw_id)
    }

    /// Literature fallback: no synthetic hits are invented, the agent simply
    /// runs without pre-search context.
    pub fn literature(&self) -> Vec<LiteratureHit> {
        Vec::new()
    }

    /// Empty template document honoring the expected section layout, so the
    /// parser and every downstream consumer see the same shape as a real
    /// agent response.
    pub fn agent_document(&self, query: &ResearchQuery) -> String {
        let mut doc = String::new();
        doc.push_str("CITATIONS\n\n");
        doc.push_str(&format!(
            "[1] {} research placeholder - https://www.uniprot.org/uniprotkb/{}\n\n",
            query.entity_id, query.entity_id
        ));
        for section in &query.section_plan {
            doc.push_str(&format!("{}\n\n", section.to_uppercase()));
            doc.push_str(&format!(
                "No agent output was available for {}. This section was generated as a placeholder.\n\n",
                query.entity_id
            ));
        }
        doc
    }

    /// Placeholder structure for viewers when no AlphaFold model exists: a
    /// CA-only helix-like trace, length seeded by the accession so repeated
    /// requests reproduce.
    pub fn protein_structure(&self, accession: &str) -> ProteinStructure {
        let accession = accession.trim().to_uppercase();
        let mut rng = StdRng::seed_from_u64(seed_from(&accession));
        let residues = rng.gen_range(40..120u32);

        let mut pdb = format!("HEADER    PROTEIN {:<40}\n", accession);
        pdb.push_str("TITLE     PREDICTED STRUCTURE\n");
        pdb.push_str("REMARK   1 GENERATED STRUCTURE FOR VISUALIZATION\n");
        for i in 0..residues {
            // Approximate helix geometry, enough for a viewer to render.
            let x = (i as f64) * 1.5;
            let y = 0.6 * (i % 10) as f64;
            let z = 0.6 * ((i + 5) % 10) as f64;
            pdb.push_str(&format!(
                "ATOM  {:5}  CA  ALA A{:4}    {:8.3}{:8.3}{:8.3}  1.00 50.00           C  \n",
                i + 1,
                i + 1,
                x,
                y,
                z
            ));
        }
        pdb.push_str("END\n");

        ProteinStructure {
            accession,
            source: "placeholder".to_string(),
            url: None,
            pdb_data: pdb,
        }
    }

    /// Deterministic mock poses in a plausible affinity range, best first.
    /// Seeded by (protein, ligand) so repeated requests reproduce.
    pub fn docking_poses(&self, request: &DockingRequest) -> Vec<DockingPose> {
        let seed = seed_from(&format!("{}|{}", request.protein_id, request.ligand_smiles));
        let mut rng = StdRng::seed_from_u64(seed);

        let modes = request.num_modes.clamp(1, 20);
        let best_affinity = -1.0 * rng.gen_range(7.5..11.0);

        (1..=modes)
            .map(|mode| {
                let decay = 0.3 + rng.gen_range(0.0..0.5);
                let affinity = best_affinity + decay * (mode - 1) as f64;
                DockingPose {
                    mode,
                    affinity_kcal_mol: (affinity * 10.0).round() / 10.0,
                    rmsd_lower: if mode == 1 {
                        0.0
                    } else {
                        (rng.gen_range(0.5..3.0) * 10.0_f64).round() / 10.0
                    },
                    rmsd_upper: (rng.gen_range(3.0..8.0) * 10.0_f64).round() / 10.0,
                }
            })
            .collect()
    }
}
