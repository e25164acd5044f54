//! Query preparation
//!
//! Pure functions turning caller input plus entity metadata into the request
//! the agent receives: normalized search terms, the ordered model candidate
//! list, the prompt, and the section plan the parser will be driven by.
//! No I/O happens here.

use regex::Regex;

use crate::models::{Entity, LiteratureHit, ResearchOptions};
use crate::providers::{completion::resolve_model_alias, CompletionRequest};

/// UniProt accession shapes, per the UniProtKB accession format.
pub fn detect_accession(input: &str) -> Option<String> {
    let re = Regex::new(
        r"^(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})$",
    )
    .unwrap();
    let candidate = input.trim().to_uppercase();
    if re.is_match(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Derive search terms from free-text input: keep it if it already reads as
/// a phrase, otherwise use the entity's display name and organism.
pub fn search_terms(raw_input: &str, entity: &Entity) -> String {
    if detect_accession(raw_input).is_none() {
        return raw_input.trim().to_string();
    }
    match &entity.organism {
        Some(organism) => format!("{} {}", entity.display_name, organism),
        None => entity.display_name.clone(),
    }
}

/// Everything the agent invocation needs, prepared up front.
#[derive(Debug, Clone)]
pub struct ResearchQuery {
    pub entity_id: String,
    pub prompt: String,
    pub system: String,
    /// Resolved model candidates, preference first.
    pub models: Vec<String>,
    /// Content sections the parser will look for, in this order.
    pub section_plan: Vec<String>,
    pub months_recent: u32,
}

impl ResearchQuery {
    pub fn build(
        entity: &Entity,
        options: &ResearchOptions,
        search_context: Option<&[LiteratureHit]>,
        default_model: &str,
        fallback_models: &[String],
    ) -> Self {
        let mut models = Vec::new();
        if let Some(preference) = &options.model_preference {
            models.push(resolve_model_alias(preference));
        }
        let resolved_default = resolve_model_alias(default_model);
        if !models.contains(&resolved_default) {
            models.push(resolved_default);
        }
        for fallback in fallback_models {
            let resolved = resolve_model_alias(fallback);
            if !models.contains(&resolved) {
                models.push(resolved);
            }
        }

        let mut section_plan = vec![
            "ACADEMIC PAPERS".to_string(),
            "USE CASES".to_string(),
            "DRUG DEVELOPMENT".to_string(),
            "RESEARCH REFERENCES".to_string(),
        ];
        if options.include_novel {
            section_plan.push("NOVEL RESEARCH".to_string());
        }
        section_plan.push("SUMMARY".to_string());

        Self {
            entity_id: entity.id.clone(),
            prompt: build_prompt(entity, options, search_context, &section_plan),
            system: "You are a scientific research assistant with deep knowledge of \
                     protein biology, therapeutics, and the biomedical literature. \
                     Cite every source with a working hyperlink."
                .to_string(),
            models,
            section_plan,
            months_recent: options.months_recent,
        }
    }

    pub fn completion_request(&self, model: &str, tools_enabled: bool) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            prompt: self.prompt.clone(),
            system: Some(self.system.clone()),
            max_tokens: 4096,
            temperature: 0.3,
            tools_enabled,
        }
    }
}

fn build_prompt(
    entity: &Entity,
    options: &ResearchOptions,
    search_context: Option<&[LiteratureHit]>,
    section_plan: &[String],
) -> String {
    let mut prompt = format!(
        "Conduct comprehensive research on the protein {} (id: {}).\n",
        entity.display_name, entity.id
    );
    if let Some(organism) = &entity.organism {
        prompt.push_str(&format!("Organism: {}.\n", organism));
    }
    let mut attributes: Vec<_> = entity.attributes.iter().collect();
    attributes.sort();
    for (key, value) in attributes {
        prompt.push_str(&format!("{}: {}.\n", key, value));
    }

    prompt.push_str(
        "\nStart with a CITATIONS section listing every source as a numbered entry \
         in the form `[n] Title - hyperlink`. Then provide each of the following \
         sections, clearly labeled, in this order:\n",
    );
    for (index, section) in section_plan.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", index + 1, section));
    }
    prompt.push_str(
        "\nWithin ACADEMIC PAPERS, list each paper with `Title:`, `Authors:`, \
         `Year:`, `Link:`, `Summary:` and `Description:` fields. Keep the summary \
         about why the paper matters and the description about what it covers.\n",
    );
    if options.include_novel {
        prompt.push_str(&format!(
            "\nFor NOVEL RESEARCH, restrict to findings from the past {} months.\n",
            options.months_recent
        ));
    }

    if let Some(hits) = search_context {
        if !hits.is_empty() {
            prompt.push_str("\nRelevant results from a preliminary literature search:\n");
            for hit in hits {
                let line = match &hit.link {
                    Some(link) => format!("- {} ({})\n", hit.title, link),
                    None => format!("- {}\n", hit.title),
                };
                prompt.push_str(&line);
            }
        }
    }

    prompt.push_str("\nAim for 10-15 high-quality citations; prefer recent, peer-reviewed sources.\n");
    prompt
}
