//! Research pipeline
//!
//! Orchestrates one research run as a fixed sequence of steps:
//!
//! ```text
//! IdentifyEntity → PrepareQuery → InvokeAgent → ParseOutput → Enrich → Done
//! ```
//!
//! Provider failures never abort the run. Identity and literature failures
//! substitute fallback payloads; agent invocation retries transient errors
//! with exponential backoff, walks an ordered list of alternative models,
//! and finally degrades to a template document. Only invalid input surfaces
//! to the caller as an error. Each run is independent and the pipeline holds
//! no mutable state, so any number of runs may execute concurrently;
//! dropping the returned future abandons in-flight provider calls.

pub mod enrich;
pub mod query;
pub mod retry;

pub use query::ResearchQuery;
pub use retry::RetryPolicy;

use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::fallback::FallbackPolicy;
use crate::models::{PipelineResult, ResearchOptions};
use crate::parser::{parse_items, parse_sections, FieldLabels, SectionedDocument};
use crate::providers::{Capability, ProviderSet};
use crate::types::{AppError, AppResult, ProviderFailure};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub enrich_concurrency: usize,
    pub citation_cap: usize,
    pub search_result_limit: usize,
    pub default_model: String,
    pub fallback_models: Vec<String>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.pipeline.max_attempts,
            backoff_base: Duration::from_millis(config.pipeline.backoff_base_ms),
            enrich_concurrency: config.pipeline.enrich_concurrency,
            citation_cap: config.pipeline.citation_cap,
            search_result_limit: config.pipeline.search_result_limit,
            default_model: config.providers.default_model.clone(),
            fallback_models: config.providers.fallback_models.clone(),
        }
    }
}

pub struct ResearchPipeline {
    providers: ProviderSet,
    fallback: FallbackPolicy,
    retry: RetryPolicy,
    settings: PipelineSettings,
    field_labels: FieldLabels,
}

impl ResearchPipeline {
    pub fn new(providers: ProviderSet, settings: PipelineSettings) -> Self {
        Self {
            providers,
            fallback: FallbackPolicy::new(),
            retry: RetryPolicy::new(settings.max_attempts, settings.backoff_base),
            settings,
            field_labels: FieldLabels::default(),
        }
    }

    pub fn from_config(providers: ProviderSet, config: &Config) -> Self {
        Self::new(providers, PipelineSettings::from_config(config))
    }

    /// Run the full pipeline for one subject. Always returns a well-formed
    /// result for operational failures; errors only on invalid input.
    pub async fn run(&self, raw_query: &str, options: ResearchOptions) -> AppResult<PipelineResult> {
        let raw = raw_query.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidRequest("query must not be empty".to_string()));
        }

        let run_id = Uuid::new_v4();
        let mut degraded = false;
        let mut reasons = Vec::new();
        info!(run_id = %run_id, query = %raw, "Research run started");

        // IdentifyEntity
        let lookup_id = query::detect_accession(raw).unwrap_or_else(|| raw.to_string());
        let entity = if self.providers.identity.is_available() {
            let result = self.providers.identity.lookup(&lookup_id).await;
            match result.outcome {
                Ok(entity) => entity,
                Err(failure) => {
                    degraded = true;
                    reasons.push(
                        self.fallback
                            .reason_for_failure(Capability::IdentityLookup, &failure),
                    );
                    self.fallback.entity(&lookup_id)
                }
            }
        } else {
            degraded = true;
            reasons.push(
                self.fallback
                    .reason(Capability::IdentityLookup, "provider not configured"),
            );
            self.fallback.entity(&lookup_id)
        };

        // Literature pre-search
        let terms = query::search_terms(raw, &entity);
        let hits = if self.providers.literature.is_available() {
            let result = self
                .providers
                .literature
                .search(&terms, self.settings.search_result_limit)
                .await;
            match result.outcome {
                Ok(hits) if hits.is_empty() => {
                    degraded = true;
                    reasons.push(
                        self.fallback
                            .reason(Capability::LiteratureSearch, "search returned no results"),
                    );
                    self.fallback.literature()
                }
                Ok(hits) => hits,
                Err(failure) => {
                    degraded = true;
                    reasons.push(
                        self.fallback
                            .reason_for_failure(Capability::LiteratureSearch, &failure),
                    );
                    self.fallback.literature()
                }
            }
        } else {
            degraded = true;
            reasons.push(
                self.fallback
                    .reason(Capability::LiteratureSearch, "provider not configured"),
            );
            self.fallback.literature()
        };

        // PrepareQuery (pure)
        let query = ResearchQuery::build(
            &entity,
            &options,
            Some(&hits),
            &self.settings.default_model,
            &self.settings.fallback_models,
        );

        // InvokeAgent
        let raw_text = match self.invoke_agent(&query, &mut reasons).await {
            Some(text) => text,
            None => {
                degraded = true;
                reasons.push(
                    self.fallback
                        .reason(Capability::AgentCompletion, "all model candidates failed"),
                );
                self.fallback.agent_document(&query)
            }
        };

        // ParseOutput (pure)
        let document = parse_sections(&raw_text, &query.section_plan, self.settings.citation_cap);

        // Enrich
        let parsed_items = self.collect_items(&document);
        let enrichment = enrich::enrich_items(
            parsed_items,
            &entity,
            &self.providers.metadata,
            self.settings.enrich_concurrency,
        )
        .await;
        degraded |= enrichment.degraded;
        reasons.extend(enrichment.reasons);

        // Done. Any recorded reason implies a degraded run, including the
        // tool-disabled completion path.
        let degraded = degraded || !reasons.is_empty();
        let mut sections = HashMap::new();
        for name in &query.section_plan {
            let key = name.to_lowercase().replace(' ', "_");
            let body = document
                .section(name)
                .map(str::to_string)
                .unwrap_or_else(|| format!("No {} section found", name.to_lowercase()));
            sections.insert(key, body);
        }

        info!(
            run_id = %run_id,
            degraded,
            citations = document.citations.len(),
            items = enrichment.items.len(),
            "Research run complete"
        );

        Ok(PipelineResult {
            run_id,
            entity,
            sections,
            items: enrichment.items,
            citations: document.citations,
            degraded,
            reasons,
            raw_text,
        })
    }

    /// Walk the model candidates, retrying transient failures per model.
    /// A failure attributed to the attached search tool earns one more
    /// attempt with the tool disabled before moving on.
    async fn invoke_agent(&self, query: &ResearchQuery, reasons: &mut Vec<String>) -> Option<String> {
        if !self.providers.completion.is_available() {
            return None;
        }

        let mut last_failure: Option<ProviderFailure> = None;
        for model in &query.models {
            let result = self
                .retry
                .run("agent-completion", || {
                    let request = query.completion_request(model, true);
                    let completion = &self.providers.completion;
                    async move { completion.complete(&request).await }
                })
                .await;

            match result.outcome {
                Ok(text) => return Some(text),
                Err(failure) => {
                    if failure.tool_related {
                        warn!(model = %model, "Search tool failed, retrying without it");
                        let request = query.completion_request(model, false);
                        let bare = self.providers.completion.complete(&request).await;
                        if let Ok(text) = bare.outcome {
                            reasons.push(self.fallback.reason(
                                Capability::AgentCompletion,
                                "search tool disabled after tool failure",
                            ));
                            return Some(text);
                        }
                    }
                    warn!(model = %model, error = %failure, "Model candidate exhausted");
                    last_failure = Some(failure);
                }
            }
        }

        if let Some(failure) = last_failure {
            warn!(error = %failure, "Every model candidate failed");
        }
        None
    }

    /// Cheap availability snapshot for health reporting.
    pub fn capabilities(&self) -> HashMap<String, bool> {
        HashMap::from([
            (
                Capability::IdentityLookup.to_string(),
                self.providers.identity.is_available(),
            ),
            (
                Capability::LiteratureSearch.to_string(),
                self.providers.literature.is_available(),
            ),
            (
                Capability::AgentCompletion.to_string(),
                self.providers.completion.is_available(),
            ),
            (
                Capability::MetadataFetch.to_string(),
                self.providers.metadata.is_available(),
            ),
        ])
    }

    fn collect_items(&self, document: &SectionedDocument) -> Vec<crate::parser::ParsedItem> {
        let mut items = Vec::new();
        for section in ["ACADEMIC PAPERS", "NOVEL RESEARCH"] {
            if let Some(body) = document.section(section) {
                items.extend(parse_items(body, &self.field_labels));
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, LinkMetadata, LiteratureHit};
    use crate::providers::{
        CompletionBackend, CompletionRequest, IdentityLookup, LiteratureSearch, MetadataFetch,
    };
    use crate::types::{ProviderErrorKind, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ok<T>(provider: &str, value: T) -> ProviderResult<T> {
        ProviderResult {
            provider: provider.to_string(),
            latency_ms: 1,
            outcome: Ok(value),
        }
    }

    fn failed<T>(provider: &str, kind: ProviderErrorKind) -> ProviderResult<T> {
        ProviderResult::failure(provider, ProviderFailure::new(provider, kind, "stub failure"))
    }

    struct StubIdentity {
        entity: Option<Entity>,
    }

    #[async_trait]
    impl IdentityLookup for StubIdentity {
        fn is_available(&self) -> bool {
            true
        }
        async fn lookup(&self, _accession: &str) -> ProviderResult<Entity> {
            match &self.entity {
                Some(entity) => ok("identity", entity.clone()),
                None => failed("identity", ProviderErrorKind::NotFound),
            }
        }
    }

    struct StubLiterature {
        hits: Vec<LiteratureHit>,
    }

    #[async_trait]
    impl LiteratureSearch for StubLiterature {
        fn is_available(&self) -> bool {
            true
        }
        async fn search(&self, _terms: &str, _limit: usize) -> ProviderResult<Vec<LiteratureHit>> {
            ok("literature", self.hits.clone())
        }
    }

    enum CompletionMode {
        Fixed(String),
        AlwaysTransient,
        ToolFailsBareSucceeds(String),
    }

    struct StubCompletion {
        mode: CompletionMode,
        calls: AtomicU32,
    }

    impl StubCompletion {
        fn new(mode: CompletionMode) -> Self {
            Self {
                mode,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for StubCompletion {
        fn is_available(&self) -> bool {
            true
        }
        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.mode {
                CompletionMode::Fixed(text) => ok("agent", text.clone()),
                CompletionMode::AlwaysTransient => {
                    failed("agent", ProviderErrorKind::TransientServerError)
                }
                CompletionMode::ToolFailsBareSucceeds(text) => {
                    if request.tools_enabled {
                        ProviderResult::failure(
                            "agent",
                            ProviderFailure::new(
                                "agent",
                                ProviderErrorKind::Unknown,
                                "search tool exploded",
                            )
                            .tool_related(),
                        )
                    } else {
                        ok("agent", text.clone())
                    }
                }
            }
        }
    }

    struct StubMetadata;

    #[async_trait]
    impl MetadataFetch for StubMetadata {
        fn is_available(&self) -> bool {
            true
        }
        async fn fetch(&self, _url: &str) -> ProviderResult<LinkMetadata> {
            ok("metadata", LinkMetadata::default())
        }
    }

    fn demo_entity() -> Entity {
        let mut entity = Entity::minimal("X00001");
        entity.display_name = "Demo Entity".to_string();
        entity
    }

    fn agent_blob() -> String {
        "CITATIONS\n\
         [1] Demo Paper - http://example.com/1\n\n\
         ACADEMIC PAPERS\n\
         Title: Demo Paper\n\
         Year: 2023\n\
         Link: http://example.com/1\n\n\
         USE CASES\n\
         Teaching demos.\n\n\
         DRUG DEVELOPMENT\n\
         None known.\n\n\
         RESEARCH REFERENCES\n\
         None.\n\n\
         NOVEL RESEARCH\n\
         Nothing recent.\n\n\
         SUMMARY\n\
         This is a demo.\n"
            .to_string()
    }

    fn pipeline_with(
        identity: StubIdentity,
        literature: StubLiterature,
        completion: Arc<StubCompletion>,
        settings: PipelineSettings,
    ) -> ResearchPipeline {
        let providers = ProviderSet {
            identity: Arc::new(identity),
            literature: Arc::new(literature),
            completion,
            metadata: Arc::new(StubMetadata),
        };
        ResearchPipeline::new(providers, settings)
    }

    fn fast_settings() -> PipelineSettings {
        PipelineSettings {
            max_attempts: 3,
            backoff_base: Duration::from_millis(5),
            enrich_concurrency: 3,
            citation_cap: 15,
            search_result_limit: 10,
            default_model: "google/gemini-1.5-pro".to_string(),
            fallback_models: vec![],
        }
    }

    #[tokio::test]
    async fn end_to_end_demo_entity() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::Fixed(agent_blob())));
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature { hits: vec![] },
            completion,
            fast_settings(),
        );

        let result = pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .expect("pipeline should not error");

        assert_eq!(result.entity.id, "X00001");
        assert_eq!(result.entity.display_name, "Demo Entity");
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].number, "1");
        assert_eq!(result.citations[0].title, "Demo Paper");
        assert_eq!(result.citations[0].url, "http://example.com/1");
        assert_eq!(
            result.sections.get("summary").map(String::as_str),
            Some("This is a demo.")
        );
        // Empty literature search is a fallback path.
        assert!(result.degraded);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("literature-search")));
    }

    #[tokio::test]
    async fn identity_fallback_propagates_degraded() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::Fixed(agent_blob())));
        let pipeline = pipeline_with(
            StubIdentity { entity: None },
            StubLiterature { hits: vec![] },
            completion,
            fast_settings(),
        );

        let result = pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .unwrap();

        assert!(result.degraded);
        assert!(result.reasons.iter().any(|r| r.contains("identity-lookup")));
        // The minimal entity still carries the raw id.
        assert_eq!(result.entity.id, "X00001");
    }

    #[tokio::test]
    async fn exhausted_agent_degrades_to_template_document() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::AlwaysTransient));
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature { hits: vec![] },
            completion.clone(),
            fast_settings(),
        );

        let result = pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .unwrap();

        // Three attempts for the single model candidate.
        assert_eq!(completion.calls.load(Ordering::SeqCst), 3);
        assert!(result.degraded);
        assert!(result.reasons.iter().any(|r| r.contains("agent-completion")));
        // The template document still parses into every expected section.
        assert!(result.sections.contains_key("summary"));
        assert!(!result.citations.is_empty());
        assert!(!result.raw_text.is_empty());
    }

    #[tokio::test]
    async fn model_fallback_list_is_walked() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::AlwaysTransient));
        let mut settings = fast_settings();
        settings.fallback_models = vec!["google/gemini-1.5-flash".to_string()];
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature { hits: vec![] },
            completion.clone(),
            settings,
        );

        pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .unwrap();

        // Three attempts per candidate, two candidates.
        assert_eq!(completion.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn tool_failure_retries_once_without_tool() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::ToolFailsBareSucceeds(
            agent_blob(),
        )));
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature { hits: vec![] },
            completion.clone(),
            fast_settings(),
        );

        let result = pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .unwrap();

        // Tool failures are not transient retries: one tooled attempt plus
        // one bare attempt.
        assert_eq!(completion.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            result.sections.get("summary").map(String::as_str),
            Some("This is a demo.")
        );
        assert!(result.reasons.iter().any(|r| r.contains("search tool")));
    }

    #[tokio::test]
    async fn empty_query_is_invalid_input() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::Fixed(agent_blob())));
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature { hits: vec![] },
            completion,
            fast_settings(),
        );

        let err = pipeline
            .run("   ", ResearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn successful_run_with_hits_is_not_degraded() {
        let completion = Arc::new(StubCompletion::new(CompletionMode::Fixed(agent_blob())));
        let pipeline = pipeline_with(
            StubIdentity {
                entity: Some(demo_entity()),
            },
            StubLiterature {
                hits: vec![LiteratureHit {
                    title: "Context Paper".to_string(),
                    snippet: "context".to_string(),
                    link: Some("https://example.com/ctx".to_string()),
                    authors: None,
                    year: Some(2024),
                }],
            },
            completion,
            fast_settings(),
        );

        let result = pipeline
            .run("X00001", ResearchOptions::default())
            .await
            .unwrap();

        assert!(!result.degraded, "reasons: {:?}", result.reasons);
        assert!(result.reasons.is_empty());
        // Every planned section key is present, populated or placeholder.
        for key in [
            "academic_papers",
            "use_cases",
            "drug_development",
            "research_references",
            "novel_research",
            "summary",
        ] {
            assert!(result.sections.contains_key(key), "missing {}", key);
        }
        // Parsed item was enriched and keeps distinct summary/description.
        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_ne!(
            item.summary.trim().to_lowercase(),
            item.description.trim().to_lowercase()
        );
    }
}
