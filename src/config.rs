use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub uniprot_base_url: String,
    pub alphafold_base_url: String,
    pub serpapi_key: String,
    pub openai_api_key: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub docking_endpoint: Option<String>,
    pub default_model: String,
    pub fallback_models: Vec<String>,
    /// Per-call timeout for identity/search/metadata providers.
    pub request_timeout_secs: u64,
    /// Completion calls run much longer than metadata lookups.
    pub completion_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub enrich_concurrency: usize,
    pub citation_cap: usize,
    pub search_result_limit: usize,
    /// Every N research runs the response flags that the expressibility
    /// model is due for retraining. Owned by the service layer, not the
    /// pipeline.
    pub retrain_interval: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            providers: ProvidersConfig {
                uniprot_base_url: env::var("UNIPROT_BASE_URL")
                    .unwrap_or_else(|_| "https://rest.uniprot.org".to_string()),
                alphafold_base_url: env::var("ALPHAFOLD_BASE_URL")
                    .unwrap_or_else(|_| "https://alphafold.ebi.ac.uk".to_string()),
                serpapi_key: env::var("SERPAPI_KEY").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                gemini_base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
                docking_endpoint: env::var("DOCKING_ENDPOINT").ok(),
                default_model: env::var("RESEARCH_MODEL")
                    .unwrap_or_else(|_| "google/gemini-1.5-pro".to_string()),
                fallback_models: env::var("RESEARCH_FALLBACK_MODELS")
                    .unwrap_or_else(|_| "google/gemini-1.5-flash,openai/gpt-4.1".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                request_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                completion_timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()?,
            },
            pipeline: PipelineConfig {
                max_attempts: env::var("PIPELINE_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                backoff_base_ms: env::var("PIPELINE_BACKOFF_BASE_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()?,
                enrich_concurrency: env::var("ENRICH_CONCURRENCY")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                citation_cap: env::var("CITATION_CAP")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()?,
                search_result_limit: env::var("SEARCH_RESULT_LIMIT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                retrain_interval: env::var("RETRAIN_INTERVAL")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        // No env vars set in the test harness; defaults must be valid.
        let config = Config::from_env().expect("default config");
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.enrich_concurrency, 3);
        assert_eq!(config.pipeline.citation_cap, 15);
        assert!(config.providers.default_model.contains('/'));
    }
}
