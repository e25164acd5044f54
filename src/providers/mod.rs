//! External provider clients
//!
//! One trait per capability the research pipeline depends on. Implementations
//! wrap a single external dependency behind a timeout and never return errors
//! as exceptions for ordinary failures: every call resolves to a
//! [`ProviderResult`] carrying either the payload or a classified
//! [`ProviderFailure`]. Availability is a cheap configuration check with no
//! network I/O, so bootstrap code can wire up unavailable clients and let the
//! pipeline degrade instead of probing the environment itself.

pub mod completion;
pub mod docking;
pub mod identity;
pub mod metadata;
pub mod scholar;
pub mod structure;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::Config;
use crate::models::{DockingPose, Entity, LinkMetadata, LiteratureHit, ProteinStructure};
use crate::types::{ProviderErrorKind, ProviderFailure, ProviderResult};

pub use completion::{CompletionRequest, CompletionRouter};
pub use docking::{DockingRequest, RemoteDockingBackend};
pub use identity::UniProtClient;
pub use metadata::MetadataClient;
pub use scholar::ScholarClient;
pub use structure::AlphaFoldClient;

/// Abstract external function the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    IdentityLookup,
    LiteratureSearch,
    AgentCompletion,
    MetadataFetch,
    StructureFetch,
    Docking,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::IdentityLookup => write!(f, "identity-lookup"),
            Capability::LiteratureSearch => write!(f, "literature-search"),
            Capability::AgentCompletion => write!(f, "agent-completion"),
            Capability::MetadataFetch => write!(f, "metadata-fetch"),
            Capability::StructureFetch => write!(f, "structure-fetch"),
            Capability::Docking => write!(f, "docking"),
        }
    }
}

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    fn is_available(&self) -> bool;
    async fn lookup(&self, accession: &str) -> ProviderResult<Entity>;
}

#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    fn is_available(&self) -> bool;
    async fn search(&self, terms: &str, limit: usize) -> ProviderResult<Vec<LiteratureHit>>;
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn is_available(&self) -> bool;
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
}

#[async_trait]
pub trait MetadataFetch: Send + Sync {
    fn is_available(&self) -> bool;
    async fn fetch(&self, url: &str) -> ProviderResult<LinkMetadata>;
}

#[async_trait]
pub trait StructureFetch: Send + Sync {
    fn is_available(&self) -> bool;
    async fn fetch_structure(&self, accession: &str) -> ProviderResult<ProteinStructure>;
}

#[async_trait]
pub trait DockingBackend: Send + Sync {
    fn is_available(&self) -> bool;
    fn tool_name(&self) -> &str;
    async fn dock(&self, request: &DockingRequest) -> ProviderResult<Vec<DockingPose>>;
}

/// All provider clients the pipeline needs, resolved once at construction.
#[derive(Clone)]
pub struct ProviderSet {
    pub identity: Arc<dyn IdentityLookup>,
    pub literature: Arc<dyn LiteratureSearch>,
    pub completion: Arc<dyn CompletionBackend>,
    pub metadata: Arc<dyn MetadataFetch>,
}

impl ProviderSet {
    pub fn from_config(config: &Config) -> Self {
        let http = reqwest::Client::new();
        let timeout = Duration::from_secs(config.providers.request_timeout_secs);
        let completion_timeout = Duration::from_secs(config.providers.completion_timeout_secs);

        Self {
            identity: Arc::new(UniProtClient::new(
                config.providers.uniprot_base_url.clone(),
                http.clone(),
                timeout,
            )),
            literature: Arc::new(ScholarClient::new(
                config.providers.serpapi_key.clone(),
                timeout,
            )),
            completion: Arc::new(CompletionRouter::from_config(config, completion_timeout)),
            metadata: Arc::new(MetadataClient::new(http, timeout)),
        }
    }
}

/// Run a provider future under a timeout, recording latency. Exceeding the
/// limit resolves to a `Timeout` failure rather than hanging the run.
pub(crate) async fn timed<T, F>(
    provider: &str,
    limit: Duration,
    fut: F,
) -> ProviderResult<T>
where
    F: std::future::Future<Output = Result<T, ProviderFailure>>,
{
    let started = Instant::now();
    let outcome = match tokio::time::timeout(limit, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(ProviderFailure::timeout(provider, limit)),
    };
    ProviderResult {
        provider: provider.to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
        outcome,
    }
}

/// Map a reqwest transport error onto the failure taxonomy.
pub(crate) fn classify_transport(provider: &str, err: &reqwest::Error) -> ProviderFailure {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_connect() {
        ProviderErrorKind::TransientServerError
    } else {
        ProviderErrorKind::Unknown
    };
    ProviderFailure::new(provider, kind, err.to_string())
}

/// Map an HTTP status onto the failure taxonomy. Rate limits and 5xx are
/// transient; 404 is permanent not-found; other 4xx are permanent unknowns.
pub(crate) fn classify_status(provider: &str, status: reqwest::StatusCode, body: &str) -> ProviderFailure {
    let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderErrorKind::RateLimited
    } else if status == reqwest::StatusCode::NOT_FOUND {
        ProviderErrorKind::NotFound
    } else if status.is_server_error() {
        ProviderErrorKind::TransientServerError
    } else {
        ProviderErrorKind::Unknown
    };
    let snippet: String = body.chars().take(200).collect();
    ProviderFailure::new(provider, kind, format!("HTTP {}: {}", status.as_u16(), snippet))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timed_resolves_timeout_instead_of_hanging() {
        let limit = Duration::from_millis(50);
        let started = Instant::now();
        let result: ProviderResult<()> = timed("sleepy", limit, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;

        assert!(!result.succeeded());
        let failure = result.outcome.unwrap_err();
        assert_eq!(failure.kind, ProviderErrorKind::Timeout);
        // Resolves within timeout + epsilon, not after the inner sleep.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn timed_passes_through_success() {
        let result = timed("fast", Duration::from_secs(1), async { Ok(42u32) }).await;
        assert!(result.succeeded());
        assert_eq!(result.outcome.unwrap(), 42);
        assert_eq!(result.provider, "fast");
    }

    #[test]
    fn status_classification() {
        let f = classify_status("x", reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(f.kind, ProviderErrorKind::RateLimited);
        let f = classify_status("x", reqwest::StatusCode::NOT_FOUND, "");
        assert_eq!(f.kind, ProviderErrorKind::NotFound);
        let f = classify_status("x", reqwest::StatusCode::BAD_GATEWAY, "");
        assert_eq!(f.kind, ProviderErrorKind::TransientServerError);
        let f = classify_status("x", reqwest::StatusCode::FORBIDDEN, "");
        assert_eq!(f.kind, ProviderErrorKind::Unknown);
    }
}
