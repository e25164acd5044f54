// Shared error and result types

use std::time::Duration;

/// Classification of an external provider failure.
///
/// Transient kinds are eligible for retry with backoff; everything else is
/// degraded immediately through the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    NotFound,
    TransientServerError,
    Unknown,
}

impl ProviderErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Timeout
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::TransientServerError
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::RateLimited => write!(f, "rate_limited"),
            ProviderErrorKind::NotFound => write!(f, "not_found"),
            ProviderErrorKind::TransientServerError => write!(f, "transient_server_error"),
            ProviderErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// An ordinary operational failure from an external provider.
///
/// These are values, not exceptions: provider clients return them inside
/// [`ProviderResult`] and the pipeline absorbs them via the fallback policy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{provider} failed ({kind}): {message}")]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Set when the failure came from an attached secondary capability
    /// (e.g. a search tool wired into the completion call) rather than the
    /// provider itself. The pipeline retries once more without the tool.
    pub tool_related: bool,
}

impl ProviderFailure {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
            tool_related: false,
        }
    }

    pub fn tool_related(mut self) -> Self {
        self.tool_related = true;
        self
    }

    pub fn timeout(provider: impl Into<String>, limit: Duration) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("call exceeded {}ms", limit.as_millis()),
        )
    }
}

/// Outcome of a single external call: the payload or an ordinary failure,
/// plus the provider name and observed latency.
#[derive(Debug, Clone)]
pub struct ProviderResult<T> {
    pub provider: String,
    pub latency_ms: u64,
    pub outcome: Result<T, ProviderFailure>,
}

impl<T> ProviderResult<T> {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure(provider: impl Into<String>, failure: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            latency_ms: 0,
            outcome: Err(failure),
        }
    }
}

/// Application-level errors.
///
/// Ordinary provider failures never appear here; they are folded into a
/// degraded pipeline result. `AppError` is reserved for invalid input and
/// programmer errors that must surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider request could not be constructed: {0}")]
    MalformedProviderRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
