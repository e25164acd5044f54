//! Completion / agent backends
//!
//! Model strings follow the `provider/model` convention
//! (e.g. `google/gemini-1.5-pro`, `openai/gpt-4.1`). Short aliases are
//! resolved through [`resolve_model_alias`]. The router owns one adapter per
//! upstream API and dispatches on the provider prefix, resolved once at
//! construction rather than re-branched per call site.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::providers::{classify_transport, timed, CompletionBackend};
use crate::types::{ProviderErrorKind, ProviderFailure, ProviderResult};

/// One completion invocation. `tools_enabled` toggles the attached search
/// tool; the pipeline clears it when retrying after a tool-related failure.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools_enabled: bool,
}

/// Resolve a model alias to a full `provider/model` string. Full strings
/// pass through untouched; unknown aliases pass through with a warning.
pub fn resolve_model_alias(model: &str) -> String {
    if model.contains('/') {
        return model.to_string();
    }
    match model.to_lowercase().as_str() {
        "gpt4" | "gpt4.1" => "openai/gpt-4.1".to_string(),
        "gpt5" => "openai/gpt-5-mini".to_string(),
        "gemini" | "gemini-pro" | "gemini-1.5-pro" => "google/gemini-1.5-pro".to_string(),
        "gemini-flash" | "gemini-1.5-flash" => "google/gemini-1.5-flash".to_string(),
        other => {
            warn!(model = %other, "Unknown model alias, using as-is");
            other.to_string()
        }
    }
}

// Gemini wire format

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct GeminiTool {
    google_search: serde_json::Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

const GEMINI_PROVIDER: &str = "gemini";

impl GeminiBackend {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, model: &str, request: &CompletionRequest) -> Result<String, ProviderFailure> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let tools = if request.tools_enabled {
            vec![GeminiTool {
                google_search: serde_json::json!({}),
            }]
        } else {
            Vec::new()
        };

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
            tools,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(GEMINI_PROVIDER, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport(GEMINI_PROVIDER, &e))?;

        if !status.is_success() {
            return Err(classify_gemini_error(status, &text, request.tools_enabled));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderFailure::new(
                GEMINI_PROVIDER,
                ProviderErrorKind::Unknown,
                format!("unparseable response: {}", e),
            )
        })?;

        let output = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if output.is_empty() {
            return Err(ProviderFailure::new(
                GEMINI_PROVIDER,
                ProviderErrorKind::Unknown,
                "empty candidate list",
            ));
        }

        Ok(output)
    }
}

fn classify_gemini_error(
    status: reqwest::StatusCode,
    body: &str,
    tools_enabled: bool,
) -> ProviderFailure {
    let (kind, message) = match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(parsed) => {
            let kind = match parsed.error.status.as_str() {
                "RESOURCE_EXHAUSTED" => ProviderErrorKind::RateLimited,
                "DEADLINE_EXCEEDED" => ProviderErrorKind::Timeout,
                "NOT_FOUND" => ProviderErrorKind::NotFound,
                "UNAVAILABLE" | "INTERNAL" => ProviderErrorKind::TransientServerError,
                _ if parsed.error.code >= 500 => ProviderErrorKind::TransientServerError,
                _ => ProviderErrorKind::Unknown,
            };
            (kind, parsed.error.message)
        }
        Err(_) => {
            let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                ProviderErrorKind::RateLimited
            } else if status.is_server_error() {
                ProviderErrorKind::TransientServerError
            } else {
                ProviderErrorKind::Unknown
            };
            (kind, body.chars().take(200).collect())
        }
    };

    let failure = ProviderFailure::new(GEMINI_PROVIDER, kind, message);
    // A failure naming the attached search tool is the tool's fault, not the
    // model's; the pipeline retries once without it.
    if tools_enabled && failure.message.to_lowercase().contains("search") {
        failure.tool_related()
    } else {
        failure
    }
}

pub struct OpenAiBackend {
    client: async_openai::Client<OpenAIConfig>,
    configured: bool,
}

const OPENAI_PROVIDER: &str = "openai";

impl OpenAiBackend {
    pub fn new(api_key: String) -> Self {
        let configured = !api_key.is_empty();
        let client = async_openai::Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        Self { client, configured }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, model: &str, request: &CompletionRequest) -> Result<String, ProviderFailure> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if let Some(system) = &request.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(|e| openai_failure(&e))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(|e| openai_failure(&e))?
                .into(),
        );

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build()
            .map_err(|e| openai_failure(&e))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| openai_failure(&e))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderFailure::new(
                OPENAI_PROVIDER,
                ProviderErrorKind::Unknown,
                "empty completion",
            ));
        }

        Ok(content)
    }
}

fn openai_failure(err: &async_openai::error::OpenAIError) -> ProviderFailure {
    let message = err.to_string();
    let lower = message.to_lowercase();
    let kind = if lower.contains("rate limit") || lower.contains("429") {
        ProviderErrorKind::RateLimited
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ProviderErrorKind::Timeout
    } else if lower.contains("500") || lower.contains("502") || lower.contains("503") {
        ProviderErrorKind::TransientServerError
    } else {
        ProviderErrorKind::Unknown
    };
    ProviderFailure::new(OPENAI_PROVIDER, kind, message)
}

/// Dispatches completion requests to the adapter matching the model's
/// provider prefix.
pub struct CompletionRouter {
    gemini: GeminiBackend,
    openai: OpenAiBackend,
    timeout: Duration,
}

const ROUTER_PROVIDER: &str = "agent-completion";

impl CompletionRouter {
    pub fn from_config(config: &Config, timeout: Duration) -> Self {
        Self {
            gemini: GeminiBackend::new(
                config.providers.gemini_base_url.clone(),
                config.providers.gemini_api_key.clone(),
            ),
            openai: OpenAiBackend::new(config.providers.openai_api_key.clone()),
            timeout,
        }
    }

    fn split_model(model: &str) -> (&str, &str) {
        match model.split_once('/') {
            Some((provider, name)) => (provider, name),
            None => ("", model),
        }
    }
}

#[async_trait]
impl CompletionBackend for CompletionRouter {
    fn is_available(&self) -> bool {
        self.gemini.is_configured() || self.openai.is_configured()
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let resolved = resolve_model_alias(&request.model);
        let (provider, model_name) = Self::split_model(&resolved);
        debug!(model = %resolved, tools = request.tools_enabled, "Dispatching completion");

        let result = match provider {
            "google" if self.gemini.is_configured() => {
                timed(GEMINI_PROVIDER, self.timeout, self.gemini.generate(model_name, request)).await
            }
            "openai" if self.openai.is_configured() => {
                timed(OPENAI_PROVIDER, self.timeout, self.openai.generate(model_name, request)).await
            }
            _ => ProviderResult::failure(
                ROUTER_PROVIDER,
                ProviderFailure::new(
                    ROUTER_PROVIDER,
                    ProviderErrorKind::Unknown,
                    format!("no configured backend for model '{}'", resolved),
                ),
            ),
        };

        if let Ok(text) = &result.outcome {
            info!(model = %resolved, response_len = text.len(), "Completion received");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolution() {
        assert_eq!(resolve_model_alias("gemini"), "google/gemini-1.5-pro");
        assert_eq!(resolve_model_alias("gemini-flash"), "google/gemini-1.5-flash");
        assert_eq!(resolve_model_alias("gpt4"), "openai/gpt-4.1");
        // Full strings pass through untouched.
        assert_eq!(resolve_model_alias("openai/gpt-4.1"), "openai/gpt-4.1");
        // Unknown aliases pass through as-is.
        assert_eq!(resolve_model_alias("mystery-model"), "mystery-model");
    }

    #[test]
    fn model_splitting() {
        assert_eq!(
            CompletionRouter::split_model("google/gemini-1.5-pro"),
            ("google", "gemini-1.5-pro")
        );
        assert_eq!(CompletionRouter::split_model("bare"), ("", "bare"));
    }

    #[test]
    fn gemini_rate_limit_classification() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let failure =
            classify_gemini_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body, false);
        assert_eq!(failure.kind, ProviderErrorKind::RateLimited);
        assert!(!failure.tool_related);
    }

    #[test]
    fn gemini_tool_failure_is_flagged() {
        let body = r#"{"error":{"code":500,"message":"google_search tool execution failed","status":"INTERNAL"}}"#;
        let failure =
            classify_gemini_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, body, true);
        assert_eq!(failure.kind, ProviderErrorKind::TransientServerError);
        assert!(failure.tool_related);
    }

    #[tokio::test]
    async fn unconfigured_router_reports_unavailable_model() {
        let backend = CompletionRouter {
            gemini: GeminiBackend::new("http://localhost".to_string(), String::new()),
            openai: OpenAiBackend::new(String::new()),
            timeout: Duration::from_secs(1),
        };
        assert!(!backend.is_available());

        let request = CompletionRequest {
            model: "gemini".to_string(),
            prompt: "hello".to_string(),
            system: None,
            max_tokens: 128,
            temperature: 0.3,
            tools_enabled: true,
        };
        let result = backend.complete(&request).await;
        assert!(!result.succeeded());
    }
}
