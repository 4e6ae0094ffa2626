//! LLM Client: the single point of entry for all Gemini `generateContent` calls.
//!
//! ARCHITECTURAL RULE: No other module may call the generative API directly.
//! Feature modules describe a `StructuredQuery` and hand it to `LlmClient::execute`.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod prompts;
pub mod schema;
#[cfg(test)]
pub mod testing;

use schema::ResponseSchema;

/// Total attempts per call, including the first one.
pub const MAX_ATTEMPTS: u32 = 3;
const STATUS_UNAUTHORIZED: u16 = 401;
const RESPONSE_MIME_TYPE: &str = "application/json";

/// A single failed round trip. Retried by `LlmClient::call`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportFailure {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM unavailable after {attempts} attempts: {last}")]
    Transport {
        attempts: u32,
        last: TransportFailure,
    },

    #[error("LLM API rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("LLM returned no structured content")]
    EmptyContent,

    #[error("LLM returned malformed structured content: {0}")]
    MalformedContent(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
            role: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Enables web grounding for the call.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: ResponseSchema,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, when present and non-blank.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Structured queries
// ────────────────────────────────────────────────────────────────────────────

/// One schema-constrained model request.
///
/// Analysis and search are both expressed as values of this type; they differ
/// only in schema and in whether web grounding is enabled.
#[derive(Debug, Clone)]
pub struct StructuredQuery {
    pub system_instruction: String,
    pub user_query: String,
    pub schema: ResponseSchema,
    pub grounded: bool,
}

impl StructuredQuery {
    pub fn to_request(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::text(&self.user_query)],
            system_instruction: Content::text(&self.system_instruction),
            tools: self.grounded.then(|| {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            }),
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE.to_string(),
                response_schema: self.schema.clone(),
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────────────────────────────────────

/// Status and body of one round trip.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request. Retry policy lives in `LlmClient`, never here.
#[async_trait]
pub trait GenerativeTransport: Send + Sync {
    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<RawResponse, TransportFailure>;
}

pub struct HttpTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
        })
    }
}

#[async_trait]
impl GenerativeTransport for HttpTransport {
    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<RawResponse, TransportFailure> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| TransportFailure::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::Http(e.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all features.
/// Wraps `generateContent` with retry logic and structured output extraction.
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn GenerativeTransport>,
}

impl LlmClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn with_transport(transport: Arc<dyn GenerativeTransport>) -> Self {
        Self { transport }
    }

    /// Sends the request, retrying failed round trips with exponential backoff.
    ///
    /// 401 fails immediately. Every other non-success status and every network
    /// failure is retried until `MAX_ATTEMPTS` is reached; the last failure is
    /// then returned.
    pub async fn call(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let mut last_failure: Option<TransportFailure> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let raw = match self.transport.send(request).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("LLM transport error: {e}");
                    last_failure = Some(e);
                    continue;
                }
            };

            if raw.status == STATUS_UNAUTHORIZED {
                return Err(LlmError::Unauthorized(api_error_message(&raw.body)));
            }

            if !(200..300).contains(&raw.status) {
                warn!("LLM API returned {}: {}", raw.status, raw.body);
                last_failure = Some(TransportFailure::Api {
                    status: raw.status,
                    message: api_error_message(&raw.body),
                });
                continue;
            }

            // An unreadable envelope has no text path; extraction reports it as empty.
            let envelope: GenerateContentResponse = serde_json::from_str(&raw.body)
                .unwrap_or_else(|e| {
                    warn!("LLM response envelope is not valid JSON: {e}");
                    GenerateContentResponse::default()
                });

            if let Some(usage) = &envelope.usage_metadata {
                debug!(
                    "LLM call succeeded on attempt {}: prompt_tokens={}, candidate_tokens={}",
                    attempt + 1,
                    usage.prompt_token_count,
                    usage.candidates_token_count
                );
            }

            return Ok(envelope);
        }

        Err(LlmError::Transport {
            attempts: MAX_ATTEMPTS,
            last: last_failure
                .unwrap_or_else(|| TransportFailure::Http("no attempt was made".to_string())),
        })
    }

    /// Runs a structured query and deserializes the reply into `T`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &StructuredQuery,
    ) -> Result<T, LlmError> {
        let response = self.call(&query.to_request()).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let value = parse_structured(text, &query.schema)?;
        serde_json::from_value(value).map_err(|e| LlmError::MalformedContent(e.to_string()))
    }
}

/// Delay before attempt `attempt` (0-indexed, > 0): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1))
}

fn parse_structured(text: &str, schema: &ResponseSchema) -> Result<Value, LlmError> {
    let cleaned = clean_json_text(text);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| LlmError::MalformedContent(format!("invalid JSON: {e}")))?;
    schema
        .check_shape(&value)
        .map_err(LlmError::MalformedContent)?;
    Ok(value)
}

/// Strips code fences, then any preamble before the first `[` or `{`.
fn clean_json_text(text: &str) -> &str {
    let text = strip_json_fences(text);
    match text.find(['[', '{']) {
        Some(start) if start > 0 => text[start..].trim_end(),
        _ => text,
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
