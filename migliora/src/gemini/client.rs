//! HTTP client and chat session for the Gemini `generateContent` API.

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::header::HeaderValue;
use tracing::debug;

use super::types::{
    block_none, ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, SafetySetting,
};
use crate::error::{GeminiError, SessionError};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

/// Public REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const API_KEY_HEADER: &str = "x-goog-api-key";
/// Long enough for a full 8192-token reply from the pro model.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest error body passed through verbatim when it is not JSON.
const MAX_ERROR_BODY: usize = 200;

/// Finish reasons that mean the candidate was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT"];

/// Where and how to reach the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Model name, e.g. `gemini-1.5-pro-002`.
    pub model: String,
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Config with the given model and the public endpoint.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Async client bound to one API key.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: HeaderValue,
    config: ClientConfig,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client for `api_key`.
    ///
    /// The key is only checked for shape here; the remote service validates
    /// it on the first request.
    pub fn new(api_key: &str, config: ClientConfig) -> Result<Self, SessionError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SessionError::MissingApiKey);
        }
        let mut api_key = HeaderValue::from_str(api_key).map_err(|_| SessionError::InvalidApiKey)?;
        api_key.set_sensitive(true);

        let client = reqwest::Client::builder()
            .user_agent(concat!("migliora/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SessionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Model this client talks to.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Start an empty conversation with `system_prompt` as its preamble.
    pub fn start_chat(self, system_prompt: impl Into<String>) -> ChatSession {
        ChatSession {
            client: self,
            system_instruction: Content::text(None, system_prompt),
            generation_config: GenerationConfig::default(),
            safety_settings: block_none(),
            history: Vec::new(),
        }
    }

    /// Send one `generateContent` request.
    pub async fn generate(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, GeminiError> {
        debug!(
            model = %self.config.model,
            turns = request.contents.len(),
            "LLM request"
        );
        let start = Instant::now();

        let resp = self
            .client
            .post(self.config.endpoint())
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis(),
            bytes = text.len(),
            "LLM response"
        );

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map_or_else(|_| summarize_error_body(status, &text), |body| body.error.message);
            return Err(GeminiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt = usage.prompt_token_count,
                completion = usage.candidates_token_count,
                total = usage.total_token_count,
                "Token usage"
            );
        }
        Ok(parsed)
    }
}

/// A conversation with a fixed system prompt and sampling parameters.
///
/// Prior turns are kept and sent with every message, so the model sees the
/// whole exchange.
#[derive(Debug)]
pub struct ChatSession {
    client: GeminiClient,
    system_instruction: Content,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
    history: Vec<Content>,
}

impl ChatSession {
    /// Send one user message and return the model's reply text.
    ///
    /// History is only extended when the round-trip succeeds.
    pub async fn send_message(&mut self, text: &str) -> Result<String, GeminiError> {
        let mut contents = self.history.clone();
        contents.push(Content::user(text));

        let response = self
            .client
            .generate(&GenerateContentRequest {
                contents: &contents,
                system_instruction: &self.system_instruction,
                generation_config: &self.generation_config,
                safety_settings: &self.safety_settings,
            })
            .await?;

        let reply = reply_text(response)?;
        contents.push(Content::model(reply.clone()));
        self.history = contents;
        Ok(reply)
    }

    /// Number of turns exchanged so far, counting both sides.
    #[cfg(test)]
    pub fn turns(&self) -> usize {
        self.history.len()
    }

    /// Text of the system instruction.
    #[cfg(test)]
    pub fn system_prompt(&self) -> String {
        self.system_instruction.joined_text()
    }
}

/// Message for a non-JSON error body: short plain text is kept, anything
/// else (HTML error pages, long dumps) is replaced by the status reason.
fn summarize_error_body(status: reqwest::StatusCode, body: &str) -> String {
    let body = body.trim();
    let looks_like_markup = body.starts_with('<');
    if body.is_empty() || looks_like_markup || body.chars().count() > MAX_ERROR_BODY {
        return status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string();
    }
    body.to_string()
}

/// Pull the text of the first candidate out of a response.
fn reply_text(response: GenerateContentResponse) -> Result<String, GeminiError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .ok_or(GeminiError::Empty)?;
        return Err(GeminiError::Blocked(reason));
    };

    let text = candidate
        .content
        .as_ref()
        .map(Content::joined_text)
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(text);
    }
    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => {
            Err(GeminiError::Blocked(reason))
        }
        _ => Err(GeminiError::Empty),
    }
}
