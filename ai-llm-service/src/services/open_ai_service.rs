//! Chat completions against an OpenAI-compatible endpoint.
//!
//! One request per call, no streaming, no retries. The request goes to
//! `{endpoint}/v1/chat/completions`; `OPENAI_BASE_URL` may be given with or
//! without the trailing `/v1`.

use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, HttpError, ProviderError, ProviderErrorKind,
        make_snippet, validate_range_f32,
    },
    services::ChatCompletion,
};

const FALLBACK_TIMEOUT_SECS: u64 = 60;
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn provider_err(kind: ProviderErrorKind) -> AiLlmError {
    ProviderError::new(LlmProvider::OpenAI, kind).into()
}

/// Client for `POST /v1/chat/completions`.
///
/// Holds a `reqwest::Client` with the bearer token and request timeout
/// already applied.
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    completions_url: String,
    timeout: Duration,
}

impl OpenAiService {
    /// Validates `cfg` and builds the HTTP client.
    ///
    /// # Errors
    /// - `InvalidProvider`, `MissingApiKey` or `InvalidEndpoint` provider errors
    /// - [`AiLlmError::Config`] for an empty model or a temperature outside `0.0..=2.0`
    /// - [`AiLlmError::HttpTransport`] if the client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(provider_err(ProviderErrorKind::InvalidProvider));
        }
        let Some(api_key) = cfg.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
        else {
            return Err(provider_err(ProviderErrorKind::MissingApiKey));
        };

        let base = cfg.endpoint.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(provider_err(ProviderErrorKind::InvalidEndpoint(
                cfg.endpoint.clone(),
            )));
        }
        if cfg.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        if let Some(t) = cfg.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(FALLBACK_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(auth_headers(api_key)?)
            .build()?;
        let completions_url = format!("{base}{COMPLETIONS_PATH}");

        info!(
            model = %cfg.model,
            url = %completions_url,
            timeout_secs = timeout.as_secs(),
            "chat model client ready"
        );

        Ok(Self {
            client,
            cfg,
            completions_url,
            timeout,
        })
    }

    /// Sends one completion request and returns the first non-empty choice.
    ///
    /// The body carries `model`, the optional system message, the user
    /// message and whichever of `temperature`, `top_p`, `max_tokens` are set.
    ///
    /// # Errors
    /// - `HttpStatus` for non-2xx answers, with a trimmed body snippet
    /// - [`AiLlmError::Timeout`] when the configured timeout elapses
    /// - [`AiLlmError::HttpTransport`] for connection failures
    /// - `Decode` / `EmptyChoices` when the body is unusable
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let request = CompletionRequest::new(&self.cfg, prompt, system);
        debug!(
            model = %self.cfg.model,
            prompt_len = prompt.len(),
            has_system = system.is_some(),
            "sending completion request"
        );

        let resp = self
            .client
            .post(&self.completions_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let snippet = make_snippet(&resp.text().await.unwrap_or_default());
            error!(
                %status,
                %snippet,
                latency_ms = started.elapsed().as_millis(),
                "completion request rejected"
            );
            return Err(provider_err(ProviderErrorKind::HttpStatus(HttpError {
                status,
                url: self.completions_url.clone(),
                snippet,
            })));
        }

        let bytes = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        let content = first_content(&bytes).inspect_err(|e| {
            error!(error = %e, latency_ms = started.elapsed().as_millis(), "unusable completion body");
        })?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            completion_len = content.len(),
            "completion received"
        );
        Ok(content)
    }

    fn transport_error(&self, e: reqwest::Error) -> AiLlmError {
        if e.is_timeout() {
            error!(timeout = ?self.timeout, "completion request timed out");
            AiLlmError::Timeout(self.timeout)
        } else {
            error!(error = %e, "completion request failed in transport");
            AiLlmError::HttpTransport(e)
        }
    }
}

impl ChatCompletion for OpenAiService {
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        OpenAiService::generate(self, prompt, system).await
    }

    fn model(&self) -> &str {
        &self.cfg.model
    }
}

fn auth_headers(api_key: &str) -> Result<HeaderMap, AiLlmError> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
        provider_err(ProviderErrorKind::Decode(format!(
            "API key is not a valid header value: {e}"
        )))
    })?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn first_content(body: &[u8]) -> Result<String, AiLlmError> {
    let parsed: CompletionResponse = serde_json::from_slice(body).map_err(|e| {
        provider_err(ProviderErrorKind::Decode(format!(
            "{e}; expected `choices[].message.content`"
        )))
    })?;
    parsed
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .find(|c| !c.trim().is_empty())
        .ok_or_else(|| provider_err(ProviderErrorKind::EmptyChoices))
}

// Wire types.

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    fn new(cfg: &'a LlmModelConfig, prompt: &'a str, system: Option<&'a str>) -> Self {
        let messages = system
            .map(|content| Message { role: "system", content })
            .into_iter()
            .chain([Message { role: "user", content: prompt }])
            .collect();
        Self {
            model: &cfg.model,
            messages,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
