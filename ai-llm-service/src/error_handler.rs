//! Errors raised while configuring or calling the chat model.
//!
//! [`AiLlmError`] is the only error callers see. Setup problems live in
//! [`ConfigError`], upstream answers in [`ProviderError`]. The lookup and
//! validation helpers at the bottom feed `config::default_config`.
//!
//! Messages carry an `[AI LLM Service]` prefix.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/* ------------------------------------------------------------------------- */
/* Result alias                                                              */
/* ------------------------------------------------------------------------- */

/// Crate result alias.
pub type Result<T> = std::result::Result<T, AiLlmError>;

/// Maximum number of characters kept from an upstream error body.
pub const SNIPPET_MAX_CHARS: usize = 300;

/* ------------------------------------------------------------------------- */
/* Root error                                                                */
/* ------------------------------------------------------------------------- */

/// Every failure the crate can report.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider answered, but not with something usable.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Connection or protocol failure below HTTP status level.
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// No answer within the configured request timeout.
    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

impl AiLlmError {
    /// `true` for errors raised before any request was attempted.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AiLlmError::Config(_)
                | AiLlmError::Provider(ProviderError {
                    kind: ProviderErrorKind::MissingApiKey
                        | ProviderErrorKind::InvalidEndpoint(_)
                        | ProviderErrorKind::InvalidProvider,
                    ..
                })
        )
    }
}

/* ------------------------------------------------------------------------- */
/* Setup errors                                                              */
/* ------------------------------------------------------------------------- */

/// Invalid or missing settings, detected before any request.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variable absent or blank.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (limits, timeouts).
    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`).
        var: &'static str,
        /// What was expected.
        reason: &'static str,
    },

    /// Variable present but malformed.
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OPENAI_BASE_URL`).
        var: &'static str,
        /// What was expected.
        reason: &'static str,
    },

    /// Number outside its accepted range.
    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("[AI LLM Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Non-2xx answer from a provider endpoint.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: String,
    /// Trimmed start of the response body.
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

/// What went wrong while talking to a provider.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    /// The config targets another provider than the service.
    #[error("invalid provider for this service")]
    InvalidProvider,

    /// No API key configured.
    #[error("missing API key")]
    MissingApiKey,

    /// Base URL without an http(s) scheme.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Non-2xx answer.
    #[error("{0}")]
    HttpStatus(HttpError),

    /// Body was not the JSON shape we read.
    #[error("decode error: {0}")]
    Decode(String),

    /// Response decoded, but carried no message content.
    #[error("response contained no choices with content")]
    EmptyChoices,
}

/// Provider-scoped error: which provider, and what happened.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider}: {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/// Collapses whitespace and truncates an upstream body for logs and errors.
pub fn make_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_MAX_CHARS {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(SNIPPET_MAX_CHARS).collect();
    out.push('…');
    out
}

/* ------------------------------------------------------------------------- */
/* Variable lookup                                                           */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty variable through `lookup`.
///
/// Binaries pass `|k| std::env::var(k).ok()`; tests pass a map.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_var<F>(lookup: &F, name: &'static str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Parses an optional `u32` (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::InvalidNumber`] if the
/// variable is set but not a valid `u32`.
pub fn opt_u32_var<F>(lookup: &F, name: &'static str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => v.trim().parse::<u32>().map(Some).map_err(|_| {
            AiLlmError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })
        }),
        _ => Ok(None),
    }
}

/// Optional, non-empty string variable.
pub fn opt_var<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/* ------------------------------------------------------------------------- */
/* Value checks                                                              */
/* ------------------------------------------------------------------------- */

/// Checks that a URL setting uses the http or https scheme.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::InvalidFormat`] when
/// the string does not start with a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Checks `min <= value <= max` for a finite `value`.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::OutOfRange`] if `value`
/// is outside `[min, max]`.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_collapsed_and_bounded() {
        assert_eq!(make_snippet("  a \n\t b  "), "a b");
        let long = "x".repeat(SNIPPET_MAX_CHARS + 50);
        let s = make_snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_MAX_CHARS + 1);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn lookup_helpers() {
        let lookup = |k: &str| match k {
            "SET" => Some(" value ".to_string()),
            "BLANK" => Some("  ".to_string()),
            "NUM" => Some("1500".to_string()),
            "BAD" => Some("lots".to_string()),
            _ => None,
        };
        assert_eq!(must_var(&lookup, "SET").unwrap(), "value");
        assert!(matches!(
            must_var(&lookup, "BLANK"),
            Err(AiLlmError::Config(ConfigError::MissingVar("BLANK")))
        ));
        assert_eq!(opt_u32_var(&lookup, "NUM").unwrap(), Some(1500));
        assert_eq!(opt_u32_var(&lookup, "NONE").unwrap(), None);
        assert!(matches!(
            opt_u32_var(&lookup, "BAD"),
            Err(AiLlmError::Config(ConfigError::InvalidNumber { var: "BAD", .. }))
        ));
        assert_eq!(opt_var(&lookup, "BLANK"), None);
    }

    #[test]
    fn config_classification() {
        let missing: AiLlmError =
            ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::MissingApiKey).into();
        assert!(missing.is_config());
        let empty: AiLlmError =
            ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::EmptyChoices).into();
        assert!(!empty.is_config());
        assert!(empty.to_string().contains("[AI LLM Service] openai: "));
    }
}
