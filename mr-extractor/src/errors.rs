//! Crate-wide error hierarchy for mr-extractor.

use mr_store::StoreError;
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Root error type for the mr-extractor crate.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// GitLab API related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Record persistence failure (file I/O / JSON).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration problems (missing token, bad window, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The project could not be resolved; the run cannot start.
    #[error("cannot resolve project {project}: {source}")]
    ProjectUnavailable {
        project: String,
        #[source]
        source: ProviderError,
    },

    /// Assembled data failed a record invariant (e.g. missing id).
    #[error("validation error: {0}")]
    Validation(String),
}

impl ExtractorError {
    /// Configuration errors abort the process before any per-item work.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            ExtractorError::Config(_) | ExtractorError::ProjectUnavailable { .. }
        )
    }
}

/// Provider-specific error used inside the GitLab client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 401: token rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// 403: token lacks access to the project.
    #[error("forbidden")]
    Forbidden,

    /// 404.
    #[error("not found")]
    NotFound,

    /// 429.
    #[error("rate limited")]
    RateLimited {
        /// `Retry-After` in seconds, if the server sent one.
        retry_after_secs: Option<u64>,
    },

    /// Any 5xx.
    #[error("server error: status {0}")]
    Server(u16),

    /// Remaining non-2xx codes.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Request exceeded the client timeout.
    #[error("timeout")]
    Timeout,

    /// No HTTP answer at all.
    #[error("network error: {0}")]
    Network(String),

    /// Body or headers we could not interpret.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Maps a non-success HTTP status into a provider error.
    pub fn from_status(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited { retry_after_secs },
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// Timestamp could not be parsed in any supported format.
    #[error("invalid timestamp in {var}: {value:?}")]
    InvalidTimestamp { var: &'static str, value: String },

    /// A number failed to parse.
    #[error("invalid number in {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    /// Window start is after window end.
    #[error("window start {start} is after end {end}")]
    InvertedWindow { start: String, end: String },

    /// Invalid base URL.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}

// Conversions used by `?` in the client and the run loop.

impl From<reqwest::Error> for ExtractorError {
    fn from(e: reqwest::Error) -> Self {
        ExtractorError::Provider(ProviderError::from(e))
    }
}

// ===== Mapping from reqwest::Error into ProviderError =====

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16(), None);
        }

        if e.is_decode() {
            return ProviderError::InvalidResponse(e.to_string());
        }

        ProviderError::Network(e.to_string())
    }
}
