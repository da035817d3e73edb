//! Default LLM config loaded strictly from environment variables.
//!
//! # Environment variables
//!
//! - `OPENAI_API_KEY`   = API key (mandatory)
//! - `MODEL_NAME`       = model id (default `gpt-3.5-turbo`)
//! - `OPENAI_BASE_URL`  = API base (default `https://api.openai.com`; a trailing `/v1` is accepted)
//! - `LLM_MAX_TOKENS`   = max output tokens (default `1500`)
//! - `LLM_TIMEOUT_SECS` = request timeout (default `120`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, must_var, opt_u32_var, opt_var, validate_http_endpoint},
};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Sampling temperature for analysis requests.
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// Constructs the OpenAI chat config from the process environment.
///
/// # Defaults
/// - `temperature = Some(0.3)`
/// - `max_tokens = Some(1500)`
/// - `timeout_secs = Some(120)`
pub fn config_openai_from_env() -> Result<LlmModelConfig, AiLlmError> {
    config_openai_from(&|k: &str| std::env::var(k).ok())
}

/// Same as [`config_openai_from_env`], reading variables through `lookup`.
pub fn config_openai_from<F>(lookup: &F) -> Result<LlmModelConfig, AiLlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = must_var(lookup, "OPENAI_API_KEY")?;
    let model = opt_var(lookup, "MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let endpoint = opt_var(lookup, "OPENAI_BASE_URL")
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
    validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
    let endpoint = endpoint
        .trim_end_matches('/')
        .trim_end_matches("/v1")
        .to_string();

    let max_tokens = opt_u32_var(lookup, "LLM_MAX_TOKENS")?.unwrap_or(DEFAULT_MAX_TOKENS);
    let timeout_secs = opt_u32_var(lookup, "LLM_TIMEOUT_SECS")?
        .map(u64::from)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: Some(max_tokens),
        temperature: Some(ANALYSIS_TEMPERATURE),
        top_p: None,
        timeout_secs: Some(timeout_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::ConfigError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = config_openai_from(&lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(cfg.provider, LlmProvider::OpenAI);
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.endpoint, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(cfg.max_tokens, Some(1500));
        assert_eq!(cfg.temperature, Some(0.3));
        assert_eq!(cfg.timeout_secs, Some(120));
        assert!(!format!("{cfg:?}").contains("sk-test"));
    }

    #[test]
    fn overrides_and_v1_suffix() {
        let cfg = config_openai_from(&lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4o-mini"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ("LLM_MAX_TOKENS", "800"),
        ]))
        .unwrap();
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.endpoint, "http://localhost:8080");
        assert_eq!(cfg.max_tokens, Some(800));
    }

    #[test]
    fn missing_key_and_bad_values() {
        assert!(matches!(
            config_openai_from(&lookup(&[])),
            Err(AiLlmError::Config(ConfigError::MissingVar("OPENAI_API_KEY")))
        ));
        assert!(matches!(
            config_openai_from(&lookup(&[("OPENAI_API_KEY", "k"), ("OPENAI_BASE_URL", "api.openai.com")])),
            Err(AiLlmError::Config(ConfigError::InvalidFormat { var: "OPENAI_BASE_URL", .. }))
        ));
        assert!(matches!(
            config_openai_from(&lookup(&[("OPENAI_API_KEY", "k"), ("LLM_MAX_TOKENS", "-1")])),
            Err(AiLlmError::Config(ConfigError::InvalidNumber { var: "LLM_MAX_TOKENS", .. }))
        ));
    }
}
