//! OpenAI-compatible chat completion client with env-driven config and
//! unified errors.

pub mod config;
pub mod error_handler;
pub mod services;

pub use config::default_config::config_openai_from_env;
pub use config::llm_model_config::LlmModelConfig;
pub use error_handler::AiLlmError;
pub use services::{ChatCompletion, open_ai_service::OpenAiService};
