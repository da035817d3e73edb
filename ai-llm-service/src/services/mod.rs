pub mod open_ai_service;

use crate::error_handler::AiLlmError;

/// Single-turn chat completion.
///
/// Implemented by [`open_ai_service::OpenAiService`]; callers take it as a
/// generic so tests can substitute canned responses.
#[allow(async_fn_in_trait)]
pub trait ChatCompletion {
    /// Sends `prompt` as the user turn, preceded by an optional system turn.
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}
