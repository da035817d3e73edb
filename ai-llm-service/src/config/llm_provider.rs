use std::fmt;

/// Represents the provider (backend) used for chat completions.
///
/// Only OpenAI-compatible endpoints are spoken today; the enum keeps the
/// provider explicit in configs, logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI chat completions API (or a compatible gateway).
    OpenAI,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAI => f.write_str("openai"),
        }
    }
}
