pub mod analyzer;
pub mod errors;
pub mod template;

pub mod telemetry {
    pub mod prompt_dump;
}

pub use analyzer::{AnalysisOutcome, AnalysisRequest, Analyzer, AnalyzerConfig};
pub use errors::{AnalysisStage, AnalyzerError, AnalyzerResult, TemplateError};
pub use template::{PromptRenderer, TeraPromptRenderer};
