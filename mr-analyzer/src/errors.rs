//! Crate-wide error hierarchy for mr-analyzer.
//!
//! Every failure names the [`AnalysisStage`] the invocation was entering, so
//! the binary can report where a run stopped without re-deriving it.

use std::fmt;
use std::path::PathBuf;

use ai_llm_service::AiLlmError;
use mr_store::StoreError;
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Progress of one analysis invocation.
///
/// `Loaded → Rendered → Requested → {Succeeded | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Loaded,
    Rendered,
    Requested,
    Succeeded,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisStage::Loaded => "loaded",
            AnalysisStage::Rendered => "rendered",
            AnalysisStage::Requested => "requested",
            AnalysisStage::Succeeded => "succeeded",
            AnalysisStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Root error type for the mr-analyzer crate.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Record file missing, unreadable or not a valid record.
    #[error("cannot load MR record {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// Template could not be resolved or rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Chat completion failed.
    #[error("model request failed: {0}")]
    Model(#[source] AiLlmError),

    /// Analysis text could not be written to stdout.
    #[error("cannot write analysis output: {0}")]
    Output(#[source] std::io::Error),

    /// Analysis succeeded but the result file could not be written.
    #[error("cannot persist analysis result: {0}")]
    Persist(#[source] StoreError),
}

impl AnalyzerError {
    /// Stage the invocation was entering when it failed.
    pub fn stage(&self) -> AnalysisStage {
        match self {
            AnalyzerError::Load { .. } => AnalysisStage::Loaded,
            AnalyzerError::Template(_) => AnalysisStage::Rendered,
            AnalyzerError::Model(_) => AnalysisStage::Requested,
            AnalyzerError::Output(_) | AnalyzerError::Persist(_) => AnalysisStage::Succeeded,
        }
    }
}

/// Prompt template failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template with that name in the prompt directory (or an illegal name).
    #[error("template not found: {0}")]
    NotFound(String),

    /// Template file exists but could not be read.
    #[error("cannot read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template syntax error or a failure while rendering it.
    #[error("template render failed: {0}")]
    Render(String),
}
