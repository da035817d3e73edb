//! One analysis invocation: load a record, render its prompt, ask the model,
//! print the answer and optionally keep it on disk.
//!
//! # Environment variables
//!
//! - `MR_PROMPTS_DIR`          = template directory (default `prompts`)
//! - `MR_RESULTS_DIR`          = result directory (default `analysis_results`)
//! - `MR_ANALYZER_LOG_PROMPTS` = dump rendered prompts (default off)

use std::io::Write;
use std::path::PathBuf;

use ai_llm_service::ChatCompletion;
use mr_store::{ResultStore, load_record};
use tracing::{error, info};

use crate::errors::{AnalysisStage, AnalyzerError, AnalyzerResult};
use crate::telemetry::prompt_dump;
use crate::template::PromptRenderer;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_RESULTS_DIR: &str = "analysis_results";
pub const DEFAULT_TEMPLATE: &str = "default";
pub const SYSTEM_PROMPT: &str = "You are a professional code performance analysis expert.";

/// Header line printed above the analysis text.
pub const RESULT_HEADER: &str = "===== Analysis result =====";

/// Analyzer settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub prompts_dir: PathBuf,
    pub results_dir: PathBuf,
    pub system_prompt: String,
    pub log_prompts: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            prompts_dir: PathBuf::from(DEFAULT_PROMPTS_DIR),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            system_prompt: SYSTEM_PROMPT.to_string(),
            log_prompts: false,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            prompts_dir: get("MR_PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompts_dir),
            results_dir: get("MR_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            system_prompt: defaults.system_prompt,
            log_prompts: get("MR_ANALYZER_LOG_PROMPTS").is_some_and(|v| prompt_dump::is_truthy(&v)),
        }
    }
}

/// What to analyze and whether to keep the answer.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub record_path: PathBuf,
    pub template: String,
    pub persist: bool,
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub mr_id: u64,
    pub iid: u64,
    pub text: String,
    pub saved_to: Option<PathBuf>,
}

/// Runs analyses against one chat model and one template source.
pub struct Analyzer<C, R> {
    llm: C,
    renderer: R,
    results: ResultStore,
    cfg: AnalyzerConfig,
}

impl<C, R> Analyzer<C, R>
where
    C: ChatCompletion,
    R: PromptRenderer,
{
    pub fn new(llm: C, renderer: R, cfg: AnalyzerConfig) -> Self {
        let results = ResultStore::new(&cfg.results_dir);
        Self {
            llm,
            renderer,
            results,
            cfg,
        }
    }

    /// Runs one analysis and writes the human-readable output to `out`.
    ///
    /// Nothing is written to `out` and no result file is created unless the
    /// model call succeeds.
    pub async fn run<W: Write>(
        &self,
        req: &AnalysisRequest,
        out: &mut W,
    ) -> AnalyzerResult<AnalysisOutcome> {
        let result = self.run_inner(req, out).await;
        if let Err(e) = &result {
            error!(
                path = %req.record_path.display(),
                template = %req.template,
                stage = %e.stage(),
                outcome = %AnalysisStage::Failed,
                error = %e,
                "analysis failed"
            );
        }
        result
    }

    async fn run_inner<W: Write>(
        &self,
        req: &AnalysisRequest,
        out: &mut W,
    ) -> AnalyzerResult<AnalysisOutcome> {
        let record = load_record(&req.record_path)
            .await
            .map_err(|source| AnalyzerError::Load {
                path: req.record_path.clone(),
                source,
            })?;
        info!(
            stage = %AnalysisStage::Loaded,
            id = record.id,
            iid = record.iid,
            "record loaded"
        );
        for issue in record.inconsistencies() {
            info!(id = record.id, "record inconsistency: {issue}");
        }

        let prompt = self.renderer.render(&req.template, &record).await?;
        info!(
            stage = %AnalysisStage::Rendered,
            template = %req.template,
            prompt_len = prompt.len(),
            "prompt rendered"
        );
        if self.cfg.log_prompts {
            prompt_dump::dump_prompt(&self.cfg.results_dir, record.id, &req.template, &prompt)
                .await;
        }

        info!(
            stage = %AnalysisStage::Requested,
            model = %self.llm.model(),
            iid = record.iid,
            "analyzing MR"
        );
        let text = self
            .llm
            .generate(&prompt, Some(&self.cfg.system_prompt))
            .await
            .map_err(AnalyzerError::Model)?;

        writeln!(out, "\n{RESULT_HEADER}\n").map_err(AnalyzerError::Output)?;
        writeln!(out, "{text}").map_err(AnalyzerError::Output)?;

        let saved_to = if req.persist {
            let path = self
                .results
                .save(record.id, &text)
                .await
                .map_err(AnalyzerError::Persist)?;
            writeln!(out, "\nAnalysis saved to: {}", path.display()).map_err(AnalyzerError::Output)?;
            Some(path)
        } else {
            None
        };

        info!(
            stage = %AnalysisStage::Succeeded,
            id = record.id,
            saved = saved_to.is_some(),
            "analysis finished"
        );

        Ok(AnalysisOutcome {
            mr_id: record.id,
            iid: record.iid,
            text,
            saved_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TemplateError;
    use crate::template::TeraPromptRenderer;
    use crate::template::tests::record;
    use ai_llm_service::AiLlmError;
    use ai_llm_service::config::llm_provider::LlmProvider;
    use ai_llm_service::error_handler::{ProviderError, ProviderErrorKind};
    use std::path::Path;
    use std::sync::Mutex;

    /// Chat model returning a canned answer and recording what it was sent.
    struct StubModel {
        answer: Option<String>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl StubModel {
        fn answering(text: &str) -> Self {
            Self {
                answer: Some(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl ChatCompletion for StubModel {
        async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.map(str::to_string)));
            self.answer.clone().ok_or_else(|| {
                ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::EmptyChoices).into()
            })
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        record_path: PathBuf,
        cfg: AnalyzerConfig,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let records = tmp.path().join("mrs");
        std::fs::create_dir_all(&records).unwrap();
        let record_path = records.join("42.json");
        std::fs::write(&record_path, serde_json::to_vec_pretty(&record()).unwrap()).unwrap();

        let cfg = AnalyzerConfig {
            prompts_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../prompts")),
            results_dir: tmp.path().join("analysis_results"),
            ..AnalyzerConfig::default()
        };
        Fixture {
            _tmp: tmp,
            record_path,
            cfg,
        }
    }

    fn request(path: &Path, template: &str, persist: bool) -> AnalysisRequest {
        AnalysisRequest {
            record_path: path.to_path_buf(),
            template: template.to_string(),
            persist,
        }
    }

    #[tokio::test]
    async fn stubbed_answer_is_printed_and_saved() {
        let fx = fixture();
        let analyzer = Analyzer::new(
            StubModel::answering("Looks fine."),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );

        let mut out = Vec::new();
        let outcome = analyzer
            .run(&request(&fx.record_path, "default", true), &mut out)
            .await
            .unwrap();

        let saved = fx.cfg.results_dir.join("mr_42_analysis.txt");
        assert_eq!(outcome.mr_id, 42);
        assert_eq!(outcome.saved_to.as_deref(), Some(saved.as_path()));
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), "Looks fine.");

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(&format!("{RESULT_HEADER}\n\nLooks fine.\n")));

        let seen = analyzer.llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("Fix loop"));
        assert_eq!(seen[0].1.as_deref(), Some(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn without_save_no_file_is_written() {
        let fx = fixture();
        let analyzer = Analyzer::new(
            StubModel::answering("ok"),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );
        let mut out = Vec::new();
        let outcome = analyzer
            .run(&request(&fx.record_path, "default", false), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome.saved_to, None);
        assert!(!fx.cfg.results_dir.exists());
    }

    #[tokio::test]
    async fn missing_record_produces_nothing() {
        let fx = fixture();
        let analyzer = Analyzer::new(
            StubModel::answering("Looks fine."),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );
        let missing = fx.record_path.with_file_name("999.json");

        let mut out = Vec::new();
        let err = analyzer
            .run(&request(&missing, "default", true), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::Load { .. }));
        assert_eq!(err.stage(), AnalysisStage::Loaded);
        assert!(out.is_empty());
        assert!(!fx.cfg.results_dir.exists());
        assert_eq!(analyzer.llm.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_record_is_a_load_error() {
        let fx = fixture();
        std::fs::write(&fx.record_path, b"{not json").unwrap();
        let analyzer = Analyzer::new(
            StubModel::answering("x"),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );
        let mut out = Vec::new();
        let err = analyzer
            .run(&request(&fx.record_path, "default", true), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Load { .. }));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn unknown_template_stops_before_the_model() {
        let fx = fixture();
        let analyzer = Analyzer::new(
            StubModel::answering("x"),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );
        let mut out = Vec::new();
        let err = analyzer
            .run(&request(&fx.record_path, "no-such-template", true), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Template(TemplateError::NotFound(ref n)) if n == "no-such-template"
        ));
        assert_eq!(analyzer.llm.calls(), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn model_failure_leaves_no_artifact() {
        let fx = fixture();
        let analyzer = Analyzer::new(
            StubModel::failing(),
            TeraPromptRenderer::new(&fx.cfg.prompts_dir),
            fx.cfg.clone(),
        );
        let mut out = Vec::new();
        let err = analyzer
            .run(&request(&fx.record_path, "default", true), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Model(_)));
        assert_eq!(err.stage(), AnalysisStage::Requested);
        assert!(out.is_empty());
        assert!(!fx.cfg.results_dir.join("mr_42_analysis.txt").exists());
    }

    #[tokio::test]
    async fn prompt_dump_is_opt_in() {
        let fx = fixture();
        let mut cfg = fx.cfg.clone();
        cfg.log_prompts = true;
        let analyzer = Analyzer::new(
            StubModel::answering("ok"),
            TeraPromptRenderer::new(&cfg.prompts_dir),
            cfg.clone(),
        );
        let mut out = Vec::new();
        analyzer
            .run(&request(&fx.record_path, "default", false), &mut out)
            .await
            .unwrap();
        let dumped = cfg.results_dir.join("prompts").join("mr_42_default.txt");
        assert!(std::fs::read_to_string(dumped).unwrap().contains("Fix loop"));
    }

    #[test]
    fn config_from_lookup() {
        let cfg = AnalyzerConfig::from_lookup(|k| match k {
            "MR_RESULTS_DIR" => Some("out".to_string()),
            "MR_ANALYZER_LOG_PROMPTS" => Some("true".to_string()),
            "MR_PROMPTS_DIR" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.results_dir, PathBuf::from("out"));
        assert_eq!(cfg.prompts_dir, PathBuf::from(DEFAULT_PROMPTS_DIR));
        assert!(cfg.log_prompts);
        assert_eq!(cfg.system_prompt, SYSTEM_PROMPT);
    }
}
