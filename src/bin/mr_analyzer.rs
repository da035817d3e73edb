//! Runs a performance analysis prompt for one extracted merge request.

use std::path::PathBuf;
use std::process::ExitCode;

use ai_llm_service::{OpenAiService, config_openai_from_env};
use anyhow::Context;
use clap::Parser;

use mr_analyzer::analyzer::DEFAULT_TEMPLATE;
use mr_analyzer::{AnalysisRequest, Analyzer, AnalyzerConfig, TeraPromptRenderer};
use mr_perf::telemetry;

/// Exit status for a failed analysis under `--strict`.
const EXIT_ANALYSIS_FAILED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "mr-analyzer", version, about = "MR performance analysis tool")]
struct Args {
    /// Path to an MR record JSON file
    mr_file: PathBuf,

    /// Prompt template name (looked up as <MR_PROMPTS_DIR>/<name>.yaml)
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    template: String,

    /// Save the analysis result to <MR_RESULTS_DIR>/mr_<id>_analysis.txt
    #[arg(short, long)]
    save: bool,

    /// Exit with status 2 when the analysis fails (default: report and exit 0)
    #[arg(long)]
    strict: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init();

    let llm_cfg = config_openai_from_env().context("set OPENAI_API_KEY")?;
    let llm = OpenAiService::new(llm_cfg).context("cannot create the chat client")?;

    let cfg = AnalyzerConfig::from_env();
    let renderer = TeraPromptRenderer::new(&cfg.prompts_dir);
    let analyzer = Analyzer::new(llm, renderer, cfg);

    let req = AnalysisRequest {
        record_path: args.mr_file,
        template: args.template,
        persist: args.save,
    };

    let mut stdout = std::io::stdout().lock();
    match analyzer.run(&req, &mut stdout).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("analysis failed at stage {}: {e}", e.stage());
            if args.strict {
                Ok(ExitCode::from(EXIT_ANALYSIS_FAILED))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
