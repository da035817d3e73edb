//! Extracts every merge request updated within the configured window into
//! `<MR_OUTPUT_DIR>/<id>.json`.

use anyhow::Context;
use tracing::warn;

use mr_extractor::config::ExtractorConfig;
use mr_perf::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables take precedence.
    dotenvy::dotenv().ok();
    telemetry::init();

    let cfg = ExtractorConfig::from_env()
        .context("set GITLAB_TOKEN, PROJECT_ID, START_DATE and END_DATE")?;

    let report = mr_extractor::run(&cfg, |record, path| {
        println!(
            "Saved MR !{}: {} ({})",
            record.iid,
            record.title,
            path.display()
        );
    })
    .await
    .with_context(|| format!("extraction for project {} aborted", cfg.project))?;

    for failed in &report.failed {
        warn!(iid = failed.iid, error = %failed.error, "MR not saved");
    }

    Ok(())
}
