//! Prompt telemetry: optional dumping of the exact prompt sent to the model.
//!
//! ## What it does
//! - Writes the rendered prompt to `<results_dir>/prompts/mr_<id>_<template>.txt`.
//! - **Redacts secrets** (GitLab PATs, Bearer tokens, OpenAI-style `sk-` keys).
//! - Emits a concise DEBUG log line (length, file path).
//!
//! Enabled by `MR_ANALYZER_LOG_PROMPTS` ("1", "true", "yes", "on").
//! Dump failures are logged and never fail the analysis.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

const SECRET_PATTERNS: &[&str] = &[
    r"(?i)glpat-[A-Za-z0-9\.\-_]{16,}",
    r"(?i)Authorization:\s*Bearer\s+[A-Za-z0-9\-_\.=]{16,}",
    r"(?i)\bBearer\s+[A-Za-z0-9\-_\.=]{16,}",
    r"\bsk-[A-Za-z0-9\-_]{16,}",
    r"(?i)\btoken\s*[:=]\s*[A-Za-z0-9\-_\.=]{16,}",
];

static SECRET_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SECRET_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Returns `true` if the value reads as a truthy flag ("1", "true", "yes", "on").
pub fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Redact obvious secrets (best-effort; keep it conservative).
pub fn redact_secrets(mut s: String) -> String {
    for re in SECRET_RES.iter() {
        s = re.replace_all(&s, "[REDACTED]").into_owned();
    }
    s
}

/// Make a safe filename segment from a template name.
fn sanitize_for_name(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build `<results_dir>/prompts/mr_<id>_<template>.txt`.
pub fn dump_path(results_dir: &Path, mr_id: u64, template: &str) -> PathBuf {
    results_dir
        .join("prompts")
        .join(format!("mr_{}_{}.txt", mr_id, sanitize_for_name(template)))
}

/// Write the redacted prompt to its dump file; returns the path on success.
pub async fn dump_prompt(
    results_dir: &Path,
    mr_id: u64,
    template: &str,
    prompt: &str,
) -> Option<PathBuf> {
    let content = redact_secrets(prompt.to_string());
    let file = dump_path(results_dir, mr_id, template);

    match mr_store::write_atomic(&file, content.as_bytes()).await {
        Ok(()) => {
            debug!(
                "prompt mr={} template={} file={} len={}",
                mr_id,
                template,
                file.display(),
                content.chars().count()
            );
            Some(file)
        }
        Err(e) => {
            warn!(mr_id, error = %e, "failed to dump prompt");
            None
        }
    }
}
