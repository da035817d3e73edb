pub mod config;
pub mod errors;
pub mod git_providers;

mod parser;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mr_store::{MrRecord, MrState, RecordStore};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ExtractorConfig, Window},
    errors::{ExtractorError, ExtractorResult},
    git_providers::gitlab::GitLabClient,
    git_providers::{ListEntry, MergeRequestSource, MrDetail, MrSummary, PageCursor, ProjectRef},
    parser::{count_file_sections, parse_changes_count},
};

/// One record written during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecord {
    pub id: u64,
    pub iid: u64,
    pub path: PathBuf,
}

/// One candidate that could not be turned into a record.
#[derive(Debug)]
pub struct FailedItem {
    /// `None` when the list entry was unreadable down to its iid.
    pub iid: Option<u64>,
    pub error: ExtractorError,
}

/// Outcome of a whole extraction run.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub project: String,
    pub pages: u32,
    pub listed: usize,
    pub saved: Vec<SavedRecord>,
    pub failed: Vec<FailedItem>,
    pub skipped_out_of_window: usize,
}

/// Runs the extraction against GitLab using the resolved configuration.
///
/// `on_saved` is called once per written record; the binary uses it to print
/// progress lines.
pub async fn run<F>(cfg: &ExtractorConfig, on_saved: F) -> ExtractorResult<ExtractionReport>
where
    F: FnMut(&MrRecord, &Path),
{
    let client = GitLabClient::from_config(cfg)?;
    let store = RecordStore::new(&cfg.output_dir);
    run_extraction(&client, &cfg.project, &cfg.window, &store, on_saved).await
}

/// Drains every MR page of `project` updated within `window` and writes one
/// record per MR into `store`.
///
/// This function is responsible for:
///   * resolving the project (failure aborts the run)
///   * following page cursors until the listing is exhausted
///   * fetching detail and diff per candidate, one at a time
///   * isolating per-candidate failures so the batch continues
///
/// A failing page request aborts the run; records written before it stay on disk.
pub async fn run_extraction<S, F>(
    source: &S,
    project: &str,
    window: &Window,
    store: &RecordStore,
    mut on_saved: F,
) -> ExtractorResult<ExtractionReport>
where
    S: MergeRequestSource,
    F: FnMut(&MrRecord, &Path),
{
    info!(
        project = %project,
        start = %window.start,
        end = %window.end,
        out = %store.root().display(),
        "extraction started"
    );

    let project_ref = source
        .resolve_project(project)
        .await
        .map_err(|source| ExtractorError::ProjectUnavailable {
            project: project.to_string(),
            source,
        })?;
    debug!(
        id = project_ref.id,
        path = %project_ref.path_with_namespace,
        "project resolved"
    );

    let mut report = ExtractionReport {
        project: project_ref.path_with_namespace.clone(),
        ..Default::default()
    };

    let mut cursor = PageCursor::First;
    let mut seen: HashSet<PageCursor> = HashSet::new();

    loop {
        if !seen.insert(cursor.clone()) {
            return Err(errors::ProviderError::InvalidResponse(format!(
                "pagination cursor repeated: {cursor:?}"
            ))
            .into());
        }

        let page = source
            .list_merge_requests(&project_ref, window, &cursor)
            .await?;
        report.pages += 1;
        report.listed += page.items.len();
        debug!(page = report.pages, items = page.items.len(), "MR page received");

        if page.items.is_empty() {
            break;
        }

        for entry in page.items {
            let summary = match entry {
                ListEntry::Mr(summary) => summary,
                ListEntry::Malformed { iid, reason } => {
                    error!(?iid, %reason, "unreadable MR list entry; continuing");
                    report.failed.push(FailedItem {
                        iid,
                        error: ExtractorError::Validation(format!(
                            "unreadable list entry: {reason}"
                        )),
                    });
                    continue;
                }
            };
            if !window.contains(summary.updated_at) {
                debug!(
                    iid = summary.iid,
                    updated_at = %summary.updated_at,
                    "MR outside window; skipped"
                );
                report.skipped_out_of_window += 1;
                continue;
            }

            let iid = summary.iid;
            match extract_one(source, &project_ref, summary, store).await {
                Ok((record, path)) => {
                    on_saved(&record, &path);
                    report.saved.push(SavedRecord {
                        id: record.id,
                        iid: record.iid,
                        path,
                    });
                }
                Err(e) => {
                    error!(iid, error = %e, "failed to extract MR; continuing");
                    report.failed.push(FailedItem {
                        iid: Some(iid),
                        error: e,
                    });
                }
            }
        }

        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    info!(
        pages = report.pages,
        listed = report.listed,
        saved = report.saved.len(),
        failed = report.failed.len(),
        skipped = report.skipped_out_of_window,
        "extraction finished"
    );

    Ok(report)
}

async fn extract_one<S: MergeRequestSource>(
    source: &S,
    project: &ProjectRef,
    summary: MrSummary,
    store: &RecordStore,
) -> ExtractorResult<(MrRecord, PathBuf)> {
    let detail = source.get_merge_request(project, summary.iid).await?;
    let diff = source.get_diff(project, summary.iid).await?;

    let record = assemble_record(summary, detail, diff)?;
    for issue in record.inconsistencies() {
        warn!(id = record.id, iid = record.iid, "record inconsistency: {issue}");
    }

    let path = store.save(&record).await?;
    Ok((record, path))
}

/// Builds the persisted record from the list entry, the detail view and the diff.
fn assemble_record(summary: MrSummary, detail: MrDetail, diff: String) -> ExtractorResult<MrRecord> {
    if summary.id == 0 || summary.iid == 0 {
        return Err(ExtractorError::Validation(format!(
            "MR without identity (id={}, iid={})",
            summary.id, summary.iid
        )));
    }
    if detail.iid != summary.iid {
        return Err(ExtractorError::Validation(format!(
            "detail iid {} does not match listed iid {}",
            detail.iid, summary.iid
        )));
    }

    let changes_count = detail
        .changes_count
        .as_deref()
        .and_then(parse_changes_count)
        .unwrap_or_else(|| count_file_sections(&diff));

    Ok(MrRecord {
        id: summary.id,
        iid: summary.iid,
        title: summary.title,
        description: summary
            .description
            .or(detail.description)
            .unwrap_or_default(),
        state: MrState::from(summary.state),
        author: summary.author.map(|a| a.username).unwrap_or_default(),
        created_at: summary.created_at,
        updated_at: summary.updated_at,
        merged_at: summary.merged_at,
        source_branch: summary.source_branch,
        target_branch: summary.target_branch,
        diff,
        changes_count,
        web_url: summary.web_url,
    })
}
