//! GitLab provider (REST v4) for project lookup, windowed MR listing and diffs.
//!
//! Endpoints used:
//!   * GET /projects/:id
//!   * GET /projects/:id/merge_requests?updated_after=…&updated_before=…
//!   * GET /projects/:id/merge_requests/:iid
//!   * GET /projects/:id/merge_requests/:iid/raw_diffs
//!   * GET /projects/:id/merge_requests/:iid/diffs (fallback when raw_diffs is missing)

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::{Client, Response, Url, header};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ExtractorConfig, Window};
use crate::errors::{ExtractorResult, ProviderError};
use crate::git_providers::MergeRequestSource;
use crate::git_providers::types::*;
use crate::parser::{assemble_unified_diff, parse_next_link};

/// Fixed page size for every listing.
pub const PAGE_SIZE: u32 = 100;

/// GitLab HTTP client wrapper.
#[derive(Debug)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
    keyset_unsupported: AtomicBool,
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared HTTP instance and auth token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        debug!("Creating GitLabClient with base_api={}", base_api);
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
            keyset_unsupported: AtomicBool::new(false),
        }
    }

    /// Builds the HTTP client (user agent, timeout) from extractor config.
    pub fn from_config(cfg: &ExtractorConfig) -> ExtractorResult<Self> {
        let http = Client::builder()
            .user_agent("mr-extractor/0.1")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self::new(http, cfg.api_base(), cfg.token.clone()))
    }

    fn project_url(&self, project: &ProjectRef) -> String {
        format!("{}/projects/{}", self.base_api, project.id)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ProviderError> {
        debug!("GitLab GET {}", url);
        let resp = self
            .http
            .get(url)
            .query(query)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        check_status(resp)
    }

    fn window_query(&self, window: &Window) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("state", "all".to_string()),
            (
                "updated_after",
                window.start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            (
                "updated_before",
                window.end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            ("order_by", "updated_at".to_string()),
            ("sort", "asc".to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        if !self.keyset_unsupported.load(Ordering::Relaxed) {
            q.push(("pagination", "keyset".to_string()));
        }
        q
    }

    /// Pages through `GET …/diffs` and stitches the files into one unified diff.
    async fn get_diff_from_files(
        &self,
        project: &ProjectRef,
        iid: u64,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/merge_requests/{}/diffs", self.project_url(project), iid);
        let mut files: Vec<DiffFile> = Vec::new();
        let mut page: u32 = 1;

        loop {
            let resp = self
                .get(
                    &url,
                    &[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())],
                )
                .await?;
            let next = next_page_number(&resp);
            let batch: Vec<DiffFile> = decode(resp).await?;
            let empty = batch.is_empty();
            files.extend(batch);

            match next {
                Some(n) if n > page && !empty => page = n,
                _ => break,
            }
        }

        debug!(iid, files = files.len(), "assembled diff from file list");
        Ok(assemble_unified_diff(&files))
    }
}

impl MergeRequestSource for GitLabClient {
    async fn resolve_project(&self, project: &str) -> Result<ProjectRef, ProviderError> {
        let url = format!(
            "{}/projects/{}",
            self.base_api,
            urlencoding::encode(project)
        );
        let resp = self.get(&url, &[]).await?;
        decode(resp).await
    }

    async fn list_merge_requests(
        &self,
        project: &ProjectRef,
        window: &Window,
        cursor: &PageCursor,
    ) -> Result<Page<ListEntry>, ProviderError> {
        let list_url = format!("{}/merge_requests", self.project_url(project));

        let resp = match cursor {
            PageCursor::First => match self.get(&list_url, &self.window_query(window)).await {
                // Older instances reject keyset pagination on this endpoint.
                Err(ProviderError::HttpStatus(code @ (400 | 405))) => {
                    warn!(
                        status = code,
                        "keyset pagination rejected; falling back to offset pagination"
                    );
                    self.keyset_unsupported.store(true, Ordering::Relaxed);
                    self.get(&list_url, &self.window_query(window)).await?
                }
                other => other?,
            },
            PageCursor::Page(n) => {
                let mut q = self.window_query(window);
                q.push(("page", n.to_string()));
                self.get(&list_url, &q).await?
            }
            PageCursor::Url(next) => {
                let Some(url) = rebase_next_link(&self.base_api, next) else {
                    return Err(ProviderError::InvalidResponse(format!(
                        "next page link leaves the API base: {next}"
                    )));
                };
                if url != *next {
                    warn!(link = %next, using = %url, "next page link rewritten onto the configured base");
                }
                self.get(&url, &[]).await?
            }
        };

        let next = next_cursor(&resp);
        let raw: Vec<serde_json::Value> = decode(resp).await?;
        let items: Vec<ListEntry> = raw.into_iter().map(ListEntry::from_value).collect();
        debug!(count = items.len(), has_next = next.is_some(), "GitLab MR page");

        Ok(Page { items, next })
    }

    async fn get_merge_request(
        &self,
        project: &ProjectRef,
        iid: u64,
    ) -> Result<MrDetail, ProviderError> {
        let url = format!("{}/merge_requests/{}", self.project_url(project), iid);
        let resp = self.get(&url, &[]).await?;
        decode(resp).await
    }

    async fn get_diff(&self, project: &ProjectRef, iid: u64) -> Result<String, ProviderError> {
        let url = format!("{}/merge_requests/{}/raw_diffs", self.project_url(project), iid);
        match self.get(&url, &[]).await {
            Ok(resp) => Ok(resp.text().await?),
            Err(ProviderError::NotFound) => {
                debug!(iid, "raw_diffs unavailable; using per-file diffs");
                self.get_diff_from_files(project, iid).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Turns non-2xx responses into provider errors (keeps `Retry-After` on 429).
fn check_status(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    debug!(status = status.as_u16(), url = %resp.url(), "GitLab returned non-success status");
    Err(ProviderError::from_status(status.as_u16(), retry_after))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn next_page_number(resp: &Response) -> Option<u32> {
    resp.headers()
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u32>().ok())
}

/// Prefers the keyset `Link` header, then the offset `X-Next-Page` header.
fn next_cursor(resp: &Response) -> Option<PageCursor> {
    let link = resp
        .headers()
        .get(header::LINK)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_next_link);
    match link {
        Some(url) => Some(PageCursor::Url(url)),
        None => next_page_number(resp).map(PageCursor::Page),
    }
}

/// Maps a `Link` next URL onto the configured API base.
///
/// Instances behind a proxy may answer with another scheme, an upper-case
/// host or an explicit port. Such links are moved onto `base_api` as long as
/// the host matches and the path stays under the API prefix. Anything else
/// is `None` so the token never goes to another host.
fn rebase_next_link(base_api: &str, next: &str) -> Option<String> {
    let base = Url::parse(base_api).ok()?;
    let link = Url::parse(next).ok()?;
    if !link.host_str()?.eq_ignore_ascii_case(base.host_str()?) {
        return None;
    }
    let prefix = base.path().trim_end_matches('/');
    let rest = link.path().strip_prefix(prefix)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }

    let mut out = base;
    out.set_path(link.path());
    out.set_query(link.query());
    Some(out.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    const BASE: &str = "https://gitlab.example.com/api/v4";

    #[test]
    fn links_on_the_same_host_are_rebased() {
        let same = format!("{BASE}/projects/5/merge_requests?cursor=abc&per_page=100");
        assert_eq!(rebase_next_link(BASE, &same).as_deref(), Some(same.as_str()));

        for variant in [
            "http://gitlab.example.com/api/v4/projects/5/merge_requests?cursor=abc",
            "https://GitLab.Example.com/api/v4/projects/5/merge_requests?cursor=abc",
            "https://gitlab.example.com:443/api/v4/projects/5/merge_requests?cursor=abc",
        ] {
            assert_eq!(
                rebase_next_link(BASE, variant).as_deref(),
                Some("https://gitlab.example.com/api/v4/projects/5/merge_requests?cursor=abc"),
                "{variant}"
            );
        }
    }

    #[test]
    fn links_elsewhere_are_refused() {
        for bad in [
            "https://evil.example/api/v4/projects/5/merge_requests?cursor=x",
            "https://gitlab.example.com/api/v4x/projects/5",
            "https://gitlab.example.com/other/projects/5",
            "not a url",
        ] {
            assert_eq!(rebase_next_link(BASE, bad), None, "{bad}");
        }
    }

    #[test]
    fn window_query_keeps_sub_second_bounds() {
        let client = GitLabClient::new(Client::new(), BASE.to_string(), "t".into());
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap()
            + Duration::nanoseconds(999_999_999);
        let q = client.window_query(&Window::new(start, end).unwrap());
        let get = |k: &str| q.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());

        assert_eq!(get("updated_after"), Some("2024-03-01T00:00:00Z"));
        assert_eq!(get("updated_before"), Some("2024-03-31T23:59:59.999999999Z"));
        assert_eq!(get("pagination"), Some("keyset"));

        client.keyset_unsupported.store(true, Ordering::Relaxed);
        let q = client.window_query(&Window::new(start, end).unwrap());
        assert!(q.iter().all(|(n, _)| *n != "pagination"));
    }
}
