//! Provider seam for the extraction pipeline.
//!
//! The pipeline talks to [`MergeRequestSource`] only. [`gitlab::GitLabClient`]
//! is the production implementation; tests plug in in-memory fakes. The trait
//! uses native `async fn` and is consumed through generics, so there is no
//! `async-trait` and no boxed trait object on the hot path.

pub mod gitlab;
pub mod types;

pub use types::*;

use crate::config::Window;
use crate::errors::ProviderError;

/// Read-only access to a provider's merge requests.
#[allow(async_fn_in_trait)]
pub trait MergeRequestSource {
    /// Resolves the configured project identifier (id or `group/project`).
    async fn resolve_project(&self, project: &str) -> Result<ProjectRef, ProviderError>;

    /// Lists MRs updated within `window`, ascending by `updated_at`.
    ///
    /// Entries that do not decode come back as [`ListEntry::Malformed`]
    /// instead of failing the page.
    async fn list_merge_requests(
        &self,
        project: &ProjectRef,
        window: &Window,
        cursor: &PageCursor,
    ) -> Result<Page<ListEntry>, ProviderError>;

    /// Fetches the single-MR view (fields missing from the list view).
    async fn get_merge_request(
        &self,
        project: &ProjectRef,
        iid: u64,
    ) -> Result<MrDetail, ProviderError>;

    /// Fetches the whole unified diff of an MR as one text blob.
    async fn get_diff(&self, project: &ProjectRef, iid: u64) -> Result<String, ProviderError>;
}
