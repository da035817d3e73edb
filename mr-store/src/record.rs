//! The merge request record persisted by the extractor and read by the analyzer.
//!
//! The record is a flat, provider-agnostic snapshot of one MR at extraction
//! time. Field order here is the field order on disk, so two extractions of
//! unchanged upstream data serialize to identical bytes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle state of a merge request as reported by the provider.
///
/// Unknown values are carried through verbatim in [`MrState::Other`] so a
/// provider adding a new state never breaks extraction or loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MrState {
    Opened,
    Closed,
    Locked,
    Merged,
    Other(String),
}

impl MrState {
    pub fn as_str(&self) -> &str {
        match self {
            MrState::Opened => "opened",
            MrState::Closed => "closed",
            MrState::Locked => "locked",
            MrState::Merged => "merged",
            MrState::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for MrState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "opened" => MrState::Opened,
            "closed" => MrState::Closed,
            "locked" => MrState::Locked,
            "merged" => MrState::Merged,
            _ => MrState::Other(s),
        }
    }
}

impl From<&str> for MrState {
    fn from(s: &str) -> Self {
        MrState::from(s.to_string())
    }
}

impl From<MrState> for String {
    fn from(state: MrState) -> Self {
        match state {
            MrState::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MrRecord {
    /// Globally unique id; also the storage key.
    pub id: u64,
    /// Project-scoped sequential number.
    pub iid: u64,
    pub title: String,
    /// Free text; `null` in the source becomes an empty string.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    pub state: MrState,
    /// Author username.
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` when the MR was never merged.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    pub source_branch: String,
    pub target_branch: String,
    /// Unified diff text; empty for metadata-only or binary-only changes.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub diff: String,
    /// Number of changed files, approximate for very large MRs.
    #[serde(default)]
    pub changes_count: u32,
    pub web_url: String,
}

/// A representable but suspicious combination of record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    /// `state == merged` but `merged_at` is missing.
    MergedWithoutTimestamp,
    /// `merged_at` is set on an MR that is not in the merged state.
    TimestampWithoutMerge,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::MergedWithoutTimestamp => f.write_str("state is merged but merged_at is null"),
            Inconsistency::TimestampWithoutMerge => f.write_str("merged_at is set but state is not merged"),
        }
    }
}

impl MrRecord {
    /// Returns `true` when both identity fields are present.
    pub fn has_identity(&self) -> bool {
        self.id != 0 && self.iid != 0
    }

    /// Lists field combinations the provider allowed but callers may want to flag.
    ///
    /// Nothing here is enforced; records are a pass-through of provider data.
    pub fn inconsistencies(&self) -> Vec<Inconsistency> {
        let mut out = Vec::new();
        match (&self.state, self.merged_at) {
            (MrState::Merged, None) => out.push(Inconsistency::MergedWithoutTimestamp),
            (MrState::Merged, Some(_)) => {}
            (_, Some(_)) => out.push(Inconsistency::TimestampWithoutMerge),
            _ => {}
        }
        out
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
