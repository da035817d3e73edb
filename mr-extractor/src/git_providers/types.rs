//! Data model exchanged between the GitLab client and the extraction pipeline.
//!
//! List/detail payloads deserialize straight from GitLab REST v4 responses;
//! only the fields the record needs are declared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A resolved project (result of `GET /projects/:id`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    pub id: u64,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub web_url: String,
}

/// Position in a paginated listing.
///
/// GitLab answers keyset-paginated requests with a `Link: <…>; rel="next"`
/// header holding the complete next URL, and offset-paginated requests with
/// `X-Next-Page`. Both are carried here so the pipeline stays agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageCursor {
    /// First request, built from the window query.
    First,
    /// Opaque next URL taken from the `Link` header.
    Url(String),
    /// Offset page number taken from `X-Next-Page`.
    Page(u32),
}

/// One page of a listing plus the cursor of the following page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` when this is the last page.
    pub next: Option<PageCursor>,
}

/// Author object embedded in MR payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MrAuthor {
    #[serde(default)]
    pub username: String,
}

/// MR entry as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MrSummary {
    pub id: u64,
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    pub author: Option<MrAuthor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    #[serde(default)]
    pub web_url: String,
}

/// One entry of a listing page.
///
/// Entries are decoded one by one so a single odd payload cannot sink the
/// rest of its page.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    Mr(MrSummary),
    /// Did not match [`MrSummary`]; `iid` is kept when it could be read.
    Malformed { iid: Option<u64>, reason: String },
}

impl ListEntry {
    pub fn from_value(value: serde_json::Value) -> Self {
        let iid = value.get("iid").and_then(serde_json::Value::as_u64);
        match serde_json::from_value::<MrSummary>(value) {
            Ok(summary) => ListEntry::Mr(summary),
            Err(e) => ListEntry::Malformed {
                iid,
                reason: e.to_string(),
            },
        }
    }
}

impl From<MrSummary> for ListEntry {
    fn from(summary: MrSummary) -> Self {
        ListEntry::Mr(summary)
    }
}

/// Fields only available from the single-MR endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MrDetail {
    pub id: u64,
    pub iid: u64,
    /// GitLab sends a string such as `"12"` or `"1000+"`; older versions a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub changes_count: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One file entry of `GET …/merge_requests/:iid/diffs`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiffFile {
    #[serde(default)]
    pub old_path: String,
    #[serde(default)]
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    /// Unified diff body; empty/None for binary or too-large files.
    #[serde(default)]
    pub diff: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_accepts_string_number_and_null_counts() {
        let a: MrDetail = serde_json::from_str(r#"{"id":1,"iid":2,"changes_count":"1000+"}"#).unwrap();
        assert_eq!(a.changes_count.as_deref(), Some("1000+"));
        let b: MrDetail = serde_json::from_str(r#"{"id":1,"iid":2,"changes_count":3}"#).unwrap();
        assert_eq!(b.changes_count.as_deref(), Some("3"));
        let c: MrDetail = serde_json::from_str(r#"{"id":1,"iid":2,"changes_count":null}"#).unwrap();
        assert_eq!(c.changes_count, None);
    }

    #[test]
    fn summary_tolerates_missing_optional_fields() {
        let s: MrSummary = serde_json::from_str(
            r#"{
                "id": 10, "iid": 3, "title": "x", "description": null,
                "state": "opened", "author": {"id": 5, "username": "eve", "name": "Eve"},
                "created_at": "2024-03-01T10:00:00.000Z",
                "updated_at": "2024-03-02T10:00:00.000+00:00",
                "merged_at": null
            }"#,
        )
        .unwrap();
        assert_eq!(s.author.unwrap().username, "eve");
        assert_eq!(s.merged_at, None);
        assert_eq!(s.source_branch, "");
    }

    #[test]
    fn bad_entry_keeps_its_iid() {
        let good = ListEntry::from_value(serde_json::json!({
            "id": 11, "iid": 4,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }));
        assert!(matches!(good, ListEntry::Mr(ref s) if s.iid == 4));

        let bad = ListEntry::from_value(serde_json::json!({
            "id": 12, "iid": 5,
            "created_at": null,
            "updated_at": "2024-03-01T10:00:00Z"
        }));
        let ListEntry::Malformed { iid, reason } = bad else {
            panic!("expected a malformed entry");
        };
        assert_eq!(iid, Some(5));
        assert!(reason.contains("invalid type"));

        let no_iid = ListEntry::from_value(serde_json::json!("garbage"));
        assert!(matches!(no_iid, ListEntry::Malformed { iid: None, .. }));
    }
}
