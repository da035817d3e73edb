//! Extractor configuration resolved once at startup.
//!
//! # Environment variables
//!
//! - `GITLAB_URL`          = instance base URL (default `https://gitlab.com`)
//! - `GITLAB_TOKEN`        = personal/project access token (mandatory)
//! - `PROJECT_ID`          = numeric id or `group/project` path (mandatory)
//! - `START_DATE`          = window start (mandatory)
//! - `END_DATE`            = window end (mandatory)
//! - `MR_OUTPUT_DIR`       = record directory (default `mrs`)
//! - `GITLAB_TIMEOUT_SECS` = per-request timeout (default `30`)
//!
//! Timestamps accept RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`
//! (interpreted as UTC) and bare `YYYY-MM-DD`. A bare date is the start of
//! that day for `START_DATE` and the last nanosecond of that day for
//! `END_DATE`, so MRs updated at `23:59:59.500` still fall inside.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::errors::ConfigError;

pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
pub const DEFAULT_OUTPUT_DIR: &str = "mrs";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Inclusive time range applied to MR `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Which end of the window a bare date should snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parses a window timestamp in any supported format.
pub fn parse_timestamp(raw: &str, bound: Bound) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let time = match bound {
        Bound::Start => NaiveTime::from_hms_opt(0, 0, 0)?,
        Bound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)?,
    };
    Some(date.and_time(time).and_utc())
}

/// Fully resolved extractor settings.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Instance URL without the `/api/v4` suffix.
    pub gitlab_url: String,
    pub token: String,
    pub project: String,
    pub window: Window,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
}

impl ExtractorConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let must = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let token = must("GITLAB_TOKEN")?;
        let project = must("PROJECT_ID")?;

        let gitlab_url = get("GITLAB_URL").unwrap_or_else(|| DEFAULT_GITLAB_URL.to_string());
        let gitlab_url = gitlab_url.trim().trim_end_matches('/').to_string();
        if !(gitlab_url.starts_with("http://") || gitlab_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(gitlab_url));
        }

        let start_raw = must("START_DATE")?;
        let end_raw = must("END_DATE")?;
        let start = parse_timestamp(&start_raw, Bound::Start).ok_or(
            ConfigError::InvalidTimestamp {
                var: "START_DATE",
                value: start_raw.clone(),
            },
        )?;
        let end = parse_timestamp(&end_raw, Bound::End).ok_or(ConfigError::InvalidTimestamp {
            var: "END_DATE",
            value: end_raw.clone(),
        })?;
        let window = Window::new(start, end)?;

        let output_dir = get("MR_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let timeout_secs = match get("GITLAB_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "GITLAB_TIMEOUT_SECS",
                    value: v,
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            gitlab_url,
            token,
            project: project.trim().to_string(),
            window,
            output_dir,
            timeout_secs,
        })
    }

    /// REST v4 base, e.g. `https://gitlab.com/api/v4`.
    pub fn api_base(&self) -> String {
        format!("{}/api/v4", self.gitlab_url)
    }
}
