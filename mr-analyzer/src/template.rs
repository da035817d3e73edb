//! Prompt templates: `<prompts_dir>/<name>.yaml`, rendered by Tera with the
//! record bound to `mr`.
//!
//! Autoescaping is off; the output is a plain-text prompt, not HTML.

use std::error::Error as _;
use std::path::PathBuf;

use mr_store::MrRecord;
use tera::{Context, Tera};
use tracing::debug;

use crate::errors::TemplateError;

/// File extension of prompt templates.
pub const TEMPLATE_EXT: &str = "yaml";

/// Turns a record into a prompt using a named template.
#[allow(async_fn_in_trait)]
pub trait PromptRenderer {
    async fn render(&self, name: &str, record: &MrRecord) -> Result<String, TemplateError>;
}

/// Loads templates from a directory on every call and renders them with Tera.
#[derive(Debug, Clone)]
pub struct TeraPromptRenderer {
    dir: PathBuf,
}

impl TeraPromptRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the template `name`, or `None` if the name could escape the directory.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && !name.contains(['/', '\\'])
            && !name.contains("..")
            && !name.starts_with('.');
        valid.then(|| self.dir.join(format!("{name}.{TEMPLATE_EXT}")))
    }
}

impl PromptRenderer for TeraPromptRenderer {
    async fn render(&self, name: &str, record: &MrRecord) -> Result<String, TemplateError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(name.to_string()));
            }
            Err(e) => return Err(TemplateError::Io { path, source: e }),
        };

        let prompt = render_str(&source, record)?;
        debug!(
            template = name,
            path = %path.display(),
            prompt_len = prompt.len(),
            "prompt rendered"
        );
        Ok(prompt)
    }
}

/// Renders template text with `mr` bound to the record.
pub fn render_str(source: &str, record: &MrRecord) -> Result<String, TemplateError> {
    let mut ctx = Context::new();
    ctx.insert("mr", record);
    Tera::one_off(source, &ctx, false).map_err(|e| TemplateError::Render(error_chain(&e)))
}

// Tera puts the useful part (line, missing variable) in the source chain.
fn error_chain(e: &tera::Error) -> String {
    let mut msg = e.to_string();
    let mut cur = e.source();
    while let Some(inner) = cur {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        cur = inner.source();
    }
    msg
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mr_store::MrState;

    pub(crate) fn record() -> MrRecord {
        MrRecord {
            id: 42,
            iid: 7,
            title: "Fix loop".into(),
            description: String::new(),
            state: MrState::Merged,
            author: "alice".into(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 2, 10, 30, 0).unwrap(),
            merged_at: None,
            source_branch: "fix/loop".into(),
            target_branch: "main".into(),
            diff: "+x=1\n-x=0".into(),
            changes_count: 1,
            web_url: "https://gitlab.example.com/g/p/-/merge_requests/7".into(),
        }
    }

    #[test]
    fn fields_and_conditionals_render() {
        let out = render_str(
            "MR !{{ mr.iid }} {{ mr.title }} ({{ mr.state }})\n{% if mr.merged_at %}merged{% else %}not merged{% endif %}\n{{ mr.diff }}",
            &record(),
        )
        .unwrap();
        assert_eq!(out, "MR !7 Fix loop (merged)\nnot merged\n+x=1\n-x=0");
    }

    #[test]
    fn no_html_escaping() {
        let mut r = record();
        r.diff = "-if a < b && c > d {".into();
        assert_eq!(render_str("{{ mr.diff }}", &r).unwrap(), "-if a < b && c > d {");
    }

    #[test]
    fn syntax_and_unknown_variable_errors() {
        assert!(matches!(
            render_str("{% if %}", &record()),
            Err(TemplateError::Render(_))
        ));
        let Err(TemplateError::Render(msg)) = render_str("{{ mr.nope }}", &record()) else {
            panic!("expected render error");
        };
        assert!(msg.contains("nope"));
    }

    #[tokio::test]
    async fn names_are_resolved_inside_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("short.yaml"), "Review {{ mr.id }}").unwrap();
        let renderer = TeraPromptRenderer::new(tmp.path());

        assert_eq!(renderer.render("short", &record()).await.unwrap(), "Review 42");
        for bad in ["missing", "../short", "a/b", "", ".hidden"] {
            assert!(
                matches!(renderer.render(bad, &record()).await, Err(TemplateError::NotFound(_))),
                "{bad:?} should not resolve"
            );
        }
    }

    #[tokio::test]
    async fn rendering_is_deterministic() {
        let renderer = TeraPromptRenderer::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../prompts"));
        let a = renderer.render("default", &record()).await.unwrap();
        let b = renderer.render("default", &record()).await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("Fix loop"));
        assert!(a.contains("+x=1\n-x=0"));
    }
}
