//! Small text helpers for GitLab responses: pagination headers, change counts
//! and unified diff assembly.

use crate::git_providers::types::DiffFile;

/// Heuristic to detect whether a unified diff text represents a binary patch.
///
/// This checks for common markers like `GIT binary patch`, `Binary files differ`
/// and the presence of NUL bytes.
pub fn looks_like_binary_patch(diff: &str) -> bool {
    if diff.contains("GIT binary patch") {
        return true;
    }
    if diff.contains("Binary files") || diff.contains("Files ") && diff.contains(" differ") {
        return true;
    }
    diff.bytes().any(|b| b == 0)
}

/// Extracts the `rel="next"` target from an RFC 8288 `Link` header.
///
/// Example: `<https://gitlab.com/api/v4/…&cursor=abc>; rel="next", <…>; rel="first"`
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        is_next.then(|| url.to_string())
    })
}

/// Parses GitLab's `changes_count` (`"12"`, `"1000+"`) into an integer.
///
/// Capped counts are returned as their lower bound.
pub fn parse_changes_count(raw: &str) -> Option<u32> {
    raw.trim().trim_end_matches('+').parse().ok()
}

/// Counts file sections (`diff --git` headers) in a unified diff.
pub fn count_file_sections(diff: &str) -> u32 {
    let n = diff
        .lines()
        .filter(|l| l.starts_with("diff --git "))
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Rebuilds one unified diff text from the per-file `/diffs` entries.
///
/// Each file gets a `diff --git` header and `---`/`+++` lines so the output
/// reads like `git diff`; files without a text body (binary, too large)
/// contribute their header plus a `Binary files … differ` marker.
pub fn assemble_unified_diff(files: &[DiffFile]) -> String {
    let mut out = String::new();
    for f in files {
        out.push_str(&format!("diff --git a/{} b/{}\n", f.old_path, f.new_path));
        if f.new_file {
            out.push_str("new file mode 100644\n");
        } else if f.deleted_file {
            out.push_str("deleted file mode 100644\n");
        } else if f.renamed_file {
            out.push_str(&format!("rename from {}\nrename to {}\n", f.old_path, f.new_path));
        }

        let old = if f.new_file {
            "/dev/null".to_string()
        } else {
            format!("a/{}", f.old_path)
        };
        let new = if f.deleted_file {
            "/dev/null".to_string()
        } else {
            format!("b/{}", f.new_path)
        };

        match f.diff.as_deref().filter(|d| !d.is_empty()) {
            Some(body) if !looks_like_binary_patch(body) => {
                out.push_str(&format!("--- {old}\n+++ {new}\n"));
                out.push_str(body);
                if !body.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => out.push_str(&format!("Binary files {old} and {new} differ\n")),
        }
    }
    out
}
