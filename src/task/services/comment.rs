//! Thread comment posted after each execution.

use crate::task::domain::{COMMENT_HEADER, Execution};
use minijinja::{Environment, context};

/// Lines of summary kept in a comment.
pub const COMMENT_MAX_LINES: usize = 3;

/// Characters of summary kept in a comment.
pub const COMMENT_MAX_CHARS: usize = 500;

const COMMENT_TEMPLATE: &str = "\
{{ header }}

## Claude Code Execution Result

**Status:** {{ status }}
**Duration:** {{ duration }}

### Summary
{{ summary }}

---
*Executed by vibe-runner*";

/// Renders the comment describing `execution`.
///
/// # Errors
///
/// Returns the template engine error when rendering fails.
pub fn render_comment(execution: &Execution) -> Result<String, minijinja::Error> {
    let status = if execution.success {
        "✅ Completed"
    } else {
        "❌ Failed"
    };
    Environment::new().render_str(
        COMMENT_TEMPLATE,
        context! {
            header => COMMENT_HEADER,
            status => status,
            duration => format!("{:.1}s", execution.duration().as_secs_f64()),
            summary => comment_digest(&execution.summary()),
        },
    )
}

/// Shortens a summary to [`COMMENT_MAX_LINES`] lines and
/// [`COMMENT_MAX_CHARS`] characters, ending cut text with `...`.
#[must_use]
pub fn comment_digest(summary: &str) -> String {
    if summary.is_empty() {
        return "(no output)".to_owned();
    }
    let mut digest = String::new();
    let mut line_breaks = 0;
    for (count, ch) in summary.chars().enumerate() {
        if ch == '\n' {
            line_breaks += 1;
            if line_breaks >= COMMENT_MAX_LINES {
                digest.push_str("...");
                return digest;
            }
        }
        if count >= COMMENT_MAX_CHARS {
            digest.push_str("...");
            return digest;
        }
        digest.push(ch);
    }
    digest
}
