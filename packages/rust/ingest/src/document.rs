//! Plain-text document loading and cleanup.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use exampaper_shared::{ExamPaperError, Result};

/// Extensions read as UTF-8 text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Read a syllabus document and return its cleaned text.
///
/// Only plain-text formats are accepted; anything else (notably PDF) is a
/// validation error. A document that is empty after cleanup is rejected too.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_document(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => {}
        None => {}
        Some(ext) => {
            return Err(ExamPaperError::validation(format!(
                "unsupported document type .{ext}; convert it to .txt or .md first"
            )));
        }
    }

    let raw = std::fs::read_to_string(path).map_err(|e| ExamPaperError::io(path, e))?;
    let cleaned = clean_text(&raw);

    if cleaned.is_empty() {
        return Err(ExamPaperError::validation(format!(
            "{} contains no readable text",
            path.display()
        )));
    }

    debug!(raw_chars = raw.len(), cleaned_chars = cleaned.len(), "document loaded");
    Ok(cleaned)
}

/// Run the cleanup passes over raw document text.
pub fn clean_text(raw: &str) -> String {
    let mut result = strip_control_chars(raw);
    result = collapse_inline_whitespace(&result);
    result = drop_blank_lines(&result);
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Control characters
// ---------------------------------------------------------------------------

/// Remove control characters other than newlines and tabs (form feeds from
/// extracted text, BOMs, stray NULs).
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || *c == '\t' || !(c.is_control() || *c == '\u{feff}'))
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Inline whitespace
// ---------------------------------------------------------------------------

fn collapse_inline_whitespace(text: &str) -> String {
    static INLINE_WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\u{00a0}]+").expect("valid regex"));

    INLINE_WS_RE.replace_all(text, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Trim lines, drop blanks
// ---------------------------------------------------------------------------

fn drop_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
