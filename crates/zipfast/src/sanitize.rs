//! Helpers for sanitizing data before it enters logs and tracing spans.
//!
//! Upload and output locations reveal the server's directory layout, so
//! spans only ever carry the final path component.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
