//! Persisting finished reports to disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Characters of the topic kept in a generated filename.
const TOPIC_CHARS: usize = 30;

/// Derive a filename such as `Rust_async_runtimes_20250101_093000.md`.
///
/// Only alphanumerics, spaces, `-` and `_` survive; spaces become `_`.
pub fn report_filename(topic: &str, now: DateTime<Local>) -> String {
    let safe: String = topic
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem: String = safe.trim().chars().take(TOPIC_CHARS).collect();
    let stem = stem.trim().replace(' ', "_");
    let stem = if stem.is_empty() { "report".to_string() } else { stem };
    format!("{}_{}.md", stem, now.format("%Y%m%d_%H%M%S"))
}

/// Write `content` and return the path written.
///
/// A `target` with a file extension (`brief.md`, `notes.txt`) is used as the
/// file path; one without is a directory that receives a generated filename.
pub fn save_report(target: &Path, topic: &str, content: &str) -> Result<PathBuf> {
    let path = if target.extension().is_some() {
        target.to_path_buf()
    } else {
        target.join(report_filename(topic, Local::now()))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path)
}
