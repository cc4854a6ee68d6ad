//! Writing Markdown reports to disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
#[error("failed to write report {path}: {source}")]
pub struct ReportError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Write `text` to `path`, creating parent directories as needed.
pub fn write_report(path: &Path, text: &str) -> Result<(), ReportError> {
    let wrap = |source: std::io::Error| ReportError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::write(path, text).map_err(wrap)?;

    info!("Report written to {} ({} bytes)", path.display(), text.len());
    Ok(())
}

/// `<prefix>_YYYYMMDD_HHMMSS.md` inside `dir`.
pub fn timestamped_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_{}.md", prefix, at.format("%Y%m%d_%H%M%S")))
}
