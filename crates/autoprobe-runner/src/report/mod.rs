mod html;
mod json;
mod junit;

use crate::{Error, Result};
use autoprobe_ir::TestRunSummary;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use json::LATEST_SUMMARY;

/// Which reports to write besides the JSON summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    All,
    Json,
    Html,
    Junit,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "junit" | "xml" => Ok(Self::Junit),
            other => Err(format!(
                "unknown report format '{}' (all, json, html, junit)",
                other
            )),
        }
    }
}

/// Write the JSON summary plus whatever `format` asks for. Returns every path written.
pub fn write_reports(
    summary: &TestRunSummary,
    dir: impl AsRef<Path>,
    format: ReportFormat,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut written = json::write(summary, dir)?;
    written.extend(render_reports(summary, dir, format)?);
    Ok(written)
}

/// Write only the HTML and JUnit reports `format` asks for, e.g. from a saved summary.
pub fn render_reports(
    summary: &TestRunSummary,
    dir: impl AsRef<Path>,
    format: ReportFormat,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut written = Vec::new();
    if matches!(format, ReportFormat::All | ReportFormat::Html) {
        written.push(html::write(summary, dir)?);
    }
    if matches!(format, ReportFormat::All | ReportFormat::Junit) {
        written.push(junit::write(summary, dir)?);
    }
    Ok(written)
}

/// Read a summary written by [`write_reports`].
pub fn load_summary(path: impl AsRef<Path>) -> Result<TestRunSummary> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Report(format!("unreadable summary {}: {}", path.display(), e)))
}
