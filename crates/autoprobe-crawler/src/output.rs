use crate::Result;
use autoprobe_ir::DiscoveryReport;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the copy that always holds the most recent report.
pub const LATEST_REPORT: &str = "latest.json";

/// Write `report` as `discovery-<timestamp>.json` and `latest.json` under `dir`.
///
/// Returns the timestamped path.
pub fn write_report(report: &DiscoveryReport, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(report)?;
    let stamp = report.finished_at.format("%Y%m%dT%H%M%S%3fZ");
    let path = dir.join(format!("discovery-{}.json", stamp));
    std::fs::write(&path, &json)?;
    std::fs::write(dir.join(LATEST_REPORT), &json)?;

    info!("Discovery report written to {}", path.display());
    Ok(path)
}
