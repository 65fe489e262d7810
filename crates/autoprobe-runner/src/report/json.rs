use crate::Result;
use autoprobe_ir::TestRunSummary;
use std::path::{Path, PathBuf};
use tracing::info;

/// Copy of the most recent summary.
pub const LATEST_SUMMARY: &str = "latest-run.json";

/// `run-<timestamp>.json` and `latest-run.json`.
pub(super) fn write(summary: &TestRunSummary, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(summary)?;

    let path = dir.join(format!(
        "run-{}.json",
        summary.finished_at.format("%Y%m%dT%H%M%S%3fZ")
    ));
    std::fs::write(&path, &json)?;
    let latest = dir.join(LATEST_SUMMARY);
    std::fs::write(&latest, &json)?;

    info!("Run summary written to {}", path.display());
    Ok(vec![path, latest])
}
