//! # autoprobe-runner
//!
//! Runs [`TestCase`](autoprobe_ir::TestCase)s against a live browser. Each
//! attempt gets a fresh session; failed tests are retried whole and a later
//! pass is reported as flaky. Tests are ordered by their dependencies before
//! the run, and the summary is written as JSON, HTML and JUnit XML.
//!
//! ```rust,no_run
//! use autoprobe_ir::TestManifest;
//! use autoprobe_locator::{BrowserOptions, EokaLauncher};
//! use autoprobe_runner::{write_reports, ReportFormat, RunOptions, Runner};
//!
//! # #[tokio::main]
//! # async fn main() -> autoprobe_runner::Result<()> {
//! let manifest = TestManifest::from_json(&std::fs::read_to_string("manifest.json")?)?;
//! let launcher = EokaLauncher::new(BrowserOptions::default());
//! let runner = Runner::new(&launcher, RunOptions::new("http://localhost:3000"));
//! let summary = runner.run(manifest.tests).await?;
//! write_reports(&summary, "./autoprobe-output/runs", ReportFormat::All)?;
//! println!("{} passed, {} failed", summary.passed, summary.failed);
//! # Ok(())
//! # }
//! ```

mod assertions;
mod report;
mod runner;
mod schedule;

pub use report::{load_summary, render_reports, write_reports, ReportFormat, LATEST_SUMMARY};
pub use runner::Runner;
pub use schedule::{filter_by_tags, order, CyclePolicy};

use autoprobe_ir::ValueGenerator;
use autoprobe_locator::ResolverConfig;
use std::path::PathBuf;

/// Result type for test execution.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run or fail a step.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("browser error: {0}")]
    Locator(#[from] autoprobe_locator::Error),

    #[error("invalid step: {0}")]
    Step(#[from] autoprobe_ir::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("dependency cycle among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("report error: {0}")]
    Report(String),
}

/// Run settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Relative `navigate` targets are joined onto this.
    pub base_url: String,
    /// Extra attempts after a failure.
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub screenshot_on_failure: bool,
    /// Where failure and `screenshot` step images go.
    pub screenshot_dir: PathBuf,
    pub resolver: ResolverConfig,
    pub on_cycle: CyclePolicy,
    /// Only tests carrying one of these tags run. Empty runs everything.
    pub tags: Vec<String>,
    pub values: ValueGenerator,
}

impl RunOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retries: 2,
            retry_delay_ms: 0,
            screenshot_on_failure: true,
            screenshot_dir: PathBuf::from("./autoprobe-output/screenshots"),
            resolver: ResolverConfig::default(),
            on_cycle: CyclePolicy::default(),
            tags: Vec::new(),
            values: ValueGenerator::new(),
        }
    }
}
