//! # autoprobe-crawler
//!
//! Breadth-first discovery of a web application. Visits same-origin pages up to
//! a depth and page budget, extracts forms, buttons, links, dialogs, navigation
//! and headings, synthesizes a ranked [`Locator`](autoprobe_ir::Locator) for every
//! element and suggests user flows.
//!
//! ```rust,no_run
//! use autoprobe_crawler::{discover, CrawlOptions};
//! use autoprobe_locator::{BrowserOptions, EokaLauncher};
//!
//! # #[tokio::main]
//! # async fn main() -> autoprobe_crawler::Result<()> {
//! let launcher = EokaLauncher::new(BrowserOptions::default());
//! let report = discover(&launcher, CrawlOptions::new("http://localhost:3000")).await?;
//! println!("{} pages, {} forms", report.pages.len(), report.total_elements.forms);
//! # Ok(())
//! # }
//! ```

mod auth;
mod classify;
mod crawler;
mod extract;
mod flows;
mod locators;
mod output;
mod routes;

pub use classify::field_kind;
pub use crawler::{discover, Crawler};
pub use flows::suggest_flows;
pub use locators::synthesize;
pub use output::{write_report, LATEST_REPORT};
pub use routes::RouteFilter;

use std::path::PathBuf;

/// Result type for discovery.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a crawl. Per-page problems are collected in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("browser error: {0}")]
    Locator(#[from] autoprobe_locator::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Login credentials used for the authenticated pass.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub base_url: String,
    pub max_depth: u32,
    pub max_pages: usize,
    /// Path globs; `*` matches anything, everything else is literal.
    pub exclude_routes: Vec<String>,
    /// Paths crawled after a successful login.
    pub auth_routes: Vec<String>,
    pub settle_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Directory for per-page screenshots; none are taken when unset.
    pub screenshot_dir: Option<PathBuf>,
    pub login_path: String,
    pub credentials: Option<Credentials>,
}

impl CrawlOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth: 3,
            max_pages: 50,
            exclude_routes: Vec::new(),
            auth_routes: Vec::new(),
            settle_ms: 1000,
            navigation_timeout_ms: 30_000,
            screenshot_dir: None,
            login_path: "/login".into(),
            credentials: None,
        }
    }
}
