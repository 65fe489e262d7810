//! # autoprobe
//!
//! YAML configuration for the `autoprobe` binary. One file describes the
//! application under test, how to crawl it and how to run the tests found:
//!
//! ```yaml
//! name: shop
//! params:
//!   env: { default: staging }
//! base_url: https://${env}.shop.test
//! crawl:
//!   max_pages: 20
//!   exclude_routes: ["/admin/*"]
//! credentials:
//!   email: qa@shop.test
//!   password: ${password}
//! run:
//!   retries: 1
//!   tags: [smoke]
//! ```
//!
//! The crawling and running themselves live in `autoprobe-crawler` and
//! `autoprobe-runner`; this crate only turns a config into their options.

pub mod config;

pub use config::{Config, ParamDef, Params};

/// Result type for config loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Config errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
