//! # autoprobe-locator
//!
//! Resolves abstract [`Locator`]s to live elements, healing them when the page
//! markup has drifted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoprobe_locator::{BrowserOptions, EokaLauncher, Launcher, Resolver, ResolverConfig};
//! use autoprobe_ir::{Locator, StrategyKind};
//!
//! # #[tokio::main]
//! # async fn main() -> autoprobe_locator::Result<()> {
//! let driver = EokaLauncher::new(BrowserOptions::default()).launch().await?;
//! driver.goto("http://localhost:3000/login").await?;
//!
//! let resolver = Resolver::new(driver.as_ref(), ResolverConfig::default());
//! let email = Locator::new("[data-testid=\"email\"]", StrategyKind::TestId, 0.95)
//!     .with_fallbacks(vec!["#email".into()])
//!     .with_description("Email");
//! resolver.fill(&email, "user@example.com").await?;
//!
//! for event in resolver.take_events() {
//!     println!("healed {} -> {} ({})", event.original, event.healed_with, event.reason);
//! }
//! driver.close().await?;
//! # Ok(())
//! # }
//! ```

mod driver;
mod chrome;
pub mod heuristics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod query;
mod resolver;

pub use autoprobe_ir::Locator;
pub use driver::{Driver, Element, Launcher, POLL_INTERVAL_MS};
pub use chrome::{BrowserOptions, EokaDriver, EokaLauncher};
pub use query::{Query, TextMatch};
pub use resolver::{Resolver, ResolverConfig};

/// Result type for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving or acting on elements.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error(
        "element not found: primary '{primary}', fallbacks [{}], description '{description}'",
        fallbacks.join(", ")
    )]
    NotFound {
        primary: String,
        fallbacks: Vec<String>,
        description: String,
    },

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("session closed")]
    SessionClosed,
}
