use crate::{Query, Result};
use async_trait::async_trait;
use autoprobe_ir::BoundingBox;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Delay between visibility polls.
pub const POLL_INTERVAL_MS: u64 = 100;

/// A live element, addressed by a unique CSS path computed in the page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Element {
    pub selector: String,
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bbox: BoundingBox,
}

/// One browser page.
///
/// Every call is awaited before the next is issued; implementations never see
/// two operations in flight on the same page.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn wait_for_network_idle(&self, idle_ms: u64, timeout_ms: u64) -> Result<()>;

    async fn wait(&self, ms: u64);

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// PNG bytes of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Evaluate a JS expression and return its JSON value.
    async fn evaluate(&self, js: &str) -> Result<serde_json::Value>;

    /// Currently visible elements matching `query`, in document order, at most `limit`.
    async fn query(&self, query: &Query, limit: usize) -> Result<Vec<Element>>;

    async fn click(&self, element: &Element) -> Result<()>;

    /// Clear and type.
    async fn fill(&self, element: &Element, value: &str) -> Result<()>;

    /// Select by option value or visible option text.
    async fn select_option(&self, element: &Element, value: &str) -> Result<()>;

    async fn set_checked(&self, element: &Element, checked: bool) -> Result<()>;

    async fn hover(&self, element: &Element) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Fresh visible text of the element.
    async fn text(&self, element: &Element) -> Result<String>;

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>>;

    async fn is_enabled(&self, element: &Element) -> Result<bool>;

    /// End the session. Later calls fail.
    async fn close(&self) -> Result<()>;

    /// Poll until an element matching `query` is visible or `timeout_ms` elapses.
    ///
    /// Always checks at least once, so a zero timeout is a plain existence check.
    async fn find_visible(&self, query: &Query, timeout_ms: u64) -> Result<Option<Element>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(el) = self.query(query, 1).await?.into_iter().next() {
                return Ok(Some(el));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let left = (deadline - now).as_millis() as u64;
            self.wait(POLL_INTERVAL_MS.min(left.max(1))).await;
        }
    }
}

/// Creates isolated browser sessions.
///
/// Each call yields a session that shares no cookies, storage or open dialogs
/// with any other.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Driver>>;
}
