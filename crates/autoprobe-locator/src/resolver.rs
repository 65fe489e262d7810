use crate::heuristics::{default_heuristics, Heuristic};
use crate::{Driver, Element, Error, Query, Result};
use autoprobe_ir::{HealReason, HealingEvent, Locator};
use chrono::Utc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Run the heuristic chain after every selector failed.
    pub self_healing: bool,
    /// Budget for one resolution in the action helpers.
    pub default_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            self_healing: true,
            default_timeout_ms: 10_000,
        }
    }
}

/// Resolves [`Locator`]s against one page, recording every heal.
///
/// Borrows the driver for one test attempt.
pub struct Resolver<'a> {
    driver: &'a dyn Driver,
    config: ResolverConfig,
    heuristics: Vec<Box<dyn Heuristic>>,
    events: Mutex<Vec<HealingEvent>>,
}

impl<'a> Resolver<'a> {
    pub fn new(driver: &'a dyn Driver, config: ResolverConfig) -> Self {
        Self {
            driver,
            config,
            heuristics: default_heuristics(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Replace the heuristic chain.
    pub fn with_heuristics(mut self, heuristics: Vec<Box<dyn Heuristic>>) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn driver(&self) -> &'a dyn Driver {
        self.driver
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Number of heals recorded so far.
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Heals recorded so far.
    pub fn events(&self) -> Vec<HealingEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drain recorded heals.
    pub fn take_events(&self) -> Vec<HealingEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    fn record(&self, locator: &Locator, healed_with: String, reason: HealReason) {
        warn!(
            "healed locator '{}' via {} -> {}",
            locator.primary, reason, healed_with
        );
        let event = HealingEvent {
            original: locator.primary.clone(),
            description: locator.description.clone(),
            healed_with,
            reason,
            timestamp: Utc::now(),
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Probe one selector string, treating an unparseable selector as absent.
    async fn probe(&self, selector: &str, timeout_ms: u64) -> Result<Option<Element>> {
        let query = match Query::parse(selector) {
            Ok(q) => q,
            Err(e) => {
                debug!("skipping selector: {}", e);
                return Ok(None);
            }
        };
        match self.driver.find_visible(&query, timeout_ms).await {
            Err(Error::InvalidSelector(s)) => {
                debug!("page rejected selector '{}'", s);
                Ok(None)
            }
            other => other,
        }
    }

    /// Resolve `locator` to a visible element within `timeout_ms`.
    ///
    /// Tries the primary (a third of the budget), then each fallback (a quarter
    /// each), then the heuristic chain. Every strategy is clamped to what is left
    /// of the overall deadline.
    pub async fn resolve(&self, locator: &Locator, timeout_ms: u64) -> Result<Element> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let remaining = |budget: u64| {
            let left = deadline.saturating_duration_since(Instant::now()).as_millis() as u64;
            budget.min(left)
        };

        debug!("resolving {}", locator);
        if let Some(el) = self.probe(&locator.primary, remaining(timeout_ms / 3)).await? {
            return Ok(el);
        }

        for fallback in &locator.fallbacks {
            debug!("trying fallback '{}'", fallback);
            if let Some(el) = self.probe(fallback, remaining(timeout_ms / 4)).await? {
                self.record(locator, fallback.clone(), HealReason::Fallback);
                return Ok(el);
            }
        }

        if self.config.self_healing {
            for heuristic in &self.heuristics {
                match heuristic.attempt(self.driver, locator).await {
                    Ok(Some(healed)) => {
                        self.record(locator, healed.selector, heuristic.reason());
                        return Ok(healed.element);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("{} heuristic failed: {}", heuristic.reason(), e),
                }
            }
        }

        Err(Error::NotFound {
            primary: locator.primary.clone(),
            fallbacks: locator.fallbacks.clone(),
            description: locator.description.clone(),
        })
    }

    async fn resolve_default(&self, locator: &Locator) -> Result<Element> {
        self.resolve(locator, self.config.default_timeout_ms).await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.click(&el).await
    }

    pub async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.fill(&el, value).await
    }

    pub async fn select(&self, locator: &Locator, value: &str) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.select_option(&el, value).await
    }

    pub async fn check(&self, locator: &Locator) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.set_checked(&el, true).await
    }

    pub async fn uncheck(&self, locator: &Locator) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.set_checked(&el, false).await
    }

    pub async fn hover(&self, locator: &Locator) -> Result<()> {
        let el = self.resolve_default(locator).await?;
        self.driver.hover(&el).await
    }

    pub async fn text(&self, locator: &Locator) -> Result<String> {
        let el = self.resolve_default(locator).await?;
        self.driver.text(&el).await
    }

    pub async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let el = self.resolve_default(locator).await?;
        self.driver.attribute(&el, name).await
    }

    pub async fn is_enabled(&self, locator: &Locator, timeout_ms: u64) -> Result<bool> {
        let el = self.resolve(locator, timeout_ms).await?;
        self.driver.is_enabled(&el).await
    }

    /// Whether the locator resolves within `timeout_ms`. Never fails.
    pub async fn is_visible(&self, locator: &Locator, timeout_ms: u64) -> bool {
        match self.resolve(locator, timeout_ms).await {
            Ok(_) => true,
            Err(e) => {
                debug!("not visible: {}", e);
                false
            }
        }
    }
}
