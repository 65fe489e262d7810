use crate::extract::{self, Builder, Category};
use crate::flows::suggest_flows;
use crate::routes::{follow, visit_key, RouteFilter};
use crate::{auth, CrawlOptions, Error, Result};
use autoprobe_ir::{
    DiscoveredPage, DiscoveryError, DiscoveryErrorKind, DiscoveryReport, ElementType,
};
use autoprobe_locator::{Driver, Launcher};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Network quiet period that counts as loaded.
const IDLE_MS: u64 = 500;

/// Crawl with a freshly launched browser session, closing it afterwards.
pub async fn discover(launcher: &dyn Launcher, options: CrawlOptions) -> Result<DiscoveryReport> {
    let driver = launcher.launch().await?;
    let result = Crawler::new(driver.as_ref(), options)?.run().await;
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser: {}", e);
    }
    result
}

/// One crawl over one page session. Owns its visited set, pages and errors.
pub struct Crawler<'a> {
    driver: &'a dyn Driver,
    options: CrawlOptions,
    base: Url,
    filter: RouteFilter,
    visited: HashSet<String>,
    /// Navigations attempted, counted against the page budget.
    attempts: usize,
    pages: Vec<DiscoveredPage>,
    errors: Vec<DiscoveryError>,
}

impl<'a> Crawler<'a> {
    pub fn new(driver: &'a dyn Driver, options: CrawlOptions) -> Result<Self> {
        let base = Url::parse(&options.base_url)
            .map_err(|e| Error::Config(format!("invalid base url '{}': {}", options.base_url, e)))?;
        let filter = RouteFilter::new(&options.exclude_routes)?;
        Ok(Self {
            driver,
            options,
            base,
            filter,
            visited: HashSet::new(),
            attempts: 0,
            pages: Vec::new(),
            errors: Vec::new(),
        })
    }

    pub async fn run(mut self) -> Result<DiscoveryReport> {
        let started_at = Utc::now();
        info!(
            "Discovering {} (depth {}, max {} pages)",
            self.base, self.options.max_depth, self.options.max_pages
        );

        let seed = self.base.clone();
        self.traverse(vec![seed], false).await;

        let mut authenticated = false;
        if let Some(credentials) = self.options.credentials.clone() {
            authenticated = self.sign_in(&credentials).await;
            if authenticated {
                let seeds: Vec<Url> = self
                    .options
                    .auth_routes
                    .iter()
                    .filter_map(|r| self.base.join(r).ok())
                    .collect();
                self.traverse(seeds, true).await;
            }
        }

        let flows = suggest_flows(&self.pages);
        let report = DiscoveryReport::new(
            self.base.as_str(),
            started_at,
            self.pages,
            flows,
            self.errors,
            authenticated,
        );
        info!(
            "Discovery finished: {} pages, {} forms, {} flows, {} errors",
            report.coverage.pages_visited,
            report.coverage.forms_found,
            report.coverage.flows_suggested,
            report.errors.len()
        );
        Ok(report)
    }

    async fn sign_in(&mut self, credentials: &crate::Credentials) -> bool {
        let login_url = match self.base.join(&self.options.login_path) {
            Ok(u) => u,
            Err(e) => {
                self.record(&self.options.login_path.clone(), DiscoveryErrorKind::Auth, e.to_string());
                return false;
            }
        };
        match auth::login(
            self.driver,
            &login_url,
            credentials,
            self.options.navigation_timeout_ms,
            self.options.settle_ms,
        )
        .await
        {
            Ok(true) => {
                info!("Signed in as {}", credentials.email);
                true
            }
            Ok(false) => {
                self.record(
                    login_url.as_str(),
                    DiscoveryErrorKind::Auth,
                    "credentials rejected".into(),
                );
                false
            }
            Err(e) => {
                self.record(login_url.as_str(), DiscoveryErrorKind::Auth, e.to_string());
                false
            }
        }
    }

    fn record(&mut self, url: &str, kind: DiscoveryErrorKind, message: String) {
        warn!("{:?} error at {}: {}", kind, url, message);
        self.errors.push(DiscoveryError::new(url, kind, message));
    }

    /// Whether a URL should be visited. Seeds ignore the page budget.
    fn admits(&self, url: &Url, depth: u32, seed: bool) -> bool {
        if self.visited.contains(&visit_key(url)) {
            return false;
        }
        if depth > self.options.max_depth {
            return false;
        }
        if !seed && self.attempts >= self.options.max_pages {
            return false;
        }
        if self.filter.excludes(url.path()) {
            debug!("excluded: {}", url.path());
            return false;
        }
        true
    }

    /// Breadth-first from `seeds` at depth 0.
    async fn traverse(&mut self, seeds: Vec<Url>, authenticated: bool) {
        let mut queue: VecDeque<(Url, u32, bool)> =
            seeds.into_iter().map(|u| (u, 0, true)).collect();

        while let Some((url, depth, seed)) = queue.pop_front() {
            if !self.admits(&url, depth, seed) {
                continue;
            }
            let requested = visit_key(&url);
            self.visited.insert(requested.clone());
            self.attempts += 1;

            let Some(page) = self.visit(&url, authenticated).await else {
                continue;
            };
            let current = Url::parse(&page.url).unwrap_or_else(|_| url.clone());
            let landed = visit_key(&current);
            if landed != requested && !self.visited.insert(landed) {
                debug!("{} redirected to already visited {}", url, current);
                continue;
            }
            for href in page
                .links
                .iter()
                .chain(page.navigation.iter())
                .filter_map(|l| l.href.as_deref())
            {
                if let Some(next) = follow(&current, &self.base, href) {
                    queue.push_back((next, depth + 1, false));
                }
            }
            self.pages.push(page);
        }
    }

    async fn visit(&mut self, url: &Url, authenticated: bool) -> Option<DiscoveredPage> {
        info!("Visiting {}", url);
        let start = Instant::now();
        let timeout = Duration::from_millis(self.options.navigation_timeout_ms);

        match tokio::time::timeout(timeout, self.driver.goto(url.as_str())).await {
            Err(_) => {
                self.record(
                    url.as_str(),
                    DiscoveryErrorKind::Timeout,
                    format!("navigation exceeded {}ms", self.options.navigation_timeout_ms),
                );
                return None;
            }
            Ok(Err(e)) => {
                self.record(url.as_str(), DiscoveryErrorKind::Navigation, e.to_string());
                return None;
            }
            Ok(Ok(())) => {}
        }
        if let Err(e) = self
            .driver
            .wait_for_network_idle(IDLE_MS, self.options.navigation_timeout_ms)
            .await
        {
            debug!("{} never went idle: {}", url, e);
        }
        self.driver.wait(self.options.settle_ms).await;
        let load_time_ms = start.elapsed().as_millis() as u64;

        let final_url = match self.driver.url().await.map(|u| Url::parse(&u)) {
            Ok(Ok(u)) => u,
            _ => url.clone(),
        };
        let title = self.driver.title().await.unwrap_or_default();

        let timestamp = Utc::now();
        let builder = Builder {
            page_url: &final_url,
            timestamp,
        };
        let mut page = DiscoveredPage {
            url: final_url.to_string(),
            path: final_url.path().to_string(),
            title,
            description: None,
            requires_auth: authenticated,
            forms: Vec::new(),
            buttons: Vec::new(),
            links: Vec::new(),
            modals: Vec::new(),
            navigation: Vec::new(),
            headings: Vec::new(),
            load_time_ms,
            screenshot: None,
        };

        for category in [
            Category::Forms,
            Category::Buttons,
            Category::Links,
            Category::Modals,
            Category::Navigation,
            Category::Headings,
            Category::Meta,
        ] {
            let raw = match extract::run(self.driver, category).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.record(
                        url.as_str(),
                        DiscoveryErrorKind::Element,
                        format!("{} extraction failed: {}", category.name(), e),
                    );
                    continue;
                }
            };
            match category {
                Category::Forms => page.forms = builder.forms(raw),
                Category::Buttons => page.buttons = builder.elements(raw, None),
                Category::Links => page.links = builder.elements(raw, Some(ElementType::Link)),
                Category::Modals => page.modals = builder.elements(raw, Some(ElementType::Modal)),
                Category::Navigation => {
                    page.navigation = builder.elements(raw, Some(ElementType::Link))
                }
                Category::Headings => page.headings = extract::headings(raw),
                Category::Meta => page.description = extract::description(raw),
            }
        }

        if let Some(dir) = self.options.screenshot_dir.clone() {
            page.screenshot = self.screenshot(&dir, &final_url).await;
        }

        debug!(
            "{}: {} forms, {} buttons, {} links",
            page.path,
            page.forms.len(),
            page.buttons.len(),
            page.links.len()
        );
        Some(page)
    }

    async fn screenshot(&mut self, dir: &std::path::Path, url: &Url) -> Option<String> {
        let name = format!("{}.png", screenshot_name(url));
        let path = dir.join(name);
        let result = async {
            let data = self.driver.screenshot().await?;
            std::fs::create_dir_all(dir)?;
            std::fs::write(&path, data)?;
            Ok::<_, Error>(())
        }
        .await;
        match result {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                debug!("screenshot of {} failed: {}", url, e);
                None
            }
        }
    }
}

/// File-system safe name for a page.
fn screenshot_name(url: &Url) -> String {
    let mut raw = url.path().to_string();
    if let Some(q) = url.query() {
        raw.push('-');
        raw.push_str(q);
    }
    let name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if name.is_empty() {
        "index".into()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshot_names() {
        let u = |s: &str| Url::parse(s).unwrap();
        assert_eq!(screenshot_name(&u("http://a.test/")), "index");
        assert_eq!(screenshot_name(&u("http://a.test/blog/post-1")), "blog-post-1");
        assert_eq!(screenshot_name(&u("http://a.test/s?q=x")), "s-q-x");
    }
}
