//! Scripted in-memory driver for tests.
//!
//! Pages are declared up front as lists of [`MockElement`]s. Queries are
//! answered from those lists: CSS supports compound selectors (`tag`, `#id`,
//! `.class`, `[attr]`, `[attr="v"]`, `[attr*="v"]`, `[attr^="v"]`) and `,` lists,
//! matching only the last compound of a descendant chain. XPath only matches
//! an element's exact selector or alias. `evaluate` answers from scripts keyed by
//! a marker substring of the expression.

use crate::{Driver, Element, Error, Launcher, Query, Result, TextMatch};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A scripted DOM element.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub tag: String,
    pub selector: Option<String>,
    pub aliases: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub role: Option<String>,
    pub label: Option<String>,
    pub options: Vec<String>,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    pub navigates_to: Option<String>,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Text of the associated `<label>`.
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Unique selector reported for this element.
    pub fn selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    /// Extra selector string matched verbatim (e.g. an XPath).
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Clicking loads `url`.
    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    fn implicit_role(&self) -> Option<&str> {
        if let Some(r) = &self.role {
            return Some(r.as_str());
        }
        let input_type = self.attrs.get("type").map(|s| s.as_str());
        match (self.tag.as_str(), input_type) {
            ("button", _) => Some("button"),
            ("input", Some("submit" | "button" | "reset" | "image")) => Some("button"),
            ("input", Some("checkbox")) => Some("checkbox"),
            ("input", Some("radio")) => Some("radio"),
            ("input", _) | ("textarea", _) => Some("textbox"),
            ("a", _) if self.attrs.contains_key("href") => Some("link"),
            ("select", _) => Some("combobox"),
            ("dialog", _) => Some("dialog"),
            ("nav", _) => Some("navigation"),
            ("form", _) => Some("form"),
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", _) => Some("heading"),
            _ => None,
        }
    }

    fn accessible_name(&self) -> String {
        self.attrs
            .get("aria-label")
            .cloned()
            .or_else(|| self.label.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| (!self.text.is_empty()).then(|| self.text.clone()))
            .or_else(|| self.attrs.get("value").cloned())
            .or_else(|| self.attrs.get("title").cloned())
            .or_else(|| self.attrs.get("placeholder").cloned())
            .unwrap_or_default()
    }

    fn matches(&self, query: &Query) -> bool {
        let icase = |hay: &str, needle: &str| TextMatch::IgnoreCase.matches(hay, needle);
        match query {
            Query::Css(sel) => {
                self.selector.as_deref() == Some(sel.as_str())
                    || self.aliases.iter().any(|a| a == sel)
                    || css_matches(self, sel)
            }
            Query::XPath(x) => self.aliases.iter().any(|a| a == x),
            Query::Text { value, mode } => mode.matches(&self.text, value),
            Query::Role { role, name } => {
                self.implicit_role() == Some(role.as_str())
                    && name
                        .as_deref()
                        .map(|n| self.accessible_name().trim() == n.trim())
                        .unwrap_or(true)
            }
            Query::Label(v) => {
                let label = self
                    .attrs
                    .get("aria-label")
                    .or(self.label.as_ref())
                    .cloned()
                    .unwrap_or_default();
                !label.is_empty() && icase(&label, v)
            }
            Query::Placeholder(v) => self
                .attrs
                .get("placeholder")
                .is_some_and(|p| icase(p, v)),
        }
    }
}

fn css_matches(el: &MockElement, selector: &str) -> bool {
    selector.split(',').any(|alt| {
        let last = alt
            .split(|c: char| c == '>' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .last();
        match last {
            Some(compound) if !alt.contains('[') => compound_matches(el, compound),
            // attribute values may contain spaces; match the whole alternative
            _ => compound_matches(el, alt.trim()),
        }
    })
}

fn compound_matches(el: &MockElement, compound: &str) -> bool {
    let mut rest = compound.trim();
    let tag_end = rest
        .find(|c: char| c == '#' || c == '.' || c == '[' || c == ':')
        .unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
        return false;
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        let (kind, body) = rest.split_at(1);
        match kind {
            "#" | "." => {
                let end = body
                    .find(|c: char| c == '#' || c == '.' || c == '[' || c == ':')
                    .unwrap_or(body.len());
                let name = &body[..end];
                let ok = if kind == "#" {
                    el.attrs.get("id").is_some_and(|id| id == name)
                } else {
                    el.attrs
                        .get("class")
                        .is_some_and(|c| c.split_whitespace().any(|cls| cls == name))
                };
                if !ok {
                    return false;
                }
                rest = &body[end..];
            }
            "[" => {
                let Some(end) = body.find(']') else {
                    return false;
                };
                if !attr_matches(el, &body[..end]) {
                    return false;
                }
                rest = &body[end + 1..];
            }
            ":" => {
                // pseudo-classes are ignored
                let end = body
                    .find(|c: char| c == '#' || c == '.' || c == '[')
                    .unwrap_or(body.len());
                rest = &body[end..];
            }
            _ => return false,
        }
    }
    true
}

fn attr_matches(el: &MockElement, spec: &str) -> bool {
    let Some(eq) = spec.find('=') else {
        return el.attrs.contains_key(spec.trim());
    };
    let (mut name, op) = (&spec[..eq], '=');
    let op = match name.chars().last() {
        Some(c @ ('*' | '^' | '$' | '~' | '|')) => {
            name = &name[..name.len() - 1];
            c
        }
        _ => op,
    };
    let value = crate::query::unquote(&spec[eq + 1..]);
    let Some(actual) = el.attrs.get(name.trim()) else {
        return false;
    };
    match op {
        '*' => actual.contains(value),
        '^' => actual.starts_with(value),
        '$' => actual.ends_with(value),
        '~' => actual.split_whitespace().any(|w| w == value),
        _ => actual == value,
    }
}

/// A scripted page.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub url: String,
    pub title: String,
    pub elements: Vec<MockElement>,
    scripts: Vec<(String, std::result::Result<serde_json::Value, String>)>,
    redirect: Option<String>,
}

impl MockPage {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, mut element: MockElement) -> Self {
        if element.selector.is_none() {
            let selector = match element.attrs.get("id") {
                Some(id) => format!("#{}", id),
                None => {
                    let n = self.elements.iter().filter(|e| e.tag == element.tag).count();
                    format!("{}:nth-of-type({})", element.tag, n + 1)
                }
            };
            element.selector = Some(selector);
        }
        self.elements.push(element);
        self
    }

    /// Loading this page lands on `url` instead, like an HTTP redirect.
    pub fn redirects_to(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    /// Answer any `evaluate` whose expression contains `marker`.
    pub fn with_script(mut self, marker: &str, value: serde_json::Value) -> Self {
        self.scripts.push((marker.to_string(), Ok(value)));
        self
    }

    /// Make any `evaluate` whose expression contains `marker` throw.
    pub fn with_failing_script(mut self, marker: &str, message: &str) -> Self {
        self.scripts
            .push((marker.to_string(), Err(message.to_string())));
        self
    }

    fn find(&self, selector: &str) -> Option<&MockElement> {
        self.elements
            .iter()
            .find(|e| e.selector.as_deref() == Some(selector))
    }

    fn find_mut(&mut self, selector: &str) -> Option<&mut MockElement> {
        self.elements
            .iter_mut()
            .find(|e| e.selector.as_deref() == Some(selector))
    }
}

fn to_element(el: &MockElement) -> Element {
    Element {
        selector: el.selector.clone().unwrap_or_else(|| el.tag.clone()),
        tag: el.tag.clone(),
        text: el.text.clone(),
        bbox: Default::default(),
    }
}

/// Hops followed before a redirect chain gives up.
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, MockPage>,
    current: Option<MockPage>,
    closed: bool,
}

/// In-memory [`Driver`].
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<State>,
    fail_urls: HashSet<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: MockPage) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.pages.insert(page.url.clone(), page);
        }
        self
    }

    /// Navigation to `url` fails.
    pub fn failing_url(mut self, url: &str) -> Self {
        self.fail_urls.insert(url.to_string());
        self
    }

    /// Share an action log with other drivers.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    /// Every action performed, in order, e.g. `"click #send"`.
    pub fn actions(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn push(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::ActionFailed("mock state poisoned".into()))?;
        if state.closed {
            return Err(Error::SessionClosed);
        }
        f(&mut state)
    }

    fn with_element<T>(
        &self,
        element: &Element,
        f: impl FnOnce(&mut MockElement) -> Result<T>,
    ) -> Result<T> {
        self.with_state(|state| {
            let page = state
                .current
                .as_mut()
                .ok_or_else(|| Error::ActionFailed("no page loaded".into()))?;
            let el = page.find_mut(&element.selector).ok_or_else(|| {
                Error::ActionFailed(format!("element '{}' detached", element.selector))
            })?;
            f(el)
        })
    }

    fn load(&self, url: &str) -> Result<()> {
        if self.fail_urls.contains(url) {
            return Err(Error::ActionFailed(format!("net::ERR_FAILED at {}", url)));
        }
        self.with_state(|state| {
            let mut target = url.to_string();
            let mut page = None;
            for _ in 0..MAX_REDIRECTS {
                let key = target.split('#').next().unwrap_or(&target).to_string();
                let Some(found) = state.pages.get(&target).or_else(|| state.pages.get(&key)) else {
                    break;
                };
                match found.redirect {
                    Some(ref next) => target = next.clone(),
                    None => {
                        page = Some(found.clone());
                        break;
                    }
                }
            }
            let page = match page {
                Some(mut p) => {
                    p.url = target;
                    p
                }
                None => MockPage::new(&target, "Not Found"),
            };
            state.current = Some(page);
            Ok(())
        })
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.push(format!("goto {}", url));
        self.load(url)
    }

    async fn wait_for_network_idle(&self, _idle_ms: u64, _timeout_ms: u64) -> Result<()> {
        self.with_state(|_| Ok(()))
    }

    async fn wait(&self, _ms: u64) {
        tokio::task::yield_now().await;
    }

    async fn url(&self) -> Result<String> {
        self.with_state(|s| Ok(s.current.as_ref().map(|p| p.url.clone()).unwrap_or_default()))
    }

    async fn title(&self) -> Result<String> {
        self.with_state(|s| {
            Ok(s.current
                .as_ref()
                .map(|p| p.title.clone())
                .unwrap_or_default())
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.with_state(|_| Ok(b"\x89PNG\r\n\x1a\nmock".to_vec()))
    }

    async fn evaluate(&self, js: &str) -> Result<serde_json::Value> {
        self.with_state(|s| {
            let Some(page) = s.current.as_ref() else {
                return Ok(serde_json::Value::Null);
            };
            match page.scripts.iter().find(|(marker, _)| js.contains(marker.as_str())) {
                Some((_, Ok(v))) => Ok(v.clone()),
                Some((_, Err(msg))) => Err(Error::ActionFailed(msg.clone())),
                None => Ok(serde_json::Value::Null),
            }
        })
    }

    async fn query(&self, query: &Query, limit: usize) -> Result<Vec<Element>> {
        self.with_state(|s| {
            Ok(s.current
                .as_ref()
                .map(|page| {
                    page.elements
                        .iter()
                        .filter(|e| e.visible && e.matches(query))
                        .take(limit)
                        .map(to_element)
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    async fn find_visible(&self, query: &Query, _timeout_ms: u64) -> Result<Option<Element>> {
        Ok(self.query(query, 1).await?.into_iter().next())
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.push(format!("click {}", element.selector));
        let target = self.with_element(element, |el| {
            if el.attrs.get("type").map(|t| t.as_str()) == Some("checkbox") {
                el.checked = !el.checked;
            }
            Ok(el.navigates_to.clone())
        })?;
        match target {
            Some(url) => self.load(&url),
            None => Ok(()),
        }
    }

    async fn fill(&self, element: &Element, value: &str) -> Result<()> {
        self.push(format!("fill {} = {}", element.selector, value));
        self.with_element(element, |el| {
            el.attrs.insert("value".into(), value.to_string());
            Ok(())
        })
    }

    async fn select_option(&self, element: &Element, value: &str) -> Result<()> {
        self.push(format!("select {} = {}", element.selector, value));
        self.with_element(element, |el| {
            if !el.options.is_empty() && !el.options.iter().any(|o| o == value) {
                return Err(Error::ActionFailed(format!(
                    "option '{}' not found in '{}'",
                    value, element.selector
                )));
            }
            el.attrs.insert("value".into(), value.to_string());
            Ok(())
        })
    }

    async fn set_checked(&self, element: &Element, checked: bool) -> Result<()> {
        let verb = if checked { "check" } else { "uncheck" };
        self.push(format!("{} {}", verb, element.selector));
        self.with_element(element, |el| {
            el.checked = checked;
            Ok(())
        })
    }

    async fn hover(&self, element: &Element) -> Result<()> {
        self.push(format!("hover {}", element.selector));
        self.with_element(element, |_| Ok(()))
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.push(format!("press {}", key));
        self.with_state(|_| Ok(()))
    }

    async fn text(&self, element: &Element) -> Result<String> {
        self.with_element(element, |el| Ok(el.text.clone()))
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        self.with_element(element, |el| Ok(el.attrs.get(name).cloned()))
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool> {
        self.with_element(element, |el| Ok(el.enabled))
    }

    async fn close(&self) -> Result<()> {
        self.push("close".into());
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::ActionFailed("mock state poisoned".into()))?;
        state.closed = true;
        Ok(())
    }
}

type Factory = dyn Fn(u32) -> Result<MockDriver> + Send + Sync;

/// Builds a fresh [`MockDriver`] per launch. The closure receives the launch index.
pub struct MockLauncher {
    factory: Box<Factory>,
    launches: AtomicU32,
}

impl MockLauncher {
    pub fn new(factory: impl Fn(u32) -> Result<MockDriver> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            launches: AtomicU32::new(0),
        }
    }

    /// Launches performed so far.
    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new((self.factory)(n)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el() -> MockElement {
        MockElement::new("button")
            .attr("id", "send")
            .attr("class", "btn contact-submit")
            .attr("data-testid", "send-btn")
            .text("Send")
    }

    #[test]
    fn css_compound_matching() {
        let e = el();
        assert!(css_matches(&e, "button"));
        assert!(css_matches(&e, "#send"));
        assert!(css_matches(&e, "button.contact-submit"));
        assert!(css_matches(&e, "[data-testid=\"send-btn\"]"));
        assert!(css_matches(&e, "[data-testid*='send']"));
        assert!(css_matches(&e, "form > button#send"));
        assert!(css_matches(&e, "a, button"));
        assert!(!css_matches(&e, "input"));
        assert!(!css_matches(&e, ".primary"));
        assert!(!css_matches(&e, "[data-testid=\"send\"]"));
    }

    #[test]
    fn role_and_name_matching() {
        let e = el();
        assert!(e.matches(&Query::Role {
            role: "button".into(),
            name: Some("Send".into())
        }));
        assert!(!e.matches(&Query::Role {
            role: "link".into(),
            name: None
        }));
    }

    #[test]
    fn role_name_must_match_exactly() {
        let e = MockElement::new("button").text("Delete account");
        let role = |name: &str| Query::Role {
            role: "button".into(),
            name: Some(name.into()),
        };
        assert!(e.matches(&role(" Delete account ")));
        assert!(!e.matches(&role("Delete")));
        assert!(!e.matches(&role("delete account")));
    }

    #[tokio::test]
    async fn click_navigates() {
        let driver = MockDriver::new()
            .with_page(
                MockPage::new("http://a.test/", "Home").with(el().navigates_to("http://a.test/done")),
            )
            .with_page(MockPage::new("http://a.test/done", "Done"));
        driver.goto("http://a.test/").await.unwrap();
        let found = driver
            .find_visible(&Query::Css("#send".into()), 0)
            .await
            .unwrap()
            .unwrap();
        driver.click(&found).await.unwrap();
        assert_eq!(driver.title().await.unwrap(), "Done");
        assert_eq!(
            driver.actions(),
            vec!["goto http://a.test/", "click #send"]
        );
        driver.close().await.unwrap();
        assert!(matches!(driver.url().await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn redirects_land_on_the_target() {
        let driver = MockDriver::new()
            .with_page(MockPage::new("http://a.test/old", "").redirects_to("http://a.test/new"))
            .with_page(MockPage::new("http://a.test/new", "New"));
        driver.goto("http://a.test/old").await.unwrap();
        assert_eq!(driver.url().await.unwrap(), "http://a.test/new");
        assert_eq!(driver.title().await.unwrap(), "New");
        assert_eq!(driver.actions(), vec!["goto http://a.test/old"]);
    }
}
