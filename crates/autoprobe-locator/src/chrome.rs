//! Chrome-backed driver.

use crate::{Driver, Element, Error, Launcher, Query, Result};
use async_trait::async_trait;
use eoka::{Browser, Page, StealthConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: None,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// Launches one fresh Chrome process per session.
#[derive(Debug, Clone, Default)]
pub struct EokaLauncher {
    options: BrowserOptions,
}

impl EokaLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Launcher for EokaLauncher {
    async fn launch(&self) -> Result<Box<dyn Driver>> {
        Ok(Box::new(EokaDriver::launch(&self.options).await?))
    }
}

/// A single Chrome page behind the [`Driver`] trait.
pub struct EokaDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    closed: AtomicBool,
}

impl EokaDriver {
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let stealth = StealthConfig {
            headless: options.headless,
            proxy: options.proxy.clone(),
            user_agent: options.user_agent.clone(),
            viewport_width: options.viewport_width,
            viewport_height: options.viewport_height,
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            options.headless, options.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            closed: AtomicBool::new(false),
        })
    }

    fn page(&self) -> Result<&Page> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }
        Ok(&self.page)
    }

    async fn eval_json<T: serde::de::DeserializeOwned>(&self, js: &str) -> Result<T> {
        let json_str: String = self.page()?.evaluate(js).await?;
        serde_json::from_str(&json_str)
            .map_err(|e| Error::ActionFailed(format!("unexpected page response: {}", e)))
    }
}

fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Whether `e` is an exception thrown by the evaluated script, as opposed
/// to a failure of the browser session itself.
fn is_page_exception(e: &eoka::Error) -> bool {
    matches!(e, eoka::Error::CdpSimple(msg) if msg.starts_with("JavaScript error"))
}

/// Resolves a query to visible elements. Called as `RESOLVE_JS(query, limit)`.
const RESOLVE_JS: &str = r#"
((q, limit) => {
    const lc = s => (s || '').toLowerCase().trim();
    const norm = s => lc(s).replace(/\s+/g, ' ');

    const ROLE_SELECTORS = {
        button: 'button, input[type="button"], input[type="submit"], input[type="reset"], input[type="image"], [role="button"]',
        link: 'a[href], [role="link"]',
        textbox: 'input:not([type]), input[type="text"], input[type="email"], input[type="password"], input[type="search"], input[type="tel"], input[type="url"], input[type="number"], textarea, [role="textbox"], [contenteditable="true"]',
        checkbox: 'input[type="checkbox"], [role="checkbox"]',
        radio: 'input[type="radio"], [role="radio"]',
        combobox: 'select, [role="combobox"], [role="listbox"]',
        dialog: 'dialog, [role="dialog"], [role="alertdialog"]',
        heading: 'h1, h2, h3, h4, h5, h6, [role="heading"]',
        navigation: 'nav, [role="navigation"]',
        form: 'form, [role="form"]',
    };

    function selector(el) {
        if (el.id && document.querySelectorAll('#' + CSS.escape(el.id)).length === 1) {
            return '#' + CSS.escape(el.id);
        }
        const path = [];
        let n = el;
        while (n && n.nodeType === 1) {
            let s = n.tagName.toLowerCase();
            if (n.id && document.querySelectorAll('#' + CSS.escape(n.id)).length === 1) {
                path.unshift('#' + CSS.escape(n.id));
                break;
            }
            const p = n.parentElement;
            if (p) {
                const sibs = [...p.children].filter(c => c.tagName === n.tagName);
                if (sibs.length > 1) s += ':nth-of-type(' + (sibs.indexOf(n) + 1) + ')';
            }
            path.unshift(s);
            n = p;
        }
        return path.join(' > ');
    }

    function visible(el) {
        const r = el.getBoundingClientRect();
        if (r.width <= 0 || r.height <= 0) return false;
        const s = getComputedStyle(el);
        return s.display !== 'none' && s.visibility !== 'hidden' && parseFloat(s.opacity) >= 0.1;
    }

    function labelText(el) {
        if (el.id) {
            const label = document.querySelector('label[for=' + JSON.stringify(el.id) + ']');
            if (label) return label.textContent.trim();
        }
        const parent = el.closest('label');
        if (parent) {
            const clone = parent.cloneNode(true);
            clone.querySelectorAll('input, select, textarea').forEach(c => c.remove());
            const t = clone.textContent.trim();
            if (t) return t;
        }
        const by = el.getAttribute('aria-labelledby');
        if (by) {
            const lbl = document.getElementById(by);
            if (lbl) return lbl.textContent.trim();
        }
        return '';
    }

    function accessibleName(el) {
        return el.getAttribute('aria-label') || labelText(el) || (el.innerText || '').trim()
            || el.value || el.title || el.getAttribute('alt') || el.placeholder || '';
    }

    function textMatches(hay, needle, mode) {
        switch (mode) {
            case 'exact': return (hay || '').trim() === needle.trim();
            case 'contains': return (hay || '').includes(needle);
            case 'normalized': return norm(hay).includes(norm(needle));
            default: return lc(hay).includes(lc(needle));
        }
    }

    let found = [];
    switch (q.type) {
        case 'css':
            found = [...document.querySelectorAll(q.value)];
            break;
        case 'xpath': {
            const snap = document.evaluate(q.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (let i = 0; i < snap.snapshotLength; i++) {
                const n = snap.snapshotItem(i);
                if (n.nodeType === 1) found.push(n);
            }
            break;
        }
        case 'text': {
            const hits = [...document.body.querySelectorAll('*')]
                .filter(el => !['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(el.tagName))
                .filter(el => textMatches(el.innerText || el.value || '', q.value, q.mode));
            const set = new Set(hits);
            found = hits.filter(el => ![...el.querySelectorAll('*')].some(c => set.has(c)));
            break;
        }
        case 'role': {
            const sel = ROLE_SELECTORS[q.value] || ('[role=' + JSON.stringify(q.value) + ']');
            found = [...document.querySelectorAll(sel)];
            if (q.name != null) found = found.filter(el => (accessibleName(el) || '').trim() === String(q.name).trim());
            break;
        }
        case 'label': {
            found = [...document.querySelectorAll('input, select, textarea, [aria-label]')]
                .filter(el => textMatches(el.getAttribute('aria-label') || labelText(el), q.value, 'icase')
                    && (el.getAttribute('aria-label') || labelText(el)));
            break;
        }
        case 'placeholder':
            found = [...document.querySelectorAll('[placeholder]')]
                .filter(el => textMatches(el.getAttribute('placeholder'), q.value, 'icase'));
            break;
    }

    return JSON.stringify(found.filter(visible).slice(0, limit).map(el => {
        const r = el.getBoundingClientRect();
        return {
            selector: selector(el),
            tag: el.tagName.toLowerCase(),
            text: (el.innerText || el.value || '').trim().slice(0, 80),
            bbox: { x: r.x, y: r.y, width: r.width, height: r.height },
        };
    }));
})
"#;

#[async_trait]
impl Driver for EokaDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page()?.goto(url).await?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, idle_ms: u64, timeout_ms: u64) -> Result<()> {
        self.page()?
            .wait_for_network_idle(idle_ms, timeout_ms)
            .await?;
        Ok(())
    }

    async fn wait(&self, ms: u64) {
        self.page.wait(ms).await;
    }

    async fn url(&self) -> Result<String> {
        Ok(self.page()?.url().await?)
    }

    async fn title(&self) -> Result<String> {
        Ok(self.page()?.title().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page()?.screenshot().await?)
    }

    async fn evaluate(&self, js: &str) -> Result<serde_json::Value> {
        Ok(self.page()?.evaluate(js).await?)
    }

    async fn query(&self, query: &Query, limit: usize) -> Result<Vec<Element>> {
        let js = format!("{}({},{})", RESOLVE_JS, query.to_js_arg(), limit);
        match self.eval_json(&js).await {
            Ok(found) => Ok(found),
            // A malformed CSS or XPath expression throws inside the page.
            Err(Error::Browser(e)) if is_page_exception(&e) => {
                debug!("query {} failed in page: {}", query, e);
                Err(Error::InvalidSelector(query.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.page()?.click(&element.selector).await?;
        Ok(())
    }

    async fn fill(&self, element: &Element, value: &str) -> Result<()> {
        self.page()?.fill(&element.selector, value).await?;
        Ok(())
    }

    async fn select_option(&self, element: &Element, value: &str) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const sel = document.querySelector({sel});
                if (!sel) return 'element_not_found';
                if (!sel.options) return 'not_a_select';
                const opt = Array.from(sel.options).find(o => o.value === {val} || o.text.trim() === {val});
                if (!opt) return 'option_not_found';
                sel.value = opt.value;
                sel.dispatchEvent(new Event('input', {{ bubbles: true }}));
                sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return 'ok';
            }})()"#,
            sel = js_str(&element.selector),
            val = js_str(value)
        );
        let result: String = self.page()?.evaluate(&js).await?;
        match result.as_str() {
            "ok" => Ok(()),
            "option_not_found" => Err(Error::ActionFailed(format!(
                "option '{}' not found in '{}'",
                value, element.selector
            ))),
            other => Err(Error::ActionFailed(format!(
                "select on '{}' failed: {}",
                element.selector, other
            ))),
        }
    }

    async fn set_checked(&self, element: &Element, checked: bool) -> Result<()> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? !!el.checked : null; }})()",
            js_str(&element.selector)
        );
        let current: Option<bool> = self.page()?.evaluate(&js).await?;
        match current {
            Some(state) if state == checked => Ok(()),
            Some(_) => self.click(element).await,
            None => Err(Error::ActionFailed(format!(
                "checkbox '{}' disappeared",
                element.selector
            ))),
        }
    }

    async fn hover(&self, element: &Element) -> Result<()> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                return {{ x: rect.x + rect.width / 2, y: rect.y + rect.height / 2 }};
            }})()"#,
            js_str(&element.selector)
        );
        let page = self.page()?;
        let coords: Option<serde_json::Value> = page.evaluate(&js).await?;
        let Some(c) = coords else {
            return Err(Error::ActionFailed(format!(
                "hover target '{}' disappeared",
                element.selector
            )));
        };
        let x = c["x"].as_f64().unwrap_or(0.0);
        let y = c["y"].as_f64().unwrap_or(0.0);
        page.session()
            .dispatch_mouse_event(eoka::cdp::MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        page.wait(100).await;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.page()?.human().press_key(key).await?;
        Ok(())
    }

    async fn text(&self, element: &Element) -> Result<String> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? (el.innerText || el.value || '').trim() : ''; }})()",
            js_str(&element.selector)
        );
        Ok(self.page()?.evaluate(&js).await?)
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_str(&element.selector),
            js_str(name)
        );
        Ok(self.page()?.evaluate(&js).await?)
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                return !el.disabled && el.getAttribute('aria-disabled') !== 'true' && !el.closest('fieldset[disabled]');
            }})()"#,
            js_str(&element.selector)
        );
        Ok(self.page()?.evaluate(&js).await?)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        if let Some(browser) = self.browser.lock().await.take() {
            browser.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_script_exceptions_count_as_bad_selectors() {
        let thrown = eoka::Error::CdpSimple(
            "JavaScript error: SyntaxError: 'a[' is not a valid selector at 3:12".into(),
        );
        assert!(is_page_exception(&thrown));

        assert!(!is_page_exception(&eoka::Error::CdpSimple("Target closed".into())));
        assert!(!is_page_exception(&eoka::Error::ChromeNotFound));
        assert!(!is_page_exception(&eoka::Error::Timeout("Runtime.evaluate".into())));
    }
}
