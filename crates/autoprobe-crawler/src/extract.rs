//! In-page extraction. One script per category; each returns a JSON array.

use crate::classify::classify_raw;
use crate::locators::synthesize;
use autoprobe_ir::{
    BoundingBox, DiscoveredElement, DiscoveredForm, ElementType, FormStep, Heading, RuleKind,
    ValidationRule,
};
use autoprobe_locator::{Driver, Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use url::Url;

/// Helpers shared by every extraction script.
const PRELUDE_JS: &str = r#"
    const clean = s => (s || '').trim().replace(/\s+/g, ' ');

    function domPath(el) {
        const parts = [];
        let n = el;
        while (n && n.nodeType === 1 && n !== document.documentElement) {
            let s = n.tagName.toLowerCase();
            const p = n.parentElement;
            if (p) {
                const sibs = [...p.children].filter(c => c.tagName === n.tagName);
                if (sibs.length > 1) s += ':nth-of-type(' + (sibs.indexOf(n) + 1) + ')';
            }
            parts.unshift(s);
            n = p;
        }
        return parts.join(' > ');
    }

    function labelText(el) {
        if (el.id) {
            const label = document.querySelector('label[for=' + JSON.stringify(el.id) + ']');
            if (label) return clean(label.textContent);
        }
        const parent = el.closest('label');
        if (parent) {
            const clone = parent.cloneNode(true);
            clone.querySelectorAll('input, select, textarea').forEach(c => c.remove());
            const t = clean(clone.textContent);
            if (t) return t;
        }
        const by = el.getAttribute('aria-labelledby');
        if (by) {
            const lbl = document.getElementById(by);
            if (lbl) return clean(lbl.textContent);
        }
        return null;
    }

    function visible(el) {
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.display !== 'none' && s.visibility !== 'hidden';
    }

    function describe(el) {
        const r = el.getBoundingClientRect();
        const attributes = {};
        for (const a of el.attributes) attributes[a.name] = a.value;
        const type = el.getAttribute('type');
        return {
            tag: el.tagName.toLowerCase(),
            inputType: type,
            id: el.id || null,
            name: el.getAttribute('name'),
            classes: [...el.classList],
            text: clean(el.innerText || el.textContent).slice(0, 200),
            ariaLabel: el.getAttribute('aria-label'),
            placeholder: el.getAttribute('placeholder'),
            value: type === 'password' ? null : (el.value === undefined ? null : String(el.value)),
            href: el.getAttribute('href'),
            role: el.getAttribute('role'),
            label: labelText(el),
            autocomplete: el.getAttribute('autocomplete'),
            required: !!el.required || el.getAttribute('aria-required') === 'true',
            disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
            visible: visible(el),
            bbox: { x: r.x, y: r.y, width: r.width, height: r.height },
            path: domPath(el),
            attributes,
        };
    }
"#;

const FIELD_SELECTOR: &str = "input:not([type=hidden]):not([type=submit]):not([type=button]):not([type=reset]):not([type=image]), select, textarea";

/// Extraction category. Each maps to one marker-tagged script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Forms,
    Buttons,
    Links,
    Modals,
    Navigation,
    Headings,
    Meta,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Forms => "forms",
            Self::Buttons => "buttons",
            Self::Links => "links",
            Self::Modals => "modals",
            Self::Navigation => "navigation",
            Self::Headings => "headings",
            Self::Meta => "meta",
        }
    }

    /// Comment prefixed to the script, so tests can answer per category.
    pub fn marker(&self) -> String {
        format!("/*autoprobe:{}*/", self.name())
    }

    fn body(&self) -> String {
        match self {
            Self::Forms => format!(
                r#"
    const FIELDS = {fields};
    const STEP_MARKERS = '[data-step], .form-step, .step, .wizard-step, [class*="wizard"] fieldset, [aria-label*="step" i]';
    return [...document.querySelectorAll('form, [role="form"]')].map(form => {{
        const fields = [...form.querySelectorAll(FIELDS)];
        const submit = form.querySelector('button[type="submit"], input[type="submit"], button:not([type])');
        const cancel = [...form.querySelectorAll('button, a, input[type="button"], input[type="reset"]')]
            .find(b => b !== submit && /cancel|back|reset|close|dismiss/i.test(clean(b.innerText || b.value)));
        const steps = [...form.querySelectorAll(STEP_MARKERS)].map(step => ({{
            title: clean((step.querySelector('legend, h1, h2, h3, h4, h5, h6') || {{}}).textContent) || null,
            fieldPaths: [...step.querySelectorAll(FIELDS)].map(domPath),
        }}));
        return {{
            element: describe(form),
            fields: fields.map(describe),
            submit: submit ? describe(submit) : null,
            cancel: cancel ? describe(cancel) : null,
            steps,
        }};
    }});"#,
                fields = serde_json::Value::String(FIELD_SELECTOR.into())
            ),
            // Overlapping families; duplicates are removed by synthetic id.
            Self::Buttons => r#"
    return ['button', 'input[type="submit"]', 'input[type="button"]', 'input[type="reset"]', '[role="button"]']
        .flatMap(sel => [...document.querySelectorAll(sel)].map(describe));"#
                .into(),
            Self::Links => r#"
    return [...document.querySelectorAll('a[href]')].map(describe);"#
                .into(),
            Self::Modals => r#"
    return [...document.querySelectorAll('dialog, [role="dialog"], [role="alertdialog"], [aria-modal="true"], .modal')]
        .map(describe);"#
                .into(),
            Self::Navigation => r#"
    return [...document.querySelectorAll('nav a[href], [role="navigation"] a[href]')].map(describe);"#
                .into(),
            Self::Headings => r#"
    return [...document.querySelectorAll('h1, h2, h3, h4, h5, h6')]
        .map(h => ({ level: parseInt(h.tagName.substring(1), 10), text: clean(h.innerText || h.textContent) }))
        .filter(h => h.text);"#
                .into(),
            Self::Meta => r#"
    const d = document.querySelector('meta[name="description"]');
    return [{ description: d ? d.getAttribute('content') : null }];"#
                .into(),
        }
    }

    pub fn script(&self) -> String {
        format!(
            "{}(() => {{ {} const out = (() => {{ {} }})(); return JSON.stringify(out); }})()",
            self.marker(),
            PRELUDE_JS,
            self.body()
        )
    }
}

/// Element attributes as read in the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElement {
    pub tag: String,
    /// DOM path from `<html>`; drives the synthetic id.
    pub path: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub autocomplete: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    field_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawForm {
    element: RawElement,
    #[serde(default)]
    fields: Vec<serde_json::Value>,
    #[serde(default)]
    submit: Option<serde_json::Value>,
    #[serde(default)]
    cancel: Option<serde_json::Value>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    #[serde(default)]
    description: Option<String>,
}

/// Synthetic id: element type plus a hash of its DOM path.
///
/// FNV-1a, so ids stay the same across builds and toolchains.
pub(crate) fn synthetic_id(element_type: ElementType, path: &str) -> String {
    let hash = path.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    format!("{}-{:012x}", element_type, hash & 0xffff_ffff_ffff)
}

fn element_type_of(raw: &RawElement) -> ElementType {
    let by_tag = ElementType::classify(&raw.tag, raw.input_type.as_deref());
    match (by_tag, raw.role.as_deref()) {
        (ElementType::Other, Some("button")) => ElementType::Button,
        (ElementType::Other, Some("link")) => ElementType::Link,
        (ElementType::Other, Some("dialog" | "alertdialog")) => ElementType::Modal,
        (t, _) => t,
    }
}

fn validation_rules(raw: &RawElement) -> Vec<ValidationRule> {
    let mut rules = Vec::new();
    if raw.required {
        rules.push(ValidationRule {
            kind: RuleKind::Required,
            value: None,
            message: None,
        });
    }
    for (attr, kind) in [
        ("pattern", RuleKind::Pattern),
        ("min", RuleKind::Min),
        ("max", RuleKind::Max),
        ("minlength", RuleKind::MinLength),
        ("maxlength", RuleKind::MaxLength),
    ] {
        if let Some(v) = raw.attributes.get(attr).filter(|v| !v.is_empty()) {
            rules.push(ValidationRule {
                kind,
                value: Some(v.clone()),
                message: raw.attributes.get("title").cloned(),
            });
        }
    }
    rules
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turns raw page data into report elements.
pub(crate) struct Builder<'a> {
    pub page_url: &'a Url,
    pub timestamp: DateTime<Utc>,
}

impl Builder<'_> {
    pub fn element(&self, raw: &RawElement, forced: Option<ElementType>) -> DiscoveredElement {
        let element_type = forced.unwrap_or_else(|| element_type_of(raw));
        let is_field = matches!(
            element_type,
            ElementType::Input
                | ElementType::Textarea
                | ElementType::Select
                | ElementType::Checkbox
                | ElementType::Radio
        );
        DiscoveredElement {
            id: synthetic_id(element_type, &raw.path),
            element_type,
            locator: synthesize(raw, element_type),
            text: Some(raw.text.clone()).filter(|t| !t.is_empty()),
            aria_label: non_empty(&raw.aria_label),
            placeholder: non_empty(&raw.placeholder),
            name: non_empty(&raw.name),
            value: non_empty(&raw.value),
            href: raw
                .href
                .as_deref()
                .and_then(|h| self.page_url.join(h).ok())
                .map(|u| u.to_string()),
            is_visible: raw.visible,
            is_enabled: !raw.disabled,
            is_required: raw.required,
            bounding_box: raw.bbox,
            attributes: raw.attributes.clone(),
            input_type: is_field.then(|| classify_raw(raw)),
            validation_rules: if is_field {
                validation_rules(raw)
            } else {
                Vec::new()
            },
            timestamp: self.timestamp,
        }
    }

    /// Elements from raw values; an entry that does not parse is dropped alone.
    pub fn elements(
        &self,
        raw: Vec<serde_json::Value>,
        forced: Option<ElementType>,
    ) -> Vec<DiscoveredElement> {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|v| parse_one::<RawElement>(v))
            .map(|r| self.element(&r, forced))
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    }

    pub fn forms(&self, raw: Vec<serde_json::Value>) -> Vec<DiscoveredForm> {
        raw.into_iter()
            .filter_map(|v| parse_one::<RawForm>(v))
            .map(|f| self.form(f))
            .collect()
    }

    fn form(&self, raw: RawForm) -> DiscoveredForm {
        let element = self.element(&raw.element, Some(ElementType::Form));
        let fields = self.elements(raw.fields, None);
        let button = |v: Option<serde_json::Value>| {
            v.and_then(parse_one::<RawElement>)
                .map(|r| self.element(&r, None))
        };
        let submit_button = button(raw.submit);
        let cancel_button = button(raw.cancel);

        let steps: Vec<FormStep> = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, s)| FormStep {
                step_number: i as u32 + 1,
                title: non_empty(&s.title),
                field_ids: s
                    .field_paths
                    .iter()
                    .filter_map(|p| {
                        fields
                            .iter()
                            .find(|f| f.id.ends_with(&id_suffix(p)))
                            .map(|f| f.id.clone())
                    })
                    .collect(),
            })
            .collect();

        DiscoveredForm {
            element,
            fields,
            submit_button,
            cancel_button,
            is_multi_step: steps.len() > 1,
            steps,
        }
    }
}

/// Hash part of a synthetic id, shared by every element type.
fn id_suffix(path: &str) -> String {
    let id = synthetic_id(ElementType::Other, path);
    id.rsplit('-').next().unwrap_or_default().to_string()
}

fn parse_one<T: DeserializeOwned>(value: serde_json::Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("dropping unreadable element: {}", e);
            None
        }
    }
}

/// A script result as an array; scripts return `JSON.stringify`'d text.
fn decode(value: serde_json::Value) -> Result<Vec<serde_json::Value>> {
    let value = match value {
        serde_json::Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| Error::ActionFailed(format!("unreadable extraction result: {}", e)))?,
        v => v,
    };
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(Error::ActionFailed(format!(
            "extraction returned {} instead of an array",
            other
        ))),
    }
}

/// Run one category's script and return its raw entries.
pub(crate) async fn run(driver: &dyn Driver, category: Category) -> Result<Vec<serde_json::Value>> {
    let value = driver.evaluate(&category.script()).await?;
    decode(value)
}

pub(crate) fn headings(raw: Vec<serde_json::Value>) -> Vec<Heading> {
    raw.into_iter()
        .filter_map(parse_one::<Heading>)
        .filter(|h| (1..=6).contains(&h.level))
        .collect()
}

pub(crate) fn description(raw: Vec<serde_json::Value>) -> Option<String> {
    raw.into_iter()
        .filter_map(parse_one::<RawMeta>)
        .find_map(|m| non_empty(&m.description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder(url: &Url) -> Builder<'_> {
        Builder {
            page_url: url,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn scripts_carry_markers() {
        for c in [Category::Forms, Category::Buttons, Category::Headings] {
            let s = c.script();
            assert!(s.starts_with(&c.marker()));
            assert!(s.contains("JSON.stringify"));
        }
    }

    #[test]
    fn synthetic_id_is_stable_per_path() {
        let a = synthetic_id(ElementType::Button, "html > body > button");
        assert_eq!(a, synthetic_id(ElementType::Button, "html > body > button"));
        assert_ne!(a, synthetic_id(ElementType::Button, "html > body > button:nth-of-type(2)"));
        assert!(a.starts_with("button-"));
        assert_eq!(a, "button-3343e4b0ae5c");
    }

    #[test]
    fn bad_elements_are_dropped_alone() {
        let url = Url::parse("http://app.test/").unwrap();
        let elements = builder(&url).elements(
            vec![
                json!({"tag": "button", "path": "body > button", "text": "Go"}),
                json!({"tag": "button"}),
                json!("garbage"),
            ],
            None,
        );
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].text.as_deref(), Some("Go"));
    }

    #[test]
    fn overlapping_buttons_are_deduplicated() {
        let url = Url::parse("http://app.test/").unwrap();
        let raw = json!({"tag": "button", "path": "body > button", "role": "button", "text": "Go"});
        let elements = builder(&url).elements(vec![raw.clone(), raw], None);
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn links_are_absolute() {
        let url = Url::parse("http://app.test/blog/").unwrap();
        let el = builder(&url).element(
            &serde_json::from_value(json!({"tag": "a", "path": "a", "href": "post-1"})).unwrap(),
            None,
        );
        assert_eq!(el.href.as_deref(), Some("http://app.test/blog/post-1"));
        assert_eq!(el.element_type, ElementType::Link);
        assert!(el.input_type.is_none());
    }

    #[test]
    fn form_fields_are_classified_with_rules() {
        let url = Url::parse("http://app.test/contact").unwrap();
        let forms = builder(&url).forms(vec![json!({
            "element": {"tag": "form", "path": "body > form", "id": "contact"},
            "fields": [
                {"tag": "input", "path": "body > form > input", "inputType": "email", "required": true,
                 "attributes": {"maxlength": "80"}},
                {"tag": "textarea", "path": "body > form > textarea", "name": "message"}
            ],
            "submit": {"tag": "button", "path": "body > form > button", "inputType": "submit", "text": "Send"},
            "steps": []
        })]);
        let form = &forms[0];
        assert_eq!(form.fields.len(), 2);
        assert_eq!(form.fields[0].input_type, Some(autoprobe_ir::FieldKind::Email));
        assert_eq!(form.fields[0].validation_rules.len(), 2);
        assert_eq!(form.fields[1].input_type, Some(autoprobe_ir::FieldKind::Message));
        assert_eq!(
            form.submit_button.as_ref().map(|b| b.element_type),
            Some(ElementType::Submit)
        );
        assert!(!form.is_multi_step);
    }

    #[test]
    fn multi_step_forms_map_field_ids() {
        let url = Url::parse("http://app.test/signup").unwrap();
        let forms = builder(&url).forms(vec![json!({
            "element": {"tag": "form", "path": "form"},
            "fields": [
                {"tag": "input", "path": "form > fieldset:nth-of-type(1) > input", "name": "email"},
                {"tag": "input", "path": "form > fieldset:nth-of-type(2) > input", "name": "city"}
            ],
            "steps": [
                {"title": "Account", "fieldPaths": ["form > fieldset:nth-of-type(1) > input"]},
                {"title": "Address", "fieldPaths": ["form > fieldset:nth-of-type(2) > input"]}
            ]
        })]);
        let form = &forms[0];
        assert!(form.is_multi_step);
        assert_eq!(form.steps[1].field_ids, vec![form.fields[1].id.clone()]);
    }

    #[test]
    fn decode_accepts_text_and_arrays() {
        assert_eq!(decode(json!("[1,2]")).unwrap().len(), 2);
        assert_eq!(decode(json!([1])).unwrap().len(), 1);
        assert!(decode(json!(null)).unwrap().is_empty());
        assert!(decode(json!({"a": 1})).is_err());
    }
}
