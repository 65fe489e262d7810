//! Healing heuristics, tried in order once a locator's own selectors are exhausted.
//!
//! Each heuristic derives looser [`Query`]s from the locator's strings and its
//! description. They only inspect the page as it currently is; the resolver has
//! already spent its waiting budget on the primary and fallbacks.

use crate::query::unquote;
use crate::{Driver, Element, Query, Result, TextMatch};
use async_trait::async_trait;
use autoprobe_ir::{HealReason, Locator, StrategyKind};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Roles probed by the role + accessible name heuristic.
pub const HEALING_ROLES: &[&str] = &["button", "link", "textbox", "checkbox", "combobox", "dialog"];

/// Test-id attributes recognised in selectors.
pub const TEST_ID_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test-id",
    "data-test",
    "data-cy",
    "data-qa",
];

/// Number of same-tag elements inspected by the sibling scan.
pub const SIBLING_SCAN_LIMIT: usize = 10;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\[placeholder\s*[*^$~|]?=\s*["']([^"']+)["']|^placeholder=(.+)$)"#)
        .expect("static regex")
});

static ARIA_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\[aria-label\s*[*^$~|]?=\s*["']([^"']+)["']|^label=(.+)$)"#)
        .expect("static regex")
});

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(-?[A-Za-z_][\w-]*)").expect("static regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9]*)").expect("static regex"));

/// An element found by a heuristic, and the selector that found it.
#[derive(Debug, Clone)]
pub struct Healed {
    pub selector: String,
    pub element: Element,
}

#[async_trait]
pub trait Heuristic: Send + Sync {
    fn reason(&self) -> HealReason;

    /// Candidate queries, most specific first.
    fn queries(&self, locator: &Locator) -> Vec<Query>;

    async fn attempt(&self, driver: &dyn Driver, locator: &Locator) -> Result<Option<Healed>> {
        for query in self.queries(locator) {
            debug!("{}: trying {}", self.reason(), query);
            if let Some(element) = driver.find_visible(&query, 0).await? {
                return Ok(Some(Healed {
                    selector: query.to_string(),
                    element,
                }));
            }
        }
        Ok(None)
    }
}

/// The full ordered heuristic chain.
pub fn default_heuristics() -> Vec<Box<dyn Heuristic>> {
    vec![
        Box::new(TextRelaxation),
        Box::new(RoleName),
        Box::new(PlaceholderMatch),
        Box::new(LabelMatch),
        Box::new(PartialClass),
        Box::new(PartialData),
        Box::new(SiblingScan),
    ]
}

/// Looser text dialects for `text` locators.
pub struct TextRelaxation;

impl Heuristic for TextRelaxation {
    fn reason(&self) -> HealReason {
        HealReason::TextRelaxation
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        if locator.strategy_kind != StrategyKind::Text {
            return Vec::new();
        }
        let Some(text) = locator_text(&locator.primary) else {
            return Vec::new();
        };
        [TextMatch::Contains, TextMatch::IgnoreCase, TextMatch::Normalized]
            .into_iter()
            .map(|mode| Query::Text {
                value: text.clone(),
                mode,
            })
            .collect()
    }
}

/// Accessible name == description, for each common interactive role.
pub struct RoleName;

impl Heuristic for RoleName {
    fn reason(&self) -> HealReason {
        HealReason::RoleName
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        let name = locator.description.trim();
        if name.is_empty() {
            return Vec::new();
        }
        HEALING_ROLES
            .iter()
            .map(|role| Query::Role {
                role: role.to_string(),
                name: Some(name.to_string()),
            })
            .collect()
    }
}

pub struct PlaceholderMatch;

impl Heuristic for PlaceholderMatch {
    fn reason(&self) -> HealReason {
        HealReason::Placeholder
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        dedup(
            locator
                .selectors()
                .filter_map(|s| capture_either(&PLACEHOLDER_RE, s))
                .map(Query::Placeholder)
                .collect(),
        )
    }
}

/// Label or aria-label embedded in the selectors, else the description.
pub struct LabelMatch;

impl Heuristic for LabelMatch {
    fn reason(&self) -> HealReason {
        HealReason::Label
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        let mut labels: Vec<String> = locator
            .selectors()
            .filter_map(|s| capture_either(&ARIA_LABEL_RE, s))
            .collect();
        if labels.is_empty() && !locator.description.trim().is_empty() {
            labels.push(locator.description.trim().to_string());
        }
        dedup(labels.into_iter().map(Query::Label).collect())
    }
}

pub struct PartialClass;

impl Heuristic for PartialClass {
    fn reason(&self) -> HealReason {
        HealReason::PartialClass
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        class_prefix(&locator.primary)
            .map(|prefix| vec![Query::Css(format!("[class*=\"{}\"]", prefix))])
            .unwrap_or_default()
    }
}

pub struct PartialData;

impl Heuristic for PartialData {
    fn reason(&self) -> HealReason {
        HealReason::PartialData
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        data_prefixes(&locator.primary)
            .into_iter()
            .map(|(attr, prefix)| Query::Css(format!("[{}*=\"{}\"]", attr, prefix)))
            .collect()
    }
}

/// Same-tag elements whose text mentions the description.
pub struct SiblingScan;

#[async_trait]
impl Heuristic for SiblingScan {
    fn reason(&self) -> HealReason {
        HealReason::SiblingScan
    }

    fn queries(&self, locator: &Locator) -> Vec<Query> {
        leading_tag(&locator.primary)
            .map(|tag| vec![Query::Css(tag)])
            .unwrap_or_default()
    }

    async fn attempt(&self, driver: &dyn Driver, locator: &Locator) -> Result<Option<Healed>> {
        let needle = locator.description.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }
        for query in self.queries(locator) {
            let siblings = driver.query(&query, SIBLING_SCAN_LIMIT).await?;
            debug!("{}: {} '{}' candidates", self.reason(), siblings.len(), query);
            if let Some(element) = siblings
                .into_iter()
                .find(|el| el.text.to_lowercase().contains(&needle))
            {
                return Ok(Some(Healed {
                    selector: element.selector.clone(),
                    element,
                }));
            }
        }
        Ok(None)
    }
}

/// Text carried by a `text` locator's primary string.
fn locator_text(primary: &str) -> Option<String> {
    let text = match Query::parse(primary) {
        Ok(Query::Text { value, .. }) => value,
        _ => unquote(primary).to_string(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn capture_either(re: &Regex, s: &str) -> Option<String> {
    let caps = re.captures(s.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| unquote(m.as_str()).to_string())
        .filter(|v| !v.is_empty())
}

/// First segment of the primary's first class token, when longer than 3 chars.
pub fn class_prefix(primary: &str) -> Option<String> {
    let class = CLASS_RE.captures(primary)?.get(1)?.as_str();
    let segment = class.split(['-', '_']).find(|s| !s.is_empty())?;
    (segment.len() > 3).then(|| segment.to_string())
}

/// `(attribute, value minus its last hyphen segment)` for each test-id attribute in the primary.
pub fn data_prefixes(primary: &str) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    for attr in TEST_ID_ATTRIBUTES {
        let re = match Regex::new(&format!(
            r#"\[{}\s*[*^$~|]?=\s*["']([^"']+)["']\]"#,
            regex::escape(attr)
        )) {
            Ok(re) => re,
            Err(_) => continue,
        };
        for caps in re.captures_iter(primary) {
            if let Some((prefix, _)) = caps[1].rsplit_once('-') {
                if !prefix.is_empty() {
                    out.push((*attr, prefix.to_string()));
                }
            }
        }
    }
    out
}

/// Tag name a CSS primary starts with.
pub fn leading_tag(primary: &str) -> Option<String> {
    if !matches!(Query::parse(primary), Ok(Query::Css(_))) {
        return None;
    }
    TAG_RE
        .captures(primary.trim())
        .map(|c| c[1].to_lowercase())
}

fn dedup(queries: Vec<Query>) -> Vec<Query> {
    let mut out: Vec<Query> = Vec::with_capacity(queries.len());
    for q in queries {
        if !out.contains(&q) {
            out.push(q);
        }
    }
    out
}
