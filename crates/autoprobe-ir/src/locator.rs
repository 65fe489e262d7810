use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector dialect of a locator's primary string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Role,
    Text,
    #[serde(rename = "testid")]
    TestId,
    Label,
    Css,
    Xpath,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Text => "text",
            Self::TestId => "testid",
            Self::Label => "label",
            Self::Css => "css",
            Self::Xpath => "xpath",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a locator candidate came from when it was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    TestId,
    Role,
    AriaLabel,
    Id,
    Text,
    Class,
}

/// Fixed confidence per candidate kind.
///
/// Ties keep synthesis order (the sort is stable), so this table together with
/// the order candidates are pushed fully determines the primary/fallback split.
pub const CONFIDENCE_TABLE: &[(CandidateKind, f64)] = &[
    (CandidateKind::TestId, 0.95),
    (CandidateKind::Role, 0.9),
    (CandidateKind::AriaLabel, 0.85),
    (CandidateKind::Id, 0.8),
    (CandidateKind::Text, 0.7),
    (CandidateKind::Class, 0.5),
];

/// Confidence of the type-name selector used when nothing better exists.
pub const DEGRADED_CONFIDENCE: f64 = 0.1;

impl CandidateKind {
    pub fn confidence(&self) -> f64 {
        CONFIDENCE_TABLE
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, c)| *c)
            .unwrap_or(DEGRADED_CONFIDENCE)
    }

    pub fn strategy(&self) -> StrategyKind {
        match self {
            Self::TestId => StrategyKind::TestId,
            Self::Role => StrategyKind::Role,
            Self::AriaLabel => StrategyKind::Label,
            Self::Text => StrategyKind::Text,
            Self::Id | Self::Class => StrategyKind::Css,
        }
    }
}

/// One selector proposed for an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub selector: String,
}

impl Candidate {
    pub fn new(kind: CandidateKind, selector: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
        }
    }
}

/// An element reference with a ranked list of resolution strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    /// First selector to try.
    pub primary: String,
    /// Alternatives, most specific first.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Dialect of `primary`.
    pub strategy_kind: StrategyKind,
    /// How uniquely `primary` is expected to identify the element.
    pub confidence: f64,
    /// Free-text hint for the healing heuristics.
    #[serde(default)]
    pub description: String,
}

impl Locator {
    pub fn new(primary: impl Into<String>, strategy_kind: StrategyKind, confidence: f64) -> Self {
        Self {
            primary: primary.into(),
            fallbacks: Vec::new(),
            strategy_kind,
            confidence,
            description: String::new(),
        }
    }

    /// Plain CSS locator, used for hand-written steps.
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(selector, StrategyKind::Css, 0.8)
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build a locator from unordered candidates.
    ///
    /// Candidates are ranked by the fixed confidence table; the best becomes the
    /// primary and the rest become fallbacks. With no candidates the element's
    /// type name is used at [`DEGRADED_CONFIDENCE`].
    pub fn from_candidates(
        mut candidates: Vec<Candidate>,
        type_name: &str,
        description: impl Into<String>,
    ) -> Self {
        let mut seen = std::collections::HashSet::new();
        candidates.retain(|c| seen.insert(c.selector.clone()));
        candidates.sort_by(|a, b| {
            b.kind
                .confidence()
                .partial_cmp(&a.kind.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut iter = candidates.into_iter();
        match iter.next() {
            Some(best) => Self {
                primary: best.selector,
                strategy_kind: best.kind.strategy(),
                confidence: best.kind.confidence(),
                fallbacks: iter.map(|c| c.selector).collect(),
                description: description.into(),
            },
            None => Self::new(type_name, StrategyKind::Css, DEGRADED_CONFIDENCE)
                .with_description(description),
        }
    }

    /// Primary followed by every fallback.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(|s| s.as_str()))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.strategy_kind, self.primary)?;
        if !self.fallbacks.is_empty() {
            write!(f, " (+{} fallbacks)", self.fallbacks.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_table_is_descending() {
        let values: Vec<f64> = CONFIDENCE_TABLE.iter().map(|(_, c)| *c).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(CandidateKind::TestId.confidence(), 0.95);
        assert_eq!(CandidateKind::Class.confidence(), 0.5);
    }

    #[test]
    fn from_candidates_ranks_by_confidence() {
        let locator = Locator::from_candidates(
            vec![
                Candidate::new(CandidateKind::Text, "text=\"Send\""),
                Candidate::new(CandidateKind::Class, ".contact-submit"),
                Candidate::new(CandidateKind::TestId, "[data-testid=\"send-btn\"]"),
                Candidate::new(CandidateKind::Role, "role=button[name=\"Send\"]"),
            ],
            "button",
            "Send",
        );

        assert_eq!(locator.primary, "[data-testid=\"send-btn\"]");
        assert_eq!(locator.strategy_kind, StrategyKind::TestId);
        assert_eq!(locator.confidence, 0.95);
        assert_eq!(
            locator.fallbacks,
            vec![
                "role=button[name=\"Send\"]".to_string(),
                "text=\"Send\"".to_string(),
                ".contact-submit".to_string(),
            ]
        );
        assert_eq!(locator.description, "Send");
    }

    #[test]
    fn from_candidates_keeps_push_order_on_ties() {
        let locator = Locator::from_candidates(
            vec![
                Candidate::new(CandidateKind::TestId, "[data-testid=\"a\"]"),
                Candidate::new(CandidateKind::TestId, "[data-cy=\"b\"]"),
            ],
            "button",
            "",
        );
        assert_eq!(locator.primary, "[data-testid=\"a\"]");
        assert_eq!(locator.fallbacks, vec!["[data-cy=\"b\"]".to_string()]);
    }

    #[test]
    fn from_candidates_degrades_to_type_name() {
        let locator = Locator::from_candidates(Vec::new(), "select", "");
        assert_eq!(locator.primary, "select");
        assert_eq!(locator.confidence, DEGRADED_CONFIDENCE);
        assert!(locator.fallbacks.is_empty());
    }

    #[test]
    fn from_candidates_drops_duplicate_selectors() {
        let locator = Locator::from_candidates(
            vec![
                Candidate::new(CandidateKind::Id, "#email"),
                Candidate::new(CandidateKind::Id, "#email"),
            ],
            "input",
            "",
        );
        assert!(locator.fallbacks.is_empty());
    }

    #[test]
    fn strategy_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&StrategyKind::TestId).unwrap(),
            "\"testid\""
        );
        assert_eq!(
            serde_json::from_str::<StrategyKind>("\"xpath\"").unwrap(),
            StrategyKind::Xpath
        );
    }
}
