use crate::extract::RawElement;
use autoprobe_ir::{Candidate, CandidateKind, ElementType, Locator};
use autoprobe_locator::heuristics::TEST_ID_ATTRIBUTES;

/// Longest visible text used as a text candidate.
const MAX_TEXT_CANDIDATE: usize = 50;

/// Shortest class name considered meaningful.
const MIN_CLASS_LEN: usize = 4;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn implicit_role(raw: &RawElement, element_type: ElementType) -> Option<&str> {
    if let Some(role) = raw.role.as_deref().filter(|r| !r.is_empty()) {
        return Some(role);
    }
    match element_type {
        ElementType::Button | ElementType::Submit => Some("button"),
        ElementType::Link => Some("link"),
        ElementType::Input | ElementType::Textarea => Some("textbox"),
        ElementType::Checkbox => Some("checkbox"),
        ElementType::Radio => Some("radio"),
        ElementType::Select => Some("combobox"),
        ElementType::Modal => Some("dialog"),
        ElementType::Form | ElementType::Other => None,
    }
}

fn is_simple_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn first(values: &[Option<&str>]) -> Option<String> {
    values
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Ranked locator for an extracted element.
///
/// Candidates come from the role and accessible name, test-id attributes,
/// aria-label, short visible text, id and the first meaningful class.
pub fn synthesize(raw: &RawElement, element_type: ElementType) -> Locator {
    let text = raw.text.trim();
    let name = first(&[
        raw.aria_label.as_deref(),
        raw.label.as_deref(),
        Some(text),
        raw.value.as_deref().filter(|_| element_type == ElementType::Submit),
    ]);

    let mut candidates = Vec::new();

    if let (Some(role), Some(name)) = (implicit_role(raw, element_type), name.as_deref()) {
        candidates.push(Candidate::new(
            CandidateKind::Role,
            format!("role={}[name={}]", role, quote(name)),
        ));
    }

    for attr in TEST_ID_ATTRIBUTES {
        if let Some(v) = raw.attributes.get(*attr).filter(|v| !v.is_empty()) {
            candidates.push(Candidate::new(
                CandidateKind::TestId,
                format!("[{}={}]", attr, quote(v)),
            ));
        }
    }

    if let Some(aria) = raw.aria_label.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        candidates.push(Candidate::new(CandidateKind::AriaLabel, format!("label={}", aria)));
    }

    if !text.is_empty() && text.chars().count() < MAX_TEXT_CANDIDATE {
        candidates.push(Candidate::new(CandidateKind::Text, format!("text={}", quote(text))));
    }

    if let Some(id) = raw.id.as_deref().filter(|s| !s.is_empty()) {
        let selector = if is_simple_ident(id) {
            format!("#{}", id)
        } else {
            format!("[id={}]", quote(id))
        };
        candidates.push(Candidate::new(CandidateKind::Id, selector));
    }

    if let Some(class) = raw
        .classes
        .iter()
        .find(|c| c.len() >= MIN_CLASS_LEN && !c.starts_with('_') && is_simple_ident(c))
    {
        candidates.push(Candidate::new(
            CandidateKind::Class,
            format!("{}.{}", raw.tag, class),
        ));
    }

    let description = first(&[
        name.as_deref(),
        raw.placeholder.as_deref(),
        raw.name.as_deref(),
    ])
    .unwrap_or_default();

    Locator::from_candidates(candidates, element_type.name(), description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprobe_ir::{StrategyKind, DEGRADED_CONFIDENCE};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawElement {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_id_outranks_everything() {
        let r = raw(json!({
            "tag": "button", "path": "form > button", "id": "send", "text": "Send",
            "classes": ["contact-submit"],
            "attributes": {"data-testid": "send-btn", "data-cy": "send"}
        }));
        let l = synthesize(&r, ElementType::Submit);
        assert_eq!(l.primary, "[data-testid=\"send-btn\"]");
        assert_eq!(l.strategy_kind, StrategyKind::TestId);
        assert_eq!(
            l.fallbacks,
            vec![
                "[data-cy=\"send\"]".to_string(),
                "role=button[name=\"Send\"]".to_string(),
                "#send".to_string(),
                "text=\"Send\"".to_string(),
                "button.contact-submit".to_string(),
            ]
        );
        assert_eq!(l.description, "Send");
    }

    #[test]
    fn label_gives_role_name_for_inputs() {
        let r = raw(json!({
            "tag": "input", "path": "form > input", "inputType": "email",
            "id": "email", "label": "Email", "placeholder": "you@example.com"
        }));
        let l = synthesize(&r, ElementType::Input);
        assert_eq!(l.primary, "role=textbox[name=\"Email\"]");
        assert_eq!(l.fallbacks, vec!["#email".to_string()]);
    }

    #[test]
    fn long_text_and_short_classes_are_skipped() {
        let r = raw(json!({
            "tag": "div", "path": "div",
            "text": "x".repeat(60), "classes": ["btn", "_hidden", "card"]
        }));
        let l = synthesize(&r, ElementType::Other);
        assert_eq!(l.primary, "div.card");
    }

    #[test]
    fn nothing_usable_degrades() {
        let r = raw(json!({"tag": "select", "path": "select"}));
        let l = synthesize(&r, ElementType::Select);
        assert_eq!(l.primary, "select");
        assert_eq!(l.confidence, DEGRADED_CONFIDENCE);
    }

    #[test]
    fn odd_ids_use_attribute_selector() {
        let r = raw(json!({"tag": "span", "path": "span", "id": "a:b"}));
        assert_eq!(synthesize(&r, ElementType::Other).primary, "[id=\"a:b\"]");
    }
}
