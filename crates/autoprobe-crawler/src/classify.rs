use crate::extract::RawElement;
use autoprobe_ir::FieldKind;
use regex::Regex;
use std::sync::LazyLock;

/// Ordered kind → pattern table. The first matching row wins.
const FIELD_PATTERNS: &[(FieldKind, &str)] = &[
    (FieldKind::Email, r"e-?mail"),
    (FieldKind::Password, r"pass(word)?|\bpwd\b"),
    (FieldKind::Username, r"user.?name|\blogin\b|\bhandle\b"),
    (FieldKind::FirstName, r"first.?name|given.?name|\bfname\b"),
    (FieldKind::LastName, r"last.?name|family.?name|surname|\blname\b"),
    (FieldKind::Phone, r"phone|\btel\b|mobile|\bcell\b"),
    (FieldKind::CreditCard, r"card.?number|credit.?card|cc.?num"),
    (FieldKind::Cvv, r"\bcvv\b|\bcvc\b|\bcsc\b|security.?code"),
    (FieldKind::CardExpiry, r"expir|exp.?date|\bexp\b|mm.?yy"),
    (FieldKind::Company, r"company|organi[sz]ation|employer"),
    (FieldKind::Address, r"address|street"),
    (FieldKind::City, r"\bcity\b|\btown\b"),
    (FieldKind::State, r"\bstate\b|province|\bregion\b"),
    (FieldKind::Country, r"country"),
    (FieldKind::Zip, r"\bzip|postal|postcode"),
    (FieldKind::Age, r"\bage\b"),
    (FieldKind::Date, r"\bdate\b|\bdob\b|birth"),
    (FieldKind::Time, r"\btime\b"),
    (FieldKind::Search, r"search|query|\bq\b"),
    (FieldKind::Url, r"\burl\b|website|homepage"),
    (FieldKind::Number, r"quantity|amount|\bqty\b|\bcount\b"),
    (FieldKind::Message, r"message|comment|feedback|inquiry|enquiry|\bnotes?\b|\bbody\b"),
    (FieldKind::FullName, r"full.?name|your.?name|\bname\b"),
];

static COMPILED: LazyLock<Vec<(FieldKind, Regex)>> = LazyLock::new(|| {
    FIELD_PATTERNS
        .iter()
        .filter_map(|(kind, p)| Regex::new(p).ok().map(|re| (*kind, re)))
        .collect()
});

/// Kind implied by a declared `type` attribute.
fn declared_kind(input_type: &str) -> Option<FieldKind> {
    Some(match input_type.to_ascii_lowercase().as_str() {
        "email" => FieldKind::Email,
        "password" => FieldKind::Password,
        "tel" => FieldKind::Phone,
        "url" => FieldKind::Url,
        "number" => FieldKind::Number,
        "date" => FieldKind::Date,
        "time" => FieldKind::Time,
        "datetime-local" => FieldKind::Datetime,
        "search" => FieldKind::Search,
        _ => return None,
    })
}

/// Semantic kind of a form field.
///
/// A declared input type wins; otherwise the field's name, id, placeholder,
/// label and autocomplete hint are scanned against the pattern table.
pub fn field_kind(
    input_type: Option<&str>,
    hints: &[Option<&str>],
) -> FieldKind {
    if let Some(kind) = input_type.and_then(declared_kind) {
        return kind;
    }
    let haystack = hints
        .iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    COMPILED
        .iter()
        .find(|(_, re)| re.is_match(&haystack))
        .map(|(kind, _)| *kind)
        .unwrap_or(FieldKind::Text)
}

pub(crate) fn classify_raw(raw: &RawElement) -> FieldKind {
    field_kind(
        raw.input_type.as_deref(),
        &[
            raw.name.as_deref(),
            raw.id.as_deref(),
            raw.placeholder.as_deref(),
            raw.label.as_deref(),
            raw.autocomplete.as_deref(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins() {
        assert_eq!(field_kind(Some("email"), &[Some("username")]), FieldKind::Email);
        assert_eq!(field_kind(Some("tel"), &[]), FieldKind::Phone);
        assert_eq!(field_kind(Some("datetime-local"), &[]), FieldKind::Datetime);
        assert_eq!(field_kind(Some("text"), &[Some("zip")]), FieldKind::Zip);
    }

    #[test]
    fn patterns_scan_hints() {
        assert_eq!(field_kind(None, &[Some("user_email")]), FieldKind::Email);
        assert_eq!(field_kind(Some("text"), &[None, Some("fname")]), FieldKind::FirstName);
        assert_eq!(field_kind(None, &[Some("cc-number")]), FieldKind::CreditCard);
        assert_eq!(field_kind(None, &[Some("country-name")]), FieldKind::Country);
        assert_eq!(field_kind(None, &[Some("organization")]), FieldKind::Company);
        assert_eq!(field_kind(None, &[Some("Your name")]), FieldKind::FullName);
        assert_eq!(field_kind(None, &[Some("postal-code")]), FieldKind::Zip);
        assert_eq!(field_kind(None, &[Some("favourite colour")]), FieldKind::Text);
    }

    #[test]
    fn table_order_breaks_ties() {
        // matches both email and full name
        assert_eq!(field_kind(None, &[Some("name"), Some("Email")]), FieldKind::Email);
        assert_eq!(field_kind(None, &[Some("username")]), FieldKind::Username);
    }
}
