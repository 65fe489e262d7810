//! Selector strings and the queries they parse into.

use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([a-zA-Z]+)(?:\[name=["'](.*)["']\])?$"#).expect("static regex")
});

/// How visible text is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Trimmed text equals the value.
    Exact,
    /// Text contains the value.
    Contains,
    /// Case-insensitive substring.
    IgnoreCase,
    /// Case-insensitive substring after collapsing whitespace.
    Normalized,
}

impl TextMatch {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::IgnoreCase => "icase",
            Self::Normalized => "normalized",
        }
    }

    pub fn matches(&self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::Exact => haystack.trim() == needle.trim(),
            Self::Contains => haystack.contains(needle),
            Self::IgnoreCase => haystack.to_lowercase().contains(&needle.to_lowercase()),
            Self::Normalized => normalize(haystack).contains(&normalize(needle)),
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A parsed selector, resolved against the live page by a [`Driver`](crate::Driver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `div.card > button`
    Css(String),
    /// `xpath=//button` or `//button`
    XPath(String),
    /// `text="Send"` (exact) or `text=Send` (case-insensitive substring)
    Text { value: String, mode: TextMatch },
    /// `role=button[name="Send"]`
    Role { role: String, name: Option<String> },
    /// `label=Email` - associated `<label>` text or `aria-label`
    Label(String),
    /// `placeholder=Enter email`
    Placeholder(String),
}

impl Query {
    /// Parse a selector string in any supported dialect. Unprefixed strings are CSS.
    pub fn parse(selector: &str) -> Result<Self> {
        let s = selector.trim();
        if s.is_empty() {
            return Err(Error::InvalidSelector(selector.to_string()));
        }
        if let Some(v) = s.strip_prefix("role=") {
            let caps = ROLE_RE
                .captures(v.trim())
                .ok_or_else(|| Error::InvalidSelector(selector.to_string()))?;
            return Ok(Query::Role {
                role: caps[1].to_lowercase(),
                name: caps.get(2).map(|m| m.as_str().to_string()),
            });
        }
        if let Some(v) = s.strip_prefix("text*=") {
            return Ok(Query::Text {
                value: unquote(v).to_string(),
                mode: TextMatch::Contains,
            });
        }
        if let Some(v) = s.strip_prefix("text~=") {
            return Ok(Query::Text {
                value: unquote(v).to_string(),
                mode: TextMatch::Normalized,
            });
        }
        if let Some(v) = s.strip_prefix("text=") {
            let mode = if is_quoted(v) {
                TextMatch::Exact
            } else {
                TextMatch::IgnoreCase
            };
            return Ok(Query::Text {
                value: unquote(v).to_string(),
                mode,
            });
        }
        if let Some(v) = s.strip_prefix("label=") {
            return Ok(Query::Label(unquote(v).to_string()));
        }
        if let Some(v) = s.strip_prefix("placeholder=") {
            return Ok(Query::Placeholder(unquote(v).to_string()));
        }
        if let Some(v) = s.strip_prefix("xpath=") {
            return Ok(Query::XPath(v.to_string()));
        }
        if s.starts_with("//") || s.starts_with("(//") {
            return Ok(Query::XPath(s.to_string()));
        }
        Ok(Query::Css(s.to_string()))
    }

    /// Short dialect name, used for logging and the JS resolver.
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Css(_) => "css",
            Query::XPath(_) => "xpath",
            Query::Text { .. } => "text",
            Query::Role { .. } => "role",
            Query::Label(_) => "label",
            Query::Placeholder(_) => "placeholder",
        }
    }

    /// JSON argument for the in-page resolver.
    pub(crate) fn to_js_arg(&self) -> serde_json::Value {
        match self {
            Query::Css(v) | Query::XPath(v) | Query::Label(v) | Query::Placeholder(v) => {
                serde_json::json!({ "type": self.kind(), "value": v })
            }
            Query::Text { value, mode } => {
                serde_json::json!({ "type": "text", "value": value, "mode": mode.name() })
            }
            Query::Role { role, name } => {
                serde_json::json!({ "type": "role", "value": role, "name": name })
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Css(v) => f.write_str(v),
            Query::XPath(v) => write!(f, "xpath={}", v),
            Query::Text { value, mode } => match mode {
                TextMatch::Exact => write!(f, "text=\"{}\"", value),
                TextMatch::Contains => write!(f, "text*=\"{}\"", value),
                TextMatch::IgnoreCase => write!(f, "text={}", value),
                TextMatch::Normalized => write!(f, "text~={}", value),
            },
            Query::Role { role, name: Some(n) } => write!(f, "role={}[name=\"{}\"]", role, n),
            Query::Role { role, name: None } => write!(f, "role={}", role),
            Query::Label(v) => write!(f, "label={}", v),
            Query::Placeholder(v) => write!(f, "placeholder={}", v),
        }
    }
}

fn is_quoted(s: &str) -> bool {
    let s = s.trim();
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

pub(crate) fn unquote(s: &str) -> &str {
    let s = s.trim();
    if is_quoted(s) {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_role_with_name() {
        assert_eq!(
            Query::parse("role=button[name=\"Send\"]").unwrap(),
            Query::Role {
                role: "button".into(),
                name: Some("Send".into())
            }
        );
        assert_eq!(
            Query::parse("role=dialog").unwrap(),
            Query::Role {
                role: "dialog".into(),
                name: None
            }
        );
        assert!(Query::parse("role=button[").is_err());
    }

    #[test]
    fn parse_text_modes() {
        assert_eq!(
            Query::parse("text=\"Sign in\"").unwrap(),
            Query::Text {
                value: "Sign in".into(),
                mode: TextMatch::Exact
            }
        );
        assert_eq!(
            Query::parse("text=sign in").unwrap(),
            Query::Text {
                value: "sign in".into(),
                mode: TextMatch::IgnoreCase
            }
        );
        assert_eq!(
            Query::parse("text~=Sign   in").unwrap(),
            Query::Text {
                value: "Sign   in".into(),
                mode: TextMatch::Normalized
            }
        );
    }

    #[test]
    fn parse_other_dialects() {
        assert_eq!(
            Query::parse("label=Email").unwrap(),
            Query::Label("Email".into())
        );
        assert_eq!(
            Query::parse("placeholder='Search'").unwrap(),
            Query::Placeholder("Search".into())
        );
        assert_eq!(
            Query::parse("//form//button").unwrap(),
            Query::XPath("//form//button".into())
        );
        assert_eq!(
            Query::parse("xpath=(//a)[2]").unwrap(),
            Query::XPath("(//a)[2]".into())
        );
        assert_eq!(
            Query::parse("[data-testid=\"send\"]").unwrap(),
            Query::Css("[data-testid=\"send\"]".into())
        );
        assert!(Query::parse("   ").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let queries = vec![
            Query::Role {
                role: "link".into(),
                name: Some("Home".into()),
            },
            Query::Text {
                value: "Send".into(),
                mode: TextMatch::Exact,
            },
            Query::Text {
                value: "Send".into(),
                mode: TextMatch::Contains,
            },
            Query::Label("Email".into()),
            Query::XPath("//button".into()),
            Query::Css("#send".into()),
        ];
        for q in queries {
            assert_eq!(Query::parse(&q.to_string()).unwrap(), q);
        }
    }

    #[test]
    fn text_match_semantics() {
        assert!(TextMatch::Exact.matches("  Send ", "Send"));
        assert!(!TextMatch::Exact.matches("Send now", "Send"));
        assert!(TextMatch::Contains.matches("Send now", "Send"));
        assert!(!TextMatch::Contains.matches("send now", "Send"));
        assert!(TextMatch::IgnoreCase.matches("send now", "Send"));
        assert!(TextMatch::Normalized.matches("Send\n   now", "send now"));
    }
}
