use crate::{Locator, UserFlow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Classified type of an interactive node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Button,
    Link,
    Input,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Submit,
    Form,
    Modal,
    Other,
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Link => "link",
            Self::Input => "input",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Submit => "submit",
            Self::Form => "form",
            Self::Modal => "modal",
            Self::Other => "other",
        }
    }

    /// Classify from tag name and `type` attribute.
    pub fn classify(tag: &str, input_type: Option<&str>) -> Self {
        match (tag, input_type.map(|t| t.to_ascii_lowercase())) {
            ("a", _) => Self::Link,
            ("button", Some(t)) if t == "submit" => Self::Submit,
            ("button", _) => Self::Button,
            ("textarea", _) => Self::Textarea,
            ("select", _) => Self::Select,
            ("form", _) => Self::Form,
            ("dialog", _) => Self::Modal,
            ("input", Some(t)) => match t.as_str() {
                "checkbox" => Self::Checkbox,
                "radio" => Self::Radio,
                "submit" => Self::Submit,
                "button" | "reset" | "image" => Self::Button,
                _ => Self::Input,
            },
            ("input", None) => Self::Input,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Email,
    Password,
    Phone,
    Url,
    Number,
    Date,
    Time,
    Datetime,
    Search,
    Zip,
    FirstName,
    LastName,
    FullName,
    Username,
    Company,
    Address,
    City,
    State,
    Country,
    CreditCard,
    Cvv,
    CardExpiry,
    Age,
    Message,
    Text,
}

impl FieldKind {
    pub const ALL: &'static [FieldKind] = &[
        Self::Email,
        Self::Password,
        Self::Phone,
        Self::Url,
        Self::Number,
        Self::Date,
        Self::Time,
        Self::Datetime,
        Self::Search,
        Self::Zip,
        Self::FirstName,
        Self::LastName,
        Self::FullName,
        Self::Username,
        Self::Company,
        Self::Address,
        Self::City,
        Self::State,
        Self::Country,
        Self::CreditCard,
        Self::Cvv,
        Self::CardExpiry,
        Self::Age,
        Self::Message,
        Self::Text,
    ];

    /// Name as it appears in JSON and in `{{kind}}` templates.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Password => "password",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Number => "number",
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
            Self::Search => "search",
            Self::Zip => "zip",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::FullName => "fullName",
            Self::Username => "username",
            Self::Company => "company",
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::Country => "country",
            Self::CreditCard => "creditCard",
            Self::Cvv => "cvv",
            Self::CardExpiry => "cardExpiry",
            Self::Age => "age",
            Self::Message => "message",
            Self::Text => "text",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    Pattern,
    Min,
    Max,
    MinLength,
    MaxLength,
}

/// A validation constraint scraped from a field's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Snapshot of one interactive node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredElement {
    /// Synthetic id, stable for the same DOM position within one crawl.
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Absolute target for links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub is_visible: bool,
    pub is_enabled: bool,
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<FieldKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<ValidationRule>,
    pub timestamp: DateTime<Utc>,
}

/// One page of a multi-step form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStep {
    pub step_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ids of the fields shown on this step.
    #[serde(default)]
    pub field_ids: Vec<String>,
}

/// A form and everything needed to fill and submit it.
///
/// Buttons are full copies, not references, so a report stays self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredForm {
    #[serde(flatten)]
    pub element: DiscoveredElement,
    /// Fields in page order.
    pub fields: Vec<DiscoveredElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_button: Option<DiscoveredElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_button: Option<DiscoveredElement>,
    #[serde(default)]
    pub is_multi_step: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<FormStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// One crawled URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    pub url: String,
    pub path: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub requires_auth: bool,
    #[serde(default)]
    pub forms: Vec<DiscoveredForm>,
    #[serde(default)]
    pub buttons: Vec<DiscoveredElement>,
    #[serde(default)]
    pub links: Vec<DiscoveredElement>,
    #[serde(default)]
    pub modals: Vec<DiscoveredElement>,
    #[serde(default)]
    pub navigation: Vec<DiscoveredElement>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    pub load_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryErrorKind {
    Navigation,
    Timeout,
    Auth,
    Element,
}

/// A problem met while crawling; collected, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryError {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: DiscoveryErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryError {
    pub fn new(url: impl Into<String>, kind: DiscoveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTotals {
    pub forms: usize,
    pub inputs: usize,
    pub buttons: usize,
    pub links: usize,
    pub modals: usize,
}

impl ElementTotals {
    /// Plain sums over every page.
    pub fn from_pages(pages: &[DiscoveredPage]) -> Self {
        pages.iter().fold(Self::default(), |acc, p| Self {
            forms: acc.forms + p.forms.len(),
            inputs: acc.inputs + p.forms.iter().map(|f| f.fields.len()).sum::<usize>(),
            buttons: acc.buttons + p.buttons.len(),
            links: acc.links + p.links.len(),
            modals: acc.modals + p.modals.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryCoverage {
    pub pages_visited: usize,
    pub forms_found: usize,
    pub flows_suggested: usize,
    pub authenticated: bool,
}

/// Top-level crawl artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub pages: Vec<DiscoveredPage>,
    pub total_elements: ElementTotals,
    pub coverage: DiscoveryCoverage,
    #[serde(default)]
    pub suggested_flows: Vec<UserFlow>,
    #[serde(default)]
    pub errors: Vec<DiscoveryError>,
}

impl DiscoveryReport {
    /// Assemble a report; totals and coverage are derived from `pages`.
    pub fn new(
        base_url: impl Into<String>,
        started_at: DateTime<Utc>,
        pages: Vec<DiscoveredPage>,
        suggested_flows: Vec<UserFlow>,
        errors: Vec<DiscoveryError>,
        authenticated: bool,
    ) -> Self {
        let finished_at = Utc::now();
        let total_elements = ElementTotals::from_pages(&pages);
        let coverage = DiscoveryCoverage {
            pages_visited: pages.len(),
            forms_found: total_elements.forms,
            flows_suggested: suggested_flows.len(),
            authenticated,
        };
        Self {
            base_url: base_url.into(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            pages,
            total_elements,
            coverage,
            suggested_flows,
            errors,
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
