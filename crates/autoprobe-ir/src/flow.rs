use crate::{Error, Locator, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeout applied to an assertion that does not carry its own.
pub const DEFAULT_ASSERTION_TIMEOUT_MS: u64 = 5000;

/// Action tag of a flow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Navigate,
    Click,
    Fill,
    Select,
    Check,
    Uncheck,
    Hover,
    Wait,
    Assert,
    Screenshot,
    Press,
}

impl Action {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
            Self::Hover => "hover",
            Self::Wait => "wait",
            Self::Assert => "assert",
            Self::Screenshot => "screenshot",
            Self::Press => "press",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of condition a step waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitKind {
    /// Fixed delay; `value` is milliseconds.
    Timeout,
    /// Network quiescence.
    NetworkIdle,
    /// Element visible; `value` is a selector.
    Selector,
}

/// Wait performed by a `wait` step, or after any other step's action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitCondition {
    #[serde(rename = "type")]
    pub kind: WaitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl WaitCondition {
    pub fn timeout_ms(ms: u64) -> Self {
        Self {
            kind: WaitKind::Timeout,
            value: Some(ms.to_string()),
            timeout: None,
        }
    }

    pub fn network_idle() -> Self {
        Self {
            kind: WaitKind::NetworkIdle,
            value: None,
            timeout: None,
        }
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            kind: WaitKind::Selector,
            value: Some(selector.into()),
            timeout: None,
        }
    }
}

/// What an assertion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionKind {
    Visible,
    Hidden,
    /// Target's text contains `expected`.
    Text,
    /// Current URL contains `expected`.
    Url,
    /// Page title contains `expected`.
    Title,
    Enabled,
    Disabled,
}

impl AssertionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Text => "text",
            Self::Url => "url",
            Self::Title => "title",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Milliseconds; [`DEFAULT_ASSERTION_TIMEOUT_MS`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Assertion {
    pub fn url_contains(expected: impl Into<String>) -> Self {
        Self {
            kind: AssertionKind::Url,
            target: None,
            expected: Some(expected.into()),
            timeout: None,
        }
    }

    pub fn visible(target: Locator) -> Self {
        Self {
            kind: AssertionKind::Visible,
            target: Some(target),
            expected: None,
            timeout: None,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_ASSERTION_TIMEOUT_MS)
    }
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    /// Advisory; execution order is the order of the step list.
    pub step_number: u32,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Locator>,
    /// Literal value or `{{fieldKind}}` template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<WaitCondition>,
}

impl FlowStep {
    pub fn new(step_number: u32, action: Action, description: impl Into<String>) -> Self {
        Self {
            step_number,
            action,
            target: None,
            value: None,
            description: description.into(),
            assertions: Vec::new(),
            wait_for: None,
        }
    }

    pub fn with_target(mut self, target: Locator) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_wait(mut self, wait: WaitCondition) -> Self {
        self.wait_for = Some(wait);
        self
    }

    /// Typed view of this step; fails when a field its action needs is absent.
    pub fn command(&self) -> Result<Command<'_>> {
        let target = move || self.require_target();
        let value = move || self.require_value();

        Ok(match self.action {
            Action::Navigate => Command::Navigate { url: value()? },
            Action::Click => Command::Click { target: target()? },
            Action::Fill => Command::Fill {
                target: target()?,
                value: value()?,
            },
            Action::Select => Command::Select {
                target: target()?,
                value: value()?,
            },
            Action::Check => Command::Check { target: target()? },
            Action::Uncheck => Command::Uncheck { target: target()? },
            Action::Hover => Command::Hover { target: target()? },
            Action::Wait => Command::Wait {
                condition: self.wait_condition()?,
            },
            Action::Assert => Command::Assert {
                target: self.target.as_ref(),
            },
            Action::Screenshot => Command::Screenshot {
                name: self.value.as_deref(),
            },
            Action::Press => Command::Press { key: value()? },
        })
    }

    fn require_target(&self) -> Result<&Locator> {
        self.target.as_ref().ok_or(Error::MissingField {
            step: self.step_number,
            action: self.action.name(),
            field: "target",
        })
    }

    fn require_value(&self) -> Result<&str> {
        self.value.as_deref().ok_or(Error::MissingField {
            step: self.step_number,
            action: self.action.name(),
            field: "value",
        })
    }

    /// A `wait` step uses its `waitFor`, else treats `value` as milliseconds.
    fn wait_condition(&self) -> Result<WaitCondition> {
        if let Some(ref wait) = self.wait_for {
            return Ok(wait.clone());
        }
        let raw = self.require_value()?;
        let ms = raw.trim().parse::<u64>().map_err(|_| Error::InvalidWait {
            step: self.step_number,
            value: raw.to_string(),
        })?;
        Ok(WaitCondition::timeout_ms(ms))
    }
}

/// A step's action together with the fields that action needs.
///
/// Every backend that applies steps (direct execution, source emission) matches
/// on this one type, so they cannot drift apart in which fields they consult.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    Navigate { url: &'a str },
    Click { target: &'a Locator },
    Fill { target: &'a Locator, value: &'a str },
    Select { target: &'a Locator, value: &'a str },
    Check { target: &'a Locator },
    Uncheck { target: &'a Locator },
    Hover { target: &'a Locator },
    Wait { condition: WaitCondition },
    /// Only the step's assertions run; `target` is the implicit visibility subject.
    Assert { target: Option<&'a Locator> },
    Screenshot { name: Option<&'a str> },
    Press { key: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<FlowStep>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UserFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            preconditions: Vec::new(),
            expected_outcome: String::new(),
            priority: Priority::default(),
            tags: Vec::new(),
        }
    }

    /// Append a step numbered after the current last step.
    pub fn push(&mut self, action: Action, description: impl Into<String>) -> &mut FlowStep {
        let number = self.steps.last().map(|s| s.step_number + 1).unwrap_or(1);
        self.steps.push(FlowStep::new(number, action, description));
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    /// Whether a precondition asks for an authenticated session.
    pub fn requires_auth(&self) -> bool {
        self.preconditions
            .iter()
            .any(|p| p.to_lowercase().contains("authenticated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_requires_target_for_click() {
        let step = FlowStep::new(3, Action::Click, "click it");
        let err = step.command().unwrap_err();
        assert_eq!(err.to_string(), "step 3 (click): missing target");
    }

    #[test]
    fn command_fill_borrows_fields() {
        let step = FlowStep::new(1, Action::Fill, "fill email")
            .with_target(Locator::css("#email"))
            .with_value("{{email}}");
        match step.command().unwrap() {
            Command::Fill { target, value } => {
                assert_eq!(target.primary, "#email");
                assert_eq!(value, "{{email}}");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn wait_step_parses_milliseconds() {
        let step = FlowStep::new(1, Action::Wait, "pause").with_value("250");
        assert_eq!(
            step.command().unwrap(),
            Command::Wait {
                condition: WaitCondition::timeout_ms(250)
            }
        );

        let bad = FlowStep::new(2, Action::Wait, "pause").with_value("soon");
        assert!(matches!(bad.command(), Err(Error::InvalidWait { .. })));
    }

    #[test]
    fn wait_step_prefers_wait_for() {
        let step = FlowStep::new(1, Action::Wait, "settle")
            .with_value("100")
            .with_wait(WaitCondition::network_idle());
        assert_eq!(
            step.command().unwrap(),
            Command::Wait {
                condition: WaitCondition::network_idle()
            }
        );
    }

    #[test]
    fn push_numbers_steps() {
        let mut flow = UserFlow::new("Login");
        flow.push(Action::Navigate, "open").value = Some("/login".into());
        flow.push(Action::Click, "submit");
        let numbers: Vec<u32> = flow.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn step_json_shape() {
        let json = r#"{
            "stepNumber": 2,
            "action": "assert",
            "description": "on dashboard",
            "assertions": [{"type": "url", "expected": "/dashboard"}],
            "waitFor": {"type": "networkIdle"}
        }"#;
        let step: FlowStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.action, Action::Assert);
        assert_eq!(step.assertions[0].kind, AssertionKind::Url);
        assert_eq!(step.assertions[0].timeout_ms(), DEFAULT_ASSERTION_TIMEOUT_MS);
        assert_eq!(step.wait_for.unwrap().kind, WaitKind::NetworkIdle);
    }

    #[test]
    fn requires_auth_matches_precondition_text() {
        let mut flow = UserFlow::new("Profile");
        assert!(!flow.requires_auth());
        flow.preconditions.push("User must be authenticated".into());
        assert!(flow.requires_auth());
    }
}
