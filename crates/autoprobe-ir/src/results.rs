use crate::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Final status of a test.
///
/// `Flaky` means at least one attempt failed before a later one passed; it is
/// never folded into `Passed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Flaky,
}

impl TestStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Flaky => "flaky",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a locator resolved through something other than its primary selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealReason {
    Fallback,
    TextRelaxation,
    RoleName,
    Placeholder,
    Label,
    PartialClass,
    PartialData,
    SiblingScan,
}

impl HealReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::TextRelaxation => "text-relaxation",
            Self::RoleName => "role-name",
            Self::Placeholder => "placeholder",
            Self::Label => "label",
            Self::PartialClass => "partial-class",
            Self::PartialData => "partial-data",
            Self::SiblingScan => "sibling-scan",
        }
    }
}

impl fmt::Display for HealReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of a locator healed by a fallback or heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingEvent {
    /// The primary selector that failed.
    pub original: String,
    #[serde(default)]
    pub description: String,
    /// Selector (or synthesized description of one) that matched instead.
    pub healed_with: String,
    pub reason: HealReason,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_number: u32,
    pub action: Action,
    #[serde(default)]
    pub description: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Selector that matched when the step's locator needed healing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healed_locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u32,
    /// Step results of the final attempt.
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error of every failed attempt, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempt_errors: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestResult {
    pub fn first_error(&self) -> Option<&str> {
        self.attempt_errors
            .first()
            .map(|s| s.as_str())
            .or(self.error.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCoverage {
    pub pages_visited: usize,
    pub flows_executed: usize,
    pub steps_executed: usize,
    pub elements_interacted: usize,
    pub healed_locators: usize,
}

/// Run-level summary; counts are tallies over final test statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub flaky: usize,
    pub results: Vec<TestResult>,
    pub coverage: RunCoverage,
    #[serde(default)]
    pub healing_events: Vec<HealingEvent>,
}

impl TestRunSummary {
    pub fn new(
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        results: Vec<TestResult>,
        mut coverage: RunCoverage,
        healing_events: Vec<HealingEvent>,
    ) -> Self {
        let finished_at = Utc::now();
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        coverage.healed_locators = healing_events.len();
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            flaky: count(TestStatus::Flaky),
            results,
            coverage,
            healing_events,
        }
    }

    /// Whether no test ended failed. Flaky tests count as passing here.
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results
            .iter()
            .filter(|r| r.status == TestStatus::Failed)
    }
}
