//! # autoprobe-ir
//!
//! The data model shared by discovery, generation and execution: locators,
//! flows and their steps, discovery reports and run results.
//!
//! Everything here serializes to camelCase JSON. A [`DiscoveryReport`] written by
//! the crawler is the interchange format read by everything downstream.

mod discovery;
mod flow;
mod locator;
mod manifest;
mod results;
mod values;

pub use discovery::{
    BoundingBox, DiscoveredElement, DiscoveredForm, DiscoveredPage, DiscoveryCoverage,
    DiscoveryError, DiscoveryErrorKind, DiscoveryReport, ElementTotals, ElementType, FieldKind,
    FormStep, Heading, RuleKind, ValidationRule,
};
pub use flow::{
    Action, Assertion, AssertionKind, Command, FlowStep, Priority, UserFlow, WaitCondition,
    WaitKind, DEFAULT_ASSERTION_TIMEOUT_MS,
};
pub use locator::{
    Candidate, CandidateKind, Locator, StrategyKind, CONFIDENCE_TABLE, DEGRADED_CONFIDENCE,
};
pub use manifest::{TestCase, TestManifest};
pub use results::{
    HealReason, HealingEvent, RunCoverage, StepResult, StepStatus, TestResult, TestRunSummary,
    TestStatus,
};
pub use values::ValueGenerator;

/// Errors raised when an IR value is structurally incomplete.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("step {step} ({action}): missing {field}")]
    MissingField {
        step: u32,
        action: &'static str,
        field: &'static str,
    },

    #[error("step {step}: invalid wait value '{value}'")]
    InvalidWait { step: u32, value: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;
