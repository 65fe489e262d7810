mod executor;

use crate::schedule::{filter_by_tags, order};
use crate::{Error, Result, RunOptions};
use autoprobe_ir::{
    HealingEvent, RunCoverage, StepStatus, TestCase, TestResult, TestRunSummary, TestStatus,
};
use autoprobe_locator::{Launcher, Resolver};
use chrono::Utc;
use executor::{Attempt, Executor};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// Totals gathered across one run. Step and element counts cover final attempts only.
#[derive(Debug, Default)]
struct Tally {
    pages: BTreeSet<String>,
    flows: usize,
    steps: usize,
    elements: usize,
    healing: Vec<HealingEvent>,
}

/// Executes tests, one fresh browser session per attempt.
pub struct Runner<'a> {
    launcher: &'a dyn Launcher,
    options: RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(launcher: &'a dyn Launcher, options: RunOptions) -> Self {
        Self { launcher, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Filter by tag, order by dependency and run every test in sequence.
    ///
    /// Fails only when the run cannot proceed: a dependency cycle under the
    /// `fail` policy, a bad base URL or a browser that will not launch.
    pub async fn run(&self, tests: Vec<TestCase>) -> Result<TestRunSummary> {
        let started_at = Utc::now();
        let run_id = format!("run-{}", started_at.format("%Y%m%dT%H%M%S%3fZ"));
        let base = self.base_url()?;

        let selected = filter_by_tags(tests, &self.options.tags);
        let scheduled = order(selected, self.options.on_cycle)?;
        info!("Running {} tests ({})", scheduled.len(), run_id);

        let mut tally = Tally::default();
        let mut results = Vec::with_capacity(scheduled.len());
        for case in &scheduled {
            let result = self.run_case(case, &base, &mut tally).await?;
            info!(
                "{} {} ({}ms, {} retries)",
                result.status, result.name, result.duration_ms, result.retries
            );
            results.push(result);
        }

        let coverage = RunCoverage {
            pages_visited: tally.pages.len(),
            flows_executed: tally.flows,
            steps_executed: tally.steps,
            elements_interacted: tally.elements,
            healed_locators: 0,
        };
        Ok(TestRunSummary::new(
            run_id,
            started_at,
            results,
            coverage,
            tally.healing,
        ))
    }

    /// Run one test with retries, without scheduling.
    pub async fn run_test(&self, case: &TestCase) -> Result<TestResult> {
        let base = self.base_url()?;
        self.run_case(case, &base, &mut Tally::default()).await
    }

    fn base_url(&self) -> Result<Url> {
        Url::parse(&self.options.base_url).map_err(|e| {
            Error::Manifest(format!("invalid base url '{}': {}", self.options.base_url, e))
        })
    }

    async fn run_case(&self, case: &TestCase, base: &Url, tally: &mut Tally) -> Result<TestResult> {
        let start = Instant::now();
        let mut result = TestResult {
            id: case.id.clone(),
            name: case.name.clone(),
            status: TestStatus::Skipped,
            duration_ms: 0,
            retries: 0,
            steps: Vec::new(),
            error: None,
            attempt_errors: Vec::new(),
            tags: case.tags.clone(),
        };

        if case.flow.steps.is_empty() {
            info!("Skipping {}: no steps", case.id);
            return Ok(result);
        }

        tally.flows += 1;
        let mut elements = 0;
        let max_attempts = self.options.retries + 1;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                info!("Retry attempt {}/{} for {}", attempt, max_attempts, case.id);
                if self.options.retry_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.options.retry_delay_ms)).await;
                }
            }

            let outcome = self.attempt(case, base, tally).await?;
            result.retries = attempt - 1;
            result.steps = outcome.steps;
            elements = outcome.elements;

            match outcome.error {
                None => {
                    result.status = if attempt == 1 {
                        TestStatus::Passed
                    } else {
                        TestStatus::Flaky
                    };
                    result.error = None;
                    break;
                }
                Some(error) => {
                    warn!("Attempt {} of {} failed: {}", attempt, case.id, error);
                    result.attempt_errors.push(error.clone());
                    result.error = Some(error);
                    result.status = TestStatus::Failed;
                }
            }
        }

        tally.steps += result
            .steps
            .iter()
            .filter(|s| s.status != StepStatus::Skipped)
            .count();
        tally.elements += elements;
        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// One attempt in a fresh session. Launch failure aborts the run.
    async fn attempt(&self, case: &TestCase, base: &Url, tally: &mut Tally) -> Result<Attempt> {
        let driver = self.launcher.launch().await?;
        let executor = Executor {
            resolver: Resolver::new(driver.as_ref(), self.options.resolver.clone()),
            base,
            values: &self.options.values,
            screenshot_dir: &self.options.screenshot_dir,
            screenshot_on_failure: self.options.screenshot_on_failure,
            test_id: &case.id,
        };

        let outcome = executor.run(&case.flow).await;
        tally.healing.extend(executor.resolver.take_events());
        tally.pages.extend(outcome.pages.iter().cloned());
        drop(executor);

        if let Err(e) = driver.close().await {
            warn!("Failed to close browser: {}", e);
        }
        Ok(outcome)
    }
}
