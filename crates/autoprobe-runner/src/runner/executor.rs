use crate::assertions;
use crate::{Error, Result};
use autoprobe_ir::{
    Action, Assertion, Command, FlowStep, Locator, StepResult, StepStatus, UserFlow, ValueGenerator,
    WaitCondition, WaitKind,
};
use autoprobe_locator::Resolver;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Quiet period that counts as network idle.
const IDLE_MS: u64 = 500;

/// Budget for network idle when a condition sets none.
const IDLE_TIMEOUT_MS: u64 = 10_000;

/// What one attempt at a flow produced.
#[derive(Debug, Default)]
pub(crate) struct Attempt {
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    /// URLs landed on by `navigate` steps.
    pub pages: Vec<String>,
    /// Steps that acted on an element and succeeded.
    pub elements: usize,
}

/// Applies flow steps to one browser session.
pub(crate) struct Executor<'a> {
    pub resolver: Resolver<'a>,
    pub base: &'a Url,
    pub values: &'a ValueGenerator,
    pub screenshot_dir: &'a Path,
    pub screenshot_on_failure: bool,
    /// Prefix of screenshot file names.
    pub test_id: &'a str,
}

impl Executor<'_> {
    /// Run every step in order, stopping at the first failure.
    ///
    /// Steps after a failure are recorded as skipped.
    pub async fn run(&self, flow: &UserFlow) -> Attempt {
        let mut attempt = Attempt::default();

        for (i, step) in flow.steps.iter().enumerate() {
            info!("Step {}: {} {}", step.step_number, step.action, step.description);
            let start = Instant::now();
            let healed_before = self.resolver.event_count();

            let outcome = self.step(step, &mut attempt.pages).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let healed_locator = if self.resolver.event_count() > healed_before {
                self.resolver.events().last().map(|e| e.healed_with.clone())
            } else {
                None
            };

            match outcome {
                Ok(()) => {
                    if step.target.is_some() && interacts(step.action) {
                        attempt.elements += 1;
                    }
                    attempt.steps.push(StepResult {
                        step_number: step.step_number,
                        action: step.action,
                        description: step.description.clone(),
                        status: StepStatus::Passed,
                        duration_ms,
                        error: None,
                        screenshot: None,
                        healed_locator,
                    });
                }
                Err(e) => {
                    warn!("Step {} failed: {}", step.step_number, e);
                    let screenshot = if self.screenshot_on_failure {
                        self.capture(&format!("step-{}-failure", step.step_number))
                            .await
                    } else {
                        None
                    };
                    attempt.steps.push(StepResult {
                        step_number: step.step_number,
                        action: step.action,
                        description: step.description.clone(),
                        status: StepStatus::Failed,
                        duration_ms,
                        error: Some(e.to_string()),
                        screenshot,
                        healed_locator,
                    });
                    attempt.error = Some(format!("step {}: {}", step.step_number, e));
                    for rest in &flow.steps[i + 1..] {
                        attempt.steps.push(StepResult {
                            step_number: rest.step_number,
                            action: rest.action,
                            description: rest.description.clone(),
                            status: StepStatus::Skipped,
                            duration_ms: 0,
                            error: None,
                            screenshot: None,
                            healed_locator: None,
                        });
                    }
                    break;
                }
            }
        }
        attempt
    }

    async fn step(&self, step: &FlowStep, pages: &mut Vec<String>) -> Result<()> {
        let resolver = &self.resolver;
        let driver = resolver.driver();

        match step.command()? {
            Command::Navigate { url } => {
                let target = self.base.join(url).map_err(|e| {
                    Error::Manifest(format!("cannot resolve '{}' against {}: {}", url, self.base, e))
                })?;
                driver.goto(target.as_str()).await?;
                self.idle(IDLE_TIMEOUT_MS).await;
                pages.push(driver.url().await.unwrap_or_else(|_| target.to_string()));
            }
            Command::Click { target } => resolver.click(target).await?,
            Command::Fill { target, value } => {
                resolver.fill(target, &self.values.resolve(value)).await?
            }
            Command::Select { target, value } => {
                resolver.select(target, &self.values.resolve(value)).await?
            }
            Command::Check { target } => resolver.check(target).await?,
            Command::Uncheck { target } => resolver.uncheck(target).await?,
            Command::Hover { target } => resolver.hover(target).await?,
            Command::Wait { condition } => self.wait(&condition).await?,
            Command::Assert { target } => {
                if step.assertions.is_empty() {
                    if let Some(target) = target {
                        assertions::check(resolver, &Assertion::visible(target.clone())).await?;
                    }
                }
            }
            Command::Screenshot { name } => {
                let name = name
                    .map(String::from)
                    .unwrap_or_else(|| format!("step-{}", step.step_number));
                let data = driver.screenshot().await?;
                let path = self.screenshot_path(&name);
                write_png(&path, &data)?;
                info!("Screenshot saved to {}", path.display());
            }
            Command::Press { key } => driver.press_key(key).await?,
        }

        if step.action != Action::Wait {
            if let Some(ref wait) = step.wait_for {
                self.wait(wait).await?;
            }
        }

        for assertion in &step.assertions {
            assertions::check(resolver, assertion).await?;
        }
        Ok(())
    }

    async fn wait(&self, condition: &WaitCondition) -> Result<()> {
        let driver = self.resolver.driver();
        match condition.kind {
            WaitKind::Timeout => {
                let ms = condition
                    .value
                    .as_deref()
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .or(condition.timeout)
                    .unwrap_or(0);
                debug!("wait {}ms", ms);
                driver.wait(ms).await;
            }
            WaitKind::NetworkIdle => self.idle(condition.timeout.unwrap_or(IDLE_TIMEOUT_MS)).await,
            WaitKind::Selector => {
                let selector = condition.value.as_deref().ok_or_else(|| {
                    Error::Manifest("selector wait without a selector".into())
                })?;
                let timeout = condition
                    .timeout
                    .unwrap_or(self.resolver.config().default_timeout_ms);
                self.resolver
                    .resolve(&Locator::css(selector), timeout)
                    .await?;
            }
        }
        Ok(())
    }

    /// Network idle is best effort; pages with long polling never settle.
    async fn idle(&self, timeout_ms: u64) {
        if let Err(e) = self
            .resolver
            .driver()
            .wait_for_network_idle(IDLE_MS, timeout_ms)
            .await
        {
            debug!("network never went idle: {}", e);
        }
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        let safe: String = name
            .trim_end_matches(".png")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.screenshot_dir
            .join(format!("{}-{}.png", self.test_id, safe))
    }

    async fn capture(&self, name: &str) -> Option<String> {
        let path = self.screenshot_path(name);
        let data = match self.resolver.driver().screenshot().await {
            Ok(data) => data,
            Err(e) => {
                debug!("failure screenshot unavailable: {}", e);
                return None;
            }
        };
        match write_png(&path, &data) {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("Failed to save screenshot: {}", e);
                None
            }
        }
    }
}

fn interacts(action: Action) -> bool {
    matches!(
        action,
        Action::Click
            | Action::Fill
            | Action::Select
            | Action::Check
            | Action::Uncheck
            | Action::Hover
    )
}

fn write_png(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
