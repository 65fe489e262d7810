use crate::{Error, Result};
use autoprobe_ir::{Assertion, AssertionKind, Locator};
use autoprobe_locator::{Driver, Query, Resolver, POLL_INTERVAL_MS};
use std::time::{Duration, Instant};
use tracing::debug;

fn target(assertion: &Assertion) -> Result<&Locator> {
    assertion.target.as_ref().ok_or_else(|| {
        Error::AssertionFailed(format!("{} assertion needs a target", assertion.kind.name()))
    })
}

fn expected(assertion: &Assertion) -> Result<&str> {
    assertion.expected.as_deref().ok_or_else(|| {
        Error::AssertionFailed(format!(
            "{} assertion needs an expected value",
            assertion.kind.name()
        ))
    })
}

/// Whether any selector of `locator` matches a visible element right now.
///
/// Skips healing: an element that vanished must not be found by a heuristic.
async fn shown(driver: &dyn Driver, locator: &Locator) -> Result<bool> {
    for selector in locator.selectors() {
        let Ok(query) = Query::parse(selector) else {
            continue;
        };
        if !driver.query(&query, 1).await?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check `assertion`, polling until it holds or its timeout passes.
pub(crate) async fn check(resolver: &Resolver<'_>, assertion: &Assertion) -> Result<()> {
    let timeout_ms = assertion.timeout_ms();
    let driver = resolver.driver();
    debug!("assert {} (timeout {}ms)", assertion.kind.name(), timeout_ms);

    match assertion.kind {
        // The resolver already waits for visibility.
        AssertionKind::Visible => {
            let locator = target(assertion)?;
            resolver
                .resolve(locator, timeout_ms)
                .await
                .map(|_| ())
                .map_err(|e| Error::AssertionFailed(format!("expected {} to be visible: {}", locator, e)))
        }
        AssertionKind::Enabled | AssertionKind::Disabled => {
            let locator = target(assertion)?;
            let want = assertion.kind == AssertionKind::Enabled;
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            loop {
                let left = deadline.saturating_duration_since(Instant::now()).as_millis() as u64;
                if resolver.is_enabled(locator, left).await? == want {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(Error::AssertionFailed(format!(
                        "expected {} to be {}",
                        locator,
                        assertion.kind.name()
                    )));
                }
                driver.wait(POLL_INTERVAL_MS).await;
            }
        }
        AssertionKind::Hidden => {
            let locator = target(assertion)?;
            let (held, _) = poll(driver, timeout_ms, || async move {
                Ok::<_, Error>((!shown(driver, locator).await?, String::new()))
            })
            .await?;
            held.then_some(()).ok_or_else(|| {
                Error::AssertionFailed(format!("expected {} to be hidden", locator))
            })
        }
        AssertionKind::Text => {
            let want = expected(assertion)?;
            let body = Locator::css("body").with_description("page body");
            let locator = assertion.target.as_ref().unwrap_or(&body);
            let (held, last) = poll(driver, timeout_ms, || async move {
                let el = resolver.resolve(locator, 0).await?;
                let text = driver.text(&el).await?;
                Ok::<_, Error>((text.contains(want), text))
            })
            .await?;
            held.then_some(()).ok_or_else(|| {
                Error::AssertionFailed(format!(
                    "expected {} to contain '{}', got '{}'",
                    locator,
                    want,
                    excerpt(&last)
                ))
            })
        }
        AssertionKind::Url | AssertionKind::Title => {
            let want = expected(assertion)?;
            let is_url = assertion.kind == AssertionKind::Url;
            let (held, last) = poll(driver, timeout_ms, || async move {
                let seen = if is_url {
                    driver.url().await?
                } else {
                    driver.title().await?
                };
                Ok::<_, Error>((seen.contains(want), seen))
            })
            .await?;
            held.then_some(()).ok_or_else(|| {
                Error::AssertionFailed(format!(
                    "expected {} to contain '{}', got '{}'",
                    assertion.kind.name(),
                    want,
                    last
                ))
            })
        }
    }
}

/// Run `probe` until it reports success or `timeout_ms` passes. Always probes once.
///
/// Returns the outcome and the last value observed.
async fn poll<F, Fut>(driver: &dyn Driver, timeout_ms: u64, mut probe: F) -> Result<(bool, String)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(bool, String)>>,
{
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let mut last = String::new();
    loop {
        match probe().await {
            Ok((true, seen)) => return Ok((true, seen)),
            Ok((false, seen)) => last = seen,
            // element not there yet
            Err(Error::Locator(autoprobe_locator::Error::NotFound { .. })) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Ok((false, last));
        }
        driver.wait(POLL_INTERVAL_MS).await;
    }
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 80;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        format!("{}...", trimmed.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprobe_ir::StrategyKind;
    use autoprobe_locator::mock::{MockDriver, MockElement, MockPage};
    use autoprobe_locator::ResolverConfig;

    const URL: &str = "http://app.test/dashboard";

    fn driver() -> MockDriver {
        MockDriver::new().with_page(
            MockPage::new(URL, "Dashboard | App")
                .with(MockElement::new("h1").text("Welcome back, Alex"))
                .with(MockElement::new("button").attr("id", "save").disabled())
                .with(MockElement::new("div").attr("id", "spinner").hidden()),
        )
    }

    fn assertion(kind: AssertionKind, target: Option<&str>, expected: Option<&str>) -> Assertion {
        Assertion {
            kind,
            target: target.map(|s| Locator::new(s, StrategyKind::Css, 0.8)),
            expected: expected.map(String::from),
            timeout: Some(0),
        }
    }

    async fn run(d: &MockDriver, a: Assertion) -> Result<()> {
        d.goto(URL).await.unwrap();
        let resolver = Resolver::new(d, ResolverConfig::default());
        check(&resolver, &a).await
    }

    #[tokio::test]
    async fn url_and_title_use_substrings() {
        let d = driver();
        run(&d, assertion(AssertionKind::Url, None, Some("/dashboard"))).await.unwrap();
        run(&d, assertion(AssertionKind::Title, None, Some("Dashboard"))).await.unwrap();
        let err = run(&d, assertion(AssertionKind::Url, None, Some("/settings")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn text_matches_substring() {
        let d = driver();
        run(&d, assertion(AssertionKind::Text, Some("h1"), Some("Welcome back"))).await.unwrap();
        assert!(run(&d, assertion(AssertionKind::Text, Some("h1"), Some("Goodbye")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn visibility_and_state() {
        let d = driver();
        run(&d, assertion(AssertionKind::Visible, Some("h1"), None)).await.unwrap();
        run(&d, assertion(AssertionKind::Hidden, Some("#spinner"), None)).await.unwrap();
        run(&d, assertion(AssertionKind::Disabled, Some("#save"), None)).await.unwrap();
        assert!(run(&d, assertion(AssertionKind::Enabled, Some("#save"), None)).await.is_err());
        assert!(run(&d, assertion(AssertionKind::Hidden, Some("h1"), None)).await.is_err());
    }

    #[tokio::test]
    async fn missing_fields_fail() {
        let d = driver();
        assert!(run(&d, assertion(AssertionKind::Visible, None, None)).await.is_err());
        assert!(run(&d, assertion(AssertionKind::Url, None, None)).await.is_err());
    }

    #[test]
    fn long_text_is_shortened() {
        assert_eq!(excerpt("  short "), "short");
        assert!(excerpt(&"x".repeat(200)).ends_with("..."));
    }
}
