use crate::Credentials;
use autoprobe_ir::{Locator, StrategyKind};
use autoprobe_locator::{Driver, Resolver, ResolverConfig, Result};
use tracing::{debug, info};
use url::Url;

/// Budget for finding each login control.
const FIELD_TIMEOUT_MS: u64 = 5000;

fn email_locator() -> Locator {
    Locator::css("input[type=\"email\"]")
        .with_fallbacks(vec![
            "input[name=\"email\"]".into(),
            "input[autocomplete=\"username\"]".into(),
            "input[name=\"username\"]".into(),
            "#email".into(),
        ])
        .with_description("Email")
}

fn password_locator() -> Locator {
    Locator::css("input[type=\"password\"]")
        .with_fallbacks(vec!["input[name=\"password\"]".into(), "#password".into()])
        .with_description("Password")
}

fn submit_locator() -> Locator {
    Locator::css("button[type=\"submit\"]")
        .with_fallbacks(vec![
            "input[type=\"submit\"]".into(),
            "role=button[name=\"Sign in\"]".into(),
            "role=button[name=\"Log in\"]".into(),
        ])
        .with_description("Sign in")
}

/// Sign in through the login page.
///
/// Returns `Ok(false)` when the form was submitted but the password field is
/// still showing, i.e. the credentials were rejected.
pub(crate) async fn login(
    driver: &dyn Driver,
    login_url: &Url,
    credentials: &Credentials,
    navigation_timeout_ms: u64,
    settle_ms: u64,
) -> Result<bool> {
    info!("Signing in at {}", login_url);
    driver.goto(login_url.as_str()).await?;
    if let Err(e) = driver.wait_for_network_idle(500, navigation_timeout_ms).await {
        debug!("login page never went idle: {}", e);
    }

    let resolver = Resolver::new(
        driver,
        ResolverConfig {
            self_healing: true,
            default_timeout_ms: FIELD_TIMEOUT_MS,
        },
    );
    resolver.fill(&email_locator(), &credentials.email).await?;
    resolver
        .fill(&password_locator(), &credentials.password)
        .await?;
    resolver.click(&submit_locator()).await?;

    if let Err(e) = driver.wait_for_network_idle(500, navigation_timeout_ms).await {
        debug!("post-login navigation never went idle: {}", e);
    }
    driver.wait(settle_ms).await;

    let still_on_form = Locator::new("input[type=\"password\"]", StrategyKind::Css, 0.8);
    let rejected = resolver.is_visible(&still_on_form, 0).await;
    Ok(!rejected)
}
