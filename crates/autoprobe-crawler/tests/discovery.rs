//! Crawls against the scripted mock driver.

use autoprobe_crawler::{discover, write_report, CrawlOptions, Crawler, Credentials};
use autoprobe_ir::{Action, DiscoveryErrorKind};
use autoprobe_locator::mock::{MockDriver, MockElement, MockLauncher, MockPage};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const BASE: &str = "http://app.test/";
const LINKS: &str = "/*autoprobe:links*/";
const FORMS: &str = "/*autoprobe:forms*/";
const BUTTONS: &str = "/*autoprobe:buttons*/";

fn url(path: &str) -> String {
    format!("http://app.test{}", path)
}

fn links(hrefs: &[&str]) -> Value {
    Value::Array(
        hrefs
            .iter()
            .enumerate()
            .map(|(i, h)| {
                json!({
                    "tag": "a",
                    "path": format!("html > body > a:nth-of-type({})", i + 1),
                    "href": h,
                    "text": format!("link {}", i + 1)
                })
            })
            .collect(),
    )
}

fn options() -> CrawlOptions {
    let mut o = CrawlOptions::new(BASE);
    o.settle_ms = 0;
    o.navigation_timeout_ms = 2000;
    o
}

fn paths(report: &autoprobe_ir::DiscoveryReport) -> Vec<String> {
    report.pages.iter().map(|p| p.path.clone()).collect()
}

#[tokio::test]
async fn stops_at_page_budget() {
    let driver = MockDriver::new()
        .with_page(MockPage::new(BASE, "Home").with_script(LINKS, links(&["/a", "/b", "/c"])))
        .with_page(MockPage::new(&url("/a"), "A"))
        .with_page(MockPage::new(&url("/b"), "B"))
        .with_page(MockPage::new(&url("/c"), "C"));

    let mut o = options();
    o.max_pages = 2;
    let report = Crawler::new(&driver, o).unwrap().run().await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/a"]);
    assert_eq!(report.coverage.pages_visited, 2);
}

#[tokio::test]
async fn fragments_and_foreign_origins_are_not_revisited() {
    let driver = MockDriver::new()
        .with_page(MockPage::new(BASE, "Home").with_script(
            LINKS,
            links(&["/about#team", "/about", "#top", "https://elsewhere.test/", "mailto:a@b.c"]),
        ))
        .with_page(MockPage::new(&url("/about"), "About"));

    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();
    assert_eq!(paths(&report), vec!["/", "/about"]);

    let gotos = driver
        .actions()
        .into_iter()
        .filter(|a| a.starts_with("goto"))
        .count();
    assert_eq!(gotos, 2);
}

#[tokio::test]
async fn respects_depth_and_excludes() {
    let driver = MockDriver::new()
        .with_page(
            MockPage::new(BASE, "Home").with_script(LINKS, links(&["/admin/users", "/docs"])),
        )
        .with_page(MockPage::new(&url("/docs"), "Docs").with_script(LINKS, links(&["/docs/deep"])))
        .with_page(MockPage::new(&url("/docs/deep"), "Deep"));

    let mut o = options();
    o.exclude_routes = vec!["/admin/*".into()];
    o.max_depth = 1;
    let report = Crawler::new(&driver, o).unwrap().run().await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/docs"]);
}

#[tokio::test]
async fn email_form_yields_a_flow() {
    let form = json!([{
        "element": {"tag": "form", "path": "html > body > form", "id": "newsletter"},
        "fields": [{
            "tag": "input", "path": "html > body > form > input",
            "inputType": "email", "id": "email", "name": "email"
        }],
        "submit": {
            "tag": "button", "path": "html > body > form > button",
            "inputType": "submit", "text": "Subscribe"
        }
    }]);
    let driver = MockDriver::new().with_page(MockPage::new(BASE, "Home").with_script(FORMS, form));

    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();

    assert_eq!(report.total_elements.forms, 1);
    assert_eq!(report.total_elements.inputs, 1);
    assert_eq!(report.suggested_flows.len(), 1);
    let steps = &report.suggested_flows[0].steps;
    assert_eq!(steps[0].action, Action::Navigate);
    assert_eq!(steps[1].action, Action::Fill);
    assert_eq!(steps[1].value.as_deref(), Some("{{email}}"));
    assert_eq!(steps[2].action, Action::Click);
}

#[tokio::test]
async fn extraction_failure_keeps_the_page() {
    let driver = MockDriver::new().with_page(
        MockPage::new(BASE, "Home")
            .with_failing_script(BUTTONS, "ReferenceError: x is not defined")
            .with_script(LINKS, links(&["/next"])),
    );

    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();

    assert_eq!(report.pages.len(), 2);
    assert!(report.pages[0].buttons.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, DiscoveryErrorKind::Element);
    assert!(report.errors[0].message.contains("buttons"));
}

#[tokio::test]
async fn failed_navigation_is_recorded() {
    let driver = MockDriver::new()
        .with_page(MockPage::new(BASE, "Home").with_script(LINKS, links(&["/broken", "/ok"])))
        .with_page(MockPage::new(&url("/ok"), "Ok"))
        .failing_url(&url("/broken"));

    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/ok"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, DiscoveryErrorKind::Navigation);
    assert_eq!(report.errors[0].url, url("/broken"));
}

#[tokio::test]
async fn invalid_base_url_is_a_config_error() {
    let driver = MockDriver::new();
    assert!(Crawler::new(&driver, CrawlOptions::new("not a url")).is_err());
}

fn login_page() -> MockPage {
    MockPage::new(&url("/login"), "Sign in")
        .with(MockElement::new("input").attr("type", "email").attr("id", "email"))
        .with(MockElement::new("input").attr("type", "password").attr("id", "password"))
        .with(
            MockElement::new("button")
                .attr("type", "submit")
                .text("Sign in")
                .navigates_to(&url("/dashboard")),
        )
}

#[tokio::test]
async fn authenticated_pass_crawls_auth_routes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let shared = log.clone();
    let launcher = MockLauncher::new(move |_| {
        Ok(MockDriver::new()
            .with_log(shared.clone())
            .with_page(MockPage::new(BASE, "Home"))
            .with_page(login_page())
            .with_page(MockPage::new(&url("/dashboard"), "Dashboard")))
    });

    let mut o = options();
    o.auth_routes = vec!["/dashboard".into()];
    o.credentials = Some(Credentials {
        email: "qa@app.test".into(),
        password: "hunter2".into(),
    });
    let report = discover(&launcher, o).await.unwrap();

    assert!(report.coverage.authenticated);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let dashboard = report.pages.iter().find(|p| p.path == "/dashboard").unwrap();
    assert!(dashboard.requires_auth);
    assert!(!report.pages[0].requires_auth);

    let actions = log.lock().unwrap().clone();
    assert!(actions.contains(&"fill #email = qa@app.test".to_string()));
    assert!(actions.contains(&"fill #password = hunter2".to_string()));
    assert_eq!(actions.last().map(String::as_str), Some("close"));
    assert_eq!(launcher.launches(), 1);
}

fn assert_unique_urls(report: &autoprobe_ir::DiscoveryReport) {
    let unique: HashSet<&str> = report.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(unique.len(), report.pages.len(), "{:?}", paths(report));
}

#[tokio::test]
async fn auth_route_seen_publicly_is_not_crawled_twice() {
    let launcher = MockLauncher::new(|_| {
        Ok(MockDriver::new()
            .with_page(MockPage::new(BASE, "Home").with_script(LINKS, links(&["/dashboard"])))
            .with_page(login_page())
            .with_page(MockPage::new(&url("/dashboard"), "Dashboard")))
    });

    let mut o = options();
    o.auth_routes = vec!["/dashboard".into()];
    o.credentials = Some(Credentials {
        email: "qa@app.test".into(),
        password: "hunter2".into(),
    });
    let report = discover(&launcher, o).await.unwrap();

    assert!(report.coverage.authenticated);
    assert_eq!(paths(&report), vec!["/", "/dashboard"]);
    assert_unique_urls(&report);
}

#[tokio::test]
async fn redirect_target_is_reported_once() {
    let driver = MockDriver::new()
        .with_page(MockPage::new(BASE, "Home").with_script(LINKS, links(&["/old", "/new"])))
        .with_page(MockPage::new(&url("/old"), "").redirects_to(&url("/new")))
        .with_page(MockPage::new(&url("/new"), "New"));

    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/new"]);
    assert_unique_urls(&report);
    let gotos: Vec<String> = driver
        .actions()
        .into_iter()
        .filter(|a| a.starts_with("goto"))
        .collect();
    assert_eq!(gotos, vec![format!("goto {}", BASE), format!("goto {}", url("/old"))]);
}

#[tokio::test]
async fn rejected_credentials_are_an_auth_error() {
    let launcher = MockLauncher::new(|_| {
        Ok(MockDriver::new()
            .with_page(MockPage::new(BASE, "Home"))
            .with_page(
                MockPage::new(&url("/login"), "Sign in")
                    .with(MockElement::new("input").attr("type", "email"))
                    .with(MockElement::new("input").attr("type", "password"))
                    .with(MockElement::new("button").attr("type", "submit").text("Sign in")),
            ))
    });

    let mut o = options();
    o.auth_routes = vec!["/dashboard".into()];
    o.credentials = Some(Credentials {
        email: "qa@app.test".into(),
        password: "wrong".into(),
    });
    let report = discover(&launcher, o).await.unwrap();

    assert!(!report.coverage.authenticated);
    assert_eq!(paths(&report), vec!["/"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, DiscoveryErrorKind::Auth);
}

#[tokio::test]
async fn report_written_to_disk() {
    let driver = MockDriver::new().with_page(MockPage::new(BASE, "Home"));
    let report = Crawler::new(&driver, options()).unwrap().run().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = write_report(&report, dir.path().join("discovery")).unwrap();
    assert!(path.exists());
    assert!(dir.path().join("discovery/latest.json").exists());
}
