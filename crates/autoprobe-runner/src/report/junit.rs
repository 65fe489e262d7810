use crate::{Error, Result};
use autoprobe_ir::{TestResult, TestRunSummary, TestStatus};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

fn xml_err(e: quick_xml::Error) -> Error {
    Error::Report(format!("junit: {}", e))
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// One `<testsuite>` per run; flaky tests pass with a note in `<system-out>`.
pub(super) fn render(summary: &TestRunSummary) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let tests = summary.total.to_string();
    let failures = summary.failed.to_string();
    let skipped = summary.skipped.to_string();
    let time = seconds(summary.duration_ms);

    let mut suites = BytesStart::new("testsuites");
    suites.push_attribute(("name", "autoprobe"));
    suites.push_attribute(("tests", tests.as_str()));
    suites.push_attribute(("failures", failures.as_str()));
    suites.push_attribute(("skipped", skipped.as_str()));
    suites.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(suites)).map_err(xml_err)?;

    let timestamp = summary.started_at.to_rfc3339();
    let mut suite = BytesStart::new("testsuite");
    suite.push_attribute(("name", summary.run_id.as_str()));
    suite.push_attribute(("tests", tests.as_str()));
    suite.push_attribute(("failures", failures.as_str()));
    suite.push_attribute(("errors", "0"));
    suite.push_attribute(("skipped", skipped.as_str()));
    suite.push_attribute(("time", time.as_str()));
    suite.push_attribute(("timestamp", timestamp.as_str()));
    writer.write_event(Event::Start(suite)).map_err(xml_err)?;

    for result in &summary.results {
        write_case(&mut writer, result)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("testsuite")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("testsuites")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::Report(format!("junit: {}", e)))
}

fn write_case<W: std::io::Write>(writer: &mut Writer<W>, result: &TestResult) -> Result<()> {
    let classname = result
        .tags
        .first()
        .map(|t| format!("autoprobe.{}", t))
        .unwrap_or_else(|| "autoprobe".to_string());
    let time = seconds(result.duration_ms);

    let mut case = BytesStart::new("testcase");
    case.push_attribute(("name", result.name.as_str()));
    case.push_attribute(("classname", classname.as_str()));
    case.push_attribute(("time", time.as_str()));
    writer.write_event(Event::Start(case)).map_err(xml_err)?;

    match result.status {
        TestStatus::Failed => {
            let message = result.error.as_deref().unwrap_or("failed");
            let mut failure = BytesStart::new("failure");
            failure.push_attribute(("message", message));
            failure.push_attribute(("type", "AssertionError"));
            writer.write_event(Event::Start(failure)).map_err(xml_err)?;
            let detail = if result.attempt_errors.is_empty() {
                message.to_string()
            } else {
                result
                    .attempt_errors
                    .iter()
                    .enumerate()
                    .map(|(i, e)| format!("attempt {}: {}", i + 1, e))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            writer
                .write_event(Event::Text(BytesText::new(&detail)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("failure")))
                .map_err(xml_err)?;
        }
        TestStatus::Skipped => {
            writer
                .write_event(Event::Empty(BytesStart::new("skipped")))
                .map_err(xml_err)?;
        }
        TestStatus::Flaky => {
            let note = format!(
                "flaky: passed after {} retries; first failure: {}",
                result.retries,
                result.first_error().unwrap_or("unknown")
            );
            writer
                .write_event(Event::Start(BytesStart::new("system-out")))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&note)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("system-out")))
                .map_err(xml_err)?;
        }
        TestStatus::Passed => {}
    }

    writer
        .write_event(Event::End(BytesEnd::new("testcase")))
        .map_err(xml_err)?;
    Ok(())
}

pub(super) fn write(summary: &TestRunSummary, dir: &Path) -> Result<PathBuf> {
    let xml = render(summary)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    info!("JUnit report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprobe_ir::RunCoverage;
    use chrono::Utc;

    fn result(name: &str, status: TestStatus) -> TestResult {
        TestResult {
            id: name.to_lowercase(),
            name: name.into(),
            status,
            duration_ms: 1500,
            retries: 0,
            steps: Vec::new(),
            error: None,
            attempt_errors: Vec::new(),
            tags: vec!["auth".into()],
        }
    }

    #[test]
    fn renders_statuses() {
        let mut failed = result("Checkout <flow>", TestStatus::Failed);
        failed.error = Some("Element \"#pay\" not found".into());
        failed.attempt_errors = vec!["timeout".into(), "Element \"#pay\" not found".into()];
        let mut flaky = result("Sign in", TestStatus::Flaky);
        flaky.retries = 1;
        flaky.attempt_errors = vec!["slow login".into()];

        let summary = TestRunSummary::new(
            "run-1",
            Utc::now(),
            vec![
                result("Browse", TestStatus::Passed),
                failed,
                flaky,
                result("Empty", TestStatus::Skipped),
            ],
            RunCoverage::default(),
            Vec::new(),
        );
        let xml = render(&summary).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<testsuites name="autoprobe" tests="4" failures="1" skipped="1""#));
        assert!(xml.contains(r#"<testcase name="Checkout &lt;flow&gt;" classname="autoprobe.auth" time="1.500">"#));
        assert!(xml.contains("attempt 1: timeout"));
        assert!(xml.contains("<skipped/>"));
        assert!(xml.contains("flaky: passed after 1 retries; first failure: slow login"));
    }
}
