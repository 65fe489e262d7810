use crate::Result;
use autoprobe_ir::{StepStatus, TestResult, TestRunSummary, TestStatus};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STYLE: &str = r#"
        :root { --bg: #0f172a; --panel: #1e293b; --border: #334155; --text: #f1f5f9;
                --muted: #94a3b8; --green: #10b981; --red: #ef4444; --yellow: #f59e0b; --gray: #64748b; }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: system-ui, -apple-system, sans-serif; background: var(--bg); color: var(--text);
               line-height: 1.5; padding: 2rem 1rem; }
        .container { max-width: 1100px; margin: 0 auto; }
        header { margin-bottom: 2rem; }
        h1 { font-size: 1.75rem; font-weight: 700; }
        .meta { color: var(--muted); font-size: .875rem; }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 1rem; margin-bottom: 2rem; }
        .stat { background: var(--panel); border: 1px solid var(--border); border-radius: 8px; padding: 1rem; }
        .stat .value { font-size: 1.75rem; font-weight: 700; }
        .stat.passed .value { color: var(--green); }
        .stat.failed .value { color: var(--red); }
        .stat.flaky .value { color: var(--yellow); }
        .test { background: var(--panel); border: 1px solid var(--border); border-left: 4px solid var(--gray);
                border-radius: 8px; margin-bottom: 1rem; }
        .test.passed { border-left-color: var(--green); }
        .test.failed { border-left-color: var(--red); }
        .test.flaky { border-left-color: var(--yellow); }
        .test summary { cursor: pointer; padding: 1rem; display: flex; justify-content: space-between; }
        .badge { font-size: .75rem; text-transform: uppercase; font-weight: 600; color: var(--muted); }
        .steps { padding: 0 1rem 1rem; }
        .step { display: flex; gap: .75rem; padding: .4rem 0; border-top: 1px solid var(--border); font-size: .9rem; }
        .step .icon { width: 1.25rem; }
        .step.passed .icon { color: var(--green); }
        .step.failed .icon { color: var(--red); }
        .step.skipped { color: var(--gray); }
        .error { color: var(--red); font-family: monospace; white-space: pre-wrap; margin-top: .25rem; }
        .healed { color: var(--yellow); font-size: .8rem; }
        .duration { color: var(--muted); font-size: .8rem; }
        img.shot { max-width: 100%; margin-top: .5rem; border: 1px solid var(--border); border-radius: 4px; }
        table { width: 100%; border-collapse: collapse; font-size: .85rem; }
        th, td { text-align: left; padding: .4rem; border-top: 1px solid var(--border); }
        h2 { font-size: 1.2rem; margin: 2rem 0 1rem; }
"#;

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:.0}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
    }
}

/// Inline image for a screenshot on disk; a plain note when it cannot be read.
fn screenshot_html(path: &str) -> String {
    match std::fs::read(path) {
        Ok(bytes) => format!(
            r#"<img class="shot" alt="failure screenshot" src="data:image/png;base64,{}">"#,
            BASE64.encode(bytes)
        ),
        Err(e) => {
            debug!("screenshot {} not embedded: {}", path, e);
            format!(
                r#"<div class="meta">screenshot: {}</div>"#,
                html_escape(path)
            )
        }
    }
}

fn test_html(result: &TestResult) -> String {
    let mut steps = String::new();
    for step in &result.steps {
        let (icon, class) = match step.status {
            StepStatus::Passed => ("✓", "passed"),
            StepStatus::Failed => ("✗", "failed"),
            StepStatus::Skipped => ("○", "skipped"),
        };
        let mut detail = String::new();
        if let Some(ref healed) = step.healed_locator {
            let _ = write!(
                detail,
                r#"<div class="healed">healed with {}</div>"#,
                html_escape(healed)
            );
        }
        if let Some(ref error) = step.error {
            let _ = write!(detail, r#"<div class="error">{}</div>"#, html_escape(error));
        }
        if let Some(ref shot) = step.screenshot {
            detail.push_str(&screenshot_html(shot));
        }
        let _ = write!(
            steps,
            r#"
                <div class="step {class}">
                    <div class="icon">{icon}</div>
                    <div>
                        <div>{number}. <strong>{action}</strong> {description} <span class="duration">{duration}</span></div>
                        {detail}
                    </div>
                </div>"#,
            number = step.step_number,
            action = step.action,
            description = html_escape(&step.description),
            duration = format_duration(step.duration_ms),
        );
    }

    let retries = if result.retries > 0 {
        format!(", {} retries", result.retries)
    } else {
        String::new()
    };
    let error = match (result.status, result.error.as_deref()) {
        (TestStatus::Failed, Some(e)) => {
            format!(r#"<div class="error">{}</div>"#, html_escape(e))
        }
        _ => String::new(),
    };
    let open = if result.status == TestStatus::Failed {
        " open"
    } else {
        ""
    };

    format!(
        r#"
        <details class="test {status}"{open}>
            <summary>
                <span>{name}</span>
                <span><span class="badge">{status}</span> <span class="duration">{duration}{retries}</span></span>
            </summary>
            <div class="steps">{error}{steps}
            </div>
        </details>"#,
        status = result.status,
        name = html_escape(&result.name),
        duration = format_duration(result.duration_ms),
    )
}

pub(super) fn render(summary: &TestRunSummary) -> String {
    let tests: String = summary.results.iter().map(test_html).collect();

    let healing = if summary.healing_events.is_empty() {
        String::new()
    } else {
        let rows: String = summary
            .healing_events
            .iter()
            .map(|e| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    html_escape(&e.description),
                    html_escape(&e.original),
                    html_escape(&e.healed_with),
                    e.reason
                )
            })
            .collect();
        format!(
            r#"<h2>Healed locators</h2>
        <table><tr><th>Element</th><th>Original</th><th>Healed with</th><th>Reason</th></tr>{}</table>"#,
            rows
        )
    };

    let c = &summary.coverage;
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>autoprobe - {run_id}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Test run {run_id}</h1>
            <div class="meta">Started {started} · {duration} · {pages} pages · {steps} steps · {elements} elements</div>
        </header>
        <div class="stats">
            <div class="stat"><div class="meta">Total</div><div class="value">{total}</div></div>
            <div class="stat passed"><div class="meta">Passed</div><div class="value">{passed}</div></div>
            <div class="stat failed"><div class="meta">Failed</div><div class="value">{failed}</div></div>
            <div class="stat flaky"><div class="meta">Flaky</div><div class="value">{flaky}</div></div>
            <div class="stat"><div class="meta">Skipped</div><div class="value">{skipped}</div></div>
        </div>
        {tests}
        {healing}
    </div>
</body>
</html>
"#,
        run_id = html_escape(&summary.run_id),
        started = summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        duration = format_duration(summary.duration_ms),
        pages = c.pages_visited,
        steps = c.steps_executed,
        elements = c.elements_interacted,
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        flaky = summary.flaky,
        skipped = summary.skipped,
    )
}

pub(super) fn write(summary: &TestRunSummary, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("report.html");
    std::fs::write(&path, render(summary))?;
    info!("HTML report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoprobe_ir::{Action, HealReason, HealingEvent, RunCoverage, StepResult};
    use chrono::Utc;

    #[test]
    fn escapes_and_embeds_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("fail.png");
        std::fs::write(&shot, b"png-bytes").unwrap();

        let result = TestResult {
            id: "contact".into(),
            name: "Submit <contact> form".into(),
            status: TestStatus::Failed,
            duration_ms: 2500,
            retries: 2,
            steps: vec![StepResult {
                step_number: 1,
                action: Action::Click,
                description: "Send".into(),
                status: StepStatus::Failed,
                duration_ms: 40,
                error: Some("not found: \"#send\"".into()),
                screenshot: Some(shot.to_string_lossy().into_owned()),
                healed_locator: None,
            }],
            error: Some("step 1: not found".into()),
            attempt_errors: Vec::new(),
            tags: Vec::new(),
        };
        let healed = HealingEvent {
            original: "#old".into(),
            description: "Send".into(),
            healed_with: "[data-testid=\"send\"]".into(),
            reason: HealReason::PartialData,
            timestamp: Utc::now(),
        };
        let summary = TestRunSummary::new(
            "run-x",
            Utc::now(),
            vec![result],
            RunCoverage::default(),
            vec![healed],
        );

        let html = render(&summary);
        assert!(html.contains("Submit &lt;contact&gt; form"));
        assert!(html.contains("not found: &quot;#send&quot;"));
        assert!(html.contains(&format!("data:image/png;base64,{}", BASE64.encode(b"png-bytes"))));
        assert!(html.contains("partial-data"));
        assert!(html.contains(r#"<details class="test failed" open>"#));
    }

    #[test]
    fn missing_screenshot_falls_back_to_path() {
        assert!(screenshot_html("/nonexistent/shot.png").contains("/nonexistent/shot.png"));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(2500), "2.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }
}
