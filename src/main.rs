use anyhow::{bail, Context};
use autoprobe::{Config, Params};
use autoprobe_ir::{DiscoveryErrorKind, DiscoveryReport, TestCase, TestManifest, TestStatus};
use autoprobe_locator::EokaLauncher;
use autoprobe_runner::{load_summary, render_reports, write_reports, ReportFormat, Runner};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "autoprobe")]
#[command(about = "Crawl a web app and run the user flows it finds as browser tests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run the browser headless (overrides config)
    #[arg(long, global = true)]
    headless: bool,

    /// Set a config parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE", global = true)]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Validate the config and exit
    #[arg(long, global = true)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the application and write a discovery report
    Discover {
        config: PathBuf,
    },

    /// Run tests from a manifest or from the flows of a discovery report
    Run {
        config: PathBuf,

        /// Test manifest JSON
        #[arg(long, conflicts_with = "report")]
        manifest: Option<PathBuf>,

        /// Discovery report JSON (default: <output_dir>/discovery/latest.json)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Only run tests with this tag (can be used multiple times)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Render HTML or JUnit reports from a saved run summary
    Report {
        summary: PathBuf,

        /// all, html or junit
        #[arg(long, default_value = "all")]
        format: ReportFormat,

        /// Output directory (default: next to the summary)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let params = Params::from_args(&cli.params)?;

    match cli.command {
        Command::Discover { ref config } => {
            let Some(config) = load(config, &params, &cli)? else {
                return Ok(());
            };
            discover(&config).await
        }
        Command::Run {
            ref config,
            ref manifest,
            ref report,
            ref tags,
        } => {
            let Some(mut config) = load(config, &params, &cli)? else {
                return Ok(());
            };
            if !tags.is_empty() {
                config.run.tags = tags.clone();
            }
            let tests = load_tests(&config, manifest.as_deref(), report.as_deref())?;
            if !run(&config, tests).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Report {
            ref summary,
            format,
            ref out,
        } => {
            if format == ReportFormat::Json {
                bail!("the summary is already JSON; use --format html, junit or all");
            }
            let loaded = load_summary(summary)?;
            let dir = match out {
                Some(dir) => dir.clone(),
                None => summary.parent().unwrap_or(Path::new(".")).to_path_buf(),
            };
            for path in render_reports(&loaded, &dir, format)? {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

/// Load the config, applying `--headless`. `None` after a `--check`.
fn load(path: &Path, params: &Params, cli: &Cli) -> anyhow::Result<Option<Config>> {
    let mut config = Config::load_with_params(path, params)
        .with_context(|| format!("loading {}", path.display()))?;

    if cli.check {
        print_check(&config);
        return Ok(None);
    }
    if cli.headless {
        config.browser.headless = true;
    }
    Ok(Some(config))
}

fn print_check(config: &Config) {
    println!("Config valid: {}", config.name);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  Crawl: depth {}, up to {} pages",
        config.crawl.max_depth, config.crawl.max_pages
    );
    if !config.crawl.exclude_routes.is_empty() {
        println!("  Excluded: {}", config.crawl.exclude_routes.join(", "));
    }
    if let Some(ref creds) = config.credentials {
        println!(
            "  Credentials: {} ({} auth routes)",
            creds.email,
            config.crawl.auth_routes.len()
        );
    }
    println!("  Retries: {}", config.run.retries);
    if !config.run.tags.is_empty() {
        println!("  Tags: {}", config.run.tags.join(", "));
    }
    if !config.params.is_empty() {
        println!("  Parameters: {}", config.params.len());
        let mut names: Vec<_> = config.params.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, def) in names {
            let req = if def.required { " (required)" } else { "" };
            let desc = def.description.as_deref().unwrap_or("");
            println!("    - {}{}: {}", name, req, desc);
        }
    }
    println!("  Output: {}", config.output_dir.display());
}

async fn discover(config: &Config) -> anyhow::Result<()> {
    println!("Discovering: {} ({})", config.name, config.base_url);

    let launcher = EokaLauncher::new(config.browser_options());
    let report = autoprobe_crawler::discover(&launcher, config.crawl_options()).await?;
    let path = autoprobe_crawler::write_report(&report, config.discovery_dir())?;

    let totals = &report.total_elements;
    println!();
    println!("  Pages: {}", report.coverage.pages_visited);
    println!(
        "  Forms: {}  Inputs: {}  Buttons: {}  Links: {}  Modals: {}",
        totals.forms, totals.inputs, totals.buttons, totals.links, totals.modals
    );
    println!("  Suggested flows: {}", report.coverage.flows_suggested);
    if report.coverage.authenticated {
        println!("  Authenticated pass: yes");
    }
    if !report.errors.is_empty() {
        println!("  Errors: {}", report.errors.len());
        for error in &report.errors {
            let kind = match error.kind {
                DiscoveryErrorKind::Navigation => "navigation",
                DiscoveryErrorKind::Timeout => "timeout",
                DiscoveryErrorKind::Auth => "auth",
                DiscoveryErrorKind::Element => "element",
            };
            println!("    - [{}] {}: {}", kind, error.url, error.message);
        }
    }
    println!("  Duration: {}ms", report.duration_ms);
    println!("  Report: {}", path.display());
    Ok(())
}

fn load_tests(
    config: &Config,
    manifest: Option<&Path>,
    report: Option<&Path>,
) -> anyhow::Result<Vec<TestCase>> {
    if let Some(path) = manifest {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifest = TestManifest::from_json(&text)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        info!("Loaded {} tests from {}", manifest.tests.len(), path.display());
        return Ok(manifest.tests);
    }

    let path = report
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.discovery_dir().join(autoprobe_crawler::LATEST_REPORT));
    let text = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "reading discovery report {} (run `autoprobe discover` first)",
            path.display()
        )
    })?;
    let report = DiscoveryReport::from_json(&text)
        .with_context(|| format!("parsing discovery report {}", path.display()))?;
    let manifest = TestManifest::from_flows(&report.suggested_flows);
    info!(
        "Built {} tests from the flows in {}",
        manifest.tests.len(),
        path.display()
    );
    Ok(manifest.tests)
}

/// Returns whether every test passed or was flaky.
async fn run(config: &Config, tests: Vec<TestCase>) -> anyhow::Result<bool> {
    println!("Running: {} ({} tests)", config.name, tests.len());

    let launcher = EokaLauncher::new(config.browser_options());
    let runner = Runner::new(&launcher, config.run_options());
    let summary = runner.run(tests).await?;
    let written = write_reports(&summary, config.runs_dir(), config.run.report_format)?;

    println!();
    for result in &summary.results {
        let mark = match result.status {
            TestStatus::Passed => "✓",
            TestStatus::Flaky => "~",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
        };
        println!("  {} {} ({}ms)", mark, result.name, result.duration_ms);
        if let Some(ref error) = result.error {
            println!("      {}", error);
        }
    }
    println!();
    println!(
        "  {} passed, {} failed, {} flaky, {} skipped",
        summary.passed, summary.failed, summary.flaky, summary.skipped
    );
    if !summary.healing_events.is_empty() {
        println!("  Healed locators: {}", summary.healing_events.len());
    }
    println!("  Duration: {}ms", summary.duration_ms);
    for path in written {
        println!("  Report: {}", path.display());
    }
    Ok(summary.success())
}
