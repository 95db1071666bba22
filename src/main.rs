use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use form_sweep::browser::mock::{DEMO_CATALOG, MOCK_PROJECT_URL};
use form_sweep::browser::{Browser, MockBrowser, MockFlow, WebDriverBrowser, WebDriverConfig};
use form_sweep::config::{self, DEFAULT_SHEET_NAME};
use form_sweep::harness::{DriverSettings, FlowDriver, Selectors, declared_upper_bound, run_sweep};
use form_sweep::question::{Catalog, Mode};
use form_sweep::runner::SweepReport;
use form_sweep::session::{Session, cleanup_old_sessions, list_sessions};
use form_sweep::table::OutputTable;

/// Form Sweep - combinatorial testing of web questionnaires
#[derive(Parser, Debug)]
#[command(
    name = "form-sweep",
    about = "Drive a multi-page web questionnaire through every combination of answers",
    after_help = "ENVIRONMENT VARIABLES:\n\
        FORM_SWEEP_WEBDRIVER           WebDriver endpoint URL\n\
        FORM_SWEEP_REQUEST_TIMEOUT     Seconds per WebDriver request\n\
        FORM_SWEEP_IMPLICIT_WAIT_MS    Implicit wait for element lookups\n\
        FORM_SWEEP_PROBE_WAIT_MS       Implicit wait while probing for optional elements\n\
        FORM_SWEEP_POLL_INTERVAL_MS    Sleep between polling attempts\n\
        FORM_SWEEP_POLL_ATTEMPTS       Polling attempts before an absence is fatal\n\
        FORM_SWEEP_MAX_INTERSTITIAL    Clicks allowed through informational pages\n\
        FORM_SWEEP_MAX_STEPS           Steps allowed in one run\n\
        FORM_SWEEP_SESSION_DIR         Base directory for sweep output\n\
        RUST_LOG                       Log filter (default: info)"
)]
struct Args {
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep a live questionnaire through a WebDriver server
    Run {
        /// Question catalog (YAML or JSON)
        #[arg(short, long)]
        catalog: PathBuf,

        /// WebDriver endpoint URL
        #[arg(long, env = "FORM_SWEEP_WEBDRIVER")]
        webdriver: Option<String>,

        /// Page holding the link that launches the flow (overrides the catalog)
        #[arg(long)]
        project_url: Option<String>,

        /// CSS selector of the launch link (overrides the catalog)
        #[arg(long)]
        entry_selector: Option<String>,

        /// CSS selector present only on a successful completion page (overrides the catalog)
        #[arg(long)]
        success_selector: Option<String>,

        /// Seed for random-mode questions
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory (default: auto-generated in the session dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the browser without a visible window
        #[arg(long)]
        headless: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a catalog and show what a sweep would enumerate
    Plan {
        /// Question catalog (YAML or JSON)
        #[arg(short, long)]
        catalog: PathBuf,
    },

    /// Sweep the built-in mock benefits screener
    Demo {
        /// Seed for random-mode questions
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory (default: auto-generated in the session dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep output after completion (default: cleanup unless --output is specified)
        #[arg(long, short = 'k')]
        keep: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List sweep sessions, optionally removing old ones
    Sessions {
        /// Remove sessions older than this many hours
        #[arg(long)]
        clean_older_than: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Some(Commands::Run {
            catalog: catalog_path,
            webdriver,
            project_url,
            entry_selector,
            success_selector,
            seed,
            output,
            headless,
            json,
        }) => {
            let catalog = Catalog::load(&catalog_path)?;
            // malformed rows abort before a browser session exists
            catalog.definitions()?;

            let target = catalog.target();
            let project_url = project_url
                .or(target.project_url)
                .ok_or("no project URL: pass --project-url or set target.project_url in the catalog")?;
            let mut selectors = Selectors::default();
            if let Some(entry) = entry_selector.or(target.entry_selector) {
                selectors.entry = entry;
            }
            if let Some(success) = success_selector.or(target.success_selector) {
                selectors.success_marker = success;
            }
            let sheet = target.sheet.unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());

            let mut settings = DriverSettings::default().selectors(selectors);
            if let Some(seed) = seed {
                settings = settings.seed(seed);
            }

            let session = match output {
                Some(dir) => Session::in_dir(dir),
                None => Session::with_name(&session_name(&catalog_path)).keep(true),
            };
            session.init(Some(&catalog_path))?;

            let endpoint = webdriver.unwrap_or_else(config::webdriver_endpoint);
            let mut browser = WebDriverBrowser::connect(WebDriverConfig::new(endpoint).headless(headless))?;
            info!(session = %browser.session_id(), "connected to WebDriver");
            browser.navigate(&project_url)?;

            let mut driver = FlowDriver::new(browser, settings, &catalog, &sheet)?;
            let report = run_sweep(&mut driver);
            let (browser, table, _) = driver.into_parts();
            session.save(&table, &report)?;
            if let Err(e) = browser.quit() {
                warn!(error = %e, "failed to end WebDriver session");
            }

            print_report(&report, &session, json)?;
            if let Some(error) = report.error {
                return Err(error.into());
            }
        }

        Some(Commands::Plan { catalog: catalog_path }) => {
            let catalog = Catalog::load(&catalog_path)?;
            let defs = catalog.definitions()?;

            println!("Catalog: {} ({} questions)", catalog_path.display(), defs.len());
            for (column, def) in defs.iter().enumerate() {
                println!(
                    "  [{}] {:<8} {:<8} {:>2} options  {}",
                    column,
                    def.mode.to_string(),
                    def.variant.kind().to_string(),
                    def.options,
                    def.text
                );
            }

            let exhaustive: Vec<usize> = defs
                .iter()
                .filter(|d| d.mode == Mode::Exhaustive)
                .map(|d| d.options)
                .collect();
            println!();
            println!("Exhaustive questions: {}", exhaustive.len());
            println!("Runs (upper bound from declared options): {}", declared_upper_bound(&exhaustive));
        }

        Some(Commands::Demo { seed, output, keep, json }) => {
            let catalog = Catalog::from_yaml(DEMO_CATALOG)?;
            let target = catalog.target();
            let mut settings = DriverSettings::immediate();
            if let Some(success) = target.success_selector {
                settings.selectors.success_marker = success;
            }
            if let Some(seed) = seed {
                settings = settings.seed(seed);
            }

            let session = match output {
                Some(ref dir) => Session::in_dir(dir),
                None => Session::with_name("demo").keep(keep),
            };
            session.init(None)?;

            let mut browser = MockBrowser::new(MockFlow::demo(), settings.selectors.clone());
            browser.navigate(target.project_url.as_deref().unwrap_or(MOCK_PROJECT_URL))?;
            let sheet = target.sheet.unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());

            let mut driver = FlowDriver::new(browser, settings, &catalog, &sheet)?;
            let report = run_sweep(&mut driver);
            let (_, table, _) = driver.into_parts();
            session.save(&table, &report)?;

            if !json {
                print_table(&table);
                println!();
            }
            print_report(&report, &session, json)?;
            if let Some(error) = report.error {
                return Err(error.into());
            }
        }

        Some(Commands::Sessions { clean_older_than }) => {
            if let Some(hours) = clean_older_than {
                let removed = cleanup_old_sessions(Duration::from_secs(hours * 3600))?;
                println!("Removed {} session(s) older than {}h", removed, hours);
            }
            let sessions = list_sessions()?;
            println!("Sessions in {}: {}", config::session_base_dir(), sessions.len());
            for dir in sessions {
                println!("  {}", dir.display());
            }
        }

        None => {
            println!("Form Sweep - combinatorial testing of web questionnaires");
            println!();
            println!("Usage: form-sweep <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Sweep a live questionnaire through a WebDriver server");
            println!("  plan      Validate a catalog and show what a sweep would enumerate");
            println!("  demo      Sweep the built-in mock benefits screener");
            println!("  sessions  List or clean up sweep output directories");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

fn session_name(catalog: &Path) -> String {
    catalog
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "sweep".to_string())
}

fn print_report(report: &SweepReport, session: &Session, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match &report.error {
        None => println!(
            "Sweep completed: {} runs ({} successful, {} failed)",
            report.runs.len(),
            report.successes(),
            report.failures()
        ),
        Some(error) => {
            println!("Sweep aborted after {} completed runs", report.runs.len());
            println!("  Error: {}", error);
        }
    }
    if session.keep {
        println!("\nSession: {}", session.dir.display());
    }
    Ok(())
}

fn print_table(table: &OutputTable) {
    let columns = (0..table.row_count())
        .filter_map(|r| table.row(r).map(<[_]>::len))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0; columns];
    for r in 0..table.row_count() {
        for (c, width) in widths.iter_mut().enumerate() {
            *width = (*width).max(table.cell(r, c).unwrap_or("").chars().count());
        }
    }

    println!("Sheet: {}", table.name);
    for r in 0..table.row_count() {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(c, &w)| format!("{:<w$}", table.cell(r, c).unwrap_or(""), w = w))
            .collect();
        println!("| {} |", cells.join(" | "));
    }
}
