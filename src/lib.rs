//! Form Sweep - combinatorial testing of multi-page web questionnaires.
//!
//! This crate provides:
//! - A `Browser` abstraction with a W3C WebDriver client and an in-memory mock
//! - Question variants that apply their own answers and record the labels
//! - Adaptive discovery and classification of questions missing from the catalog
//! - A recursive planner enumerating every option combination of `test` questions
//! - A page/run driver and an output table with one row per run
//! - Session management for organized sweep output
//!
//! # Example
//!
//! ```rust,no_run
//! use form_sweep::browser::{Browser, WebDriverBrowser, WebDriverConfig};
//! use form_sweep::harness::{DriverSettings, FlowDriver, run_sweep};
//! use form_sweep::question::Catalog;
//!
//! let catalog = Catalog::load(std::path::Path::new("catalog.yaml")).unwrap();
//! let mut browser = WebDriverBrowser::connect(WebDriverConfig::default()).unwrap();
//! browser.navigate("https://forms.example.org/projects").unwrap();
//!
//! let mut driver = FlowDriver::new(browser, DriverSettings::default(), &catalog, "Results").unwrap();
//! let report = run_sweep(&mut driver);
//! println!("{} runs, {} successful", report.runs.len(), report.successes());
//! ```

pub mod browser;
pub mod config;
pub mod harness;
pub mod question;
pub mod runner;
pub mod session;
pub mod table;

// Re-export browser types
pub use browser::{Browser, BrowserError, BrowserResult, ElementRef, MockBrowser, WebDriverBrowser, WebDriverConfig};

// Re-export harness types
pub use harness::{
    DriverSettings, FlowDriver, HarnessError, HarnessResult, RunPlanner, RunTarget, Selectors, run_sweep,
};

// Re-export question types
pub use question::{Catalog, Mode, Question, QuestionKind, QuestionRegistry};

// Re-export results
pub use runner::{Outcome, RunRecord, SweepReport};
pub use table::OutputTable;

// Re-export session management
pub use session::{Session, cleanup_old_sessions, list_sessions};
