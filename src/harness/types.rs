use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::browser::BrowserError;
use crate::config;

/// CSS selectors describing the target application's markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Link on the project page that opens a fresh flow in a new window
    pub entry: String,

    /// One element per question block, holding the question text
    pub question_label: String,

    /// One element per question block, holding the answer control
    pub question_input: String,

    /// Question text inside a label block
    pub label_text: String,

    /// Grouping fieldset inside an input block; its class names the group kind
    pub group: String,

    /// Clickable options of radio and checkbox groups
    pub choice_option: String,

    /// Clickable options of boolean groups
    pub toggle_option: String,

    /// Collapsible dropdown control
    pub dropdown: String,

    /// Entries of a dropdown, placeholder first
    pub dropdown_option: String,

    /// Free-text input
    pub text_input: String,

    /// Continue / submit button
    pub primary_action: String,

    /// Continue / submit button once the page accepts it
    pub primary_enabled: String,

    /// Marker present on the completion page of a successful run
    pub success_marker: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            entry: "a.launch-app".to_string(),
            question_label: ".page-block__field-label".to_string(),
            question_input: ".page-block__field-input".to_string(),
            label_text: "p".to_string(),
            group: "fieldset".to_string(),
            choice_option: "p".to_string(),
            toggle_option: "label".to_string(),
            dropdown: "select".to_string(),
            dropdown_option: "option".to_string(),
            text_input: "input".to_string(),
            primary_action: ".btn-primary".to_string(),
            primary_enabled: ".btn-primary:not(.disabled)".to_string(),
            success_marker: ".submission-success".to_string(),
        }
    }
}

/// Bounded polling for elements that may not have rendered yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Sleep between attempts
    pub interval: Duration,

    /// Attempts before the absence becomes fatal
    pub attempts: usize,
}

impl WaitPolicy {
    /// Poll without sleeping (for in-memory browsers)
    pub fn immediate(attempts: usize) -> Self {
        Self {
            interval: Duration::ZERO,
            attempts,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        let timing = &config::get().timing;
        Self {
            interval: timing.poll_interval,
            attempts: timing.poll_attempts,
        }
    }
}

/// Settings for the page/run driver
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Markup of the target application
    pub selectors: Selectors,

    /// Implicit wait for regular lookups
    pub implicit_wait: Duration,

    /// Implicit wait while probing for elements that may legitimately be absent
    pub probe_wait: Duration,

    /// Polling for transient absence
    pub wait: WaitPolicy,

    /// Clicks allowed through question-less pages after one page advance
    pub max_interstitial: usize,

    /// Question applications allowed in one run before it is declared stuck
    pub max_steps: usize,

    /// Seed for random-mode selections (entropy when unset)
    pub seed: Option<u64>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        let timing = &config::get().timing;
        Self {
            selectors: Selectors::default(),
            implicit_wait: timing.implicit_wait,
            probe_wait: timing.probe_wait,
            wait: WaitPolicy::default(),
            max_interstitial: timing.max_interstitial,
            max_steps: timing.max_steps,
            seed: None,
        }
    }
}

impl DriverSettings {
    /// Settings for an in-memory browser: no sleeping, tight limits
    pub fn immediate() -> Self {
        Self {
            implicit_wait: Duration::ZERO,
            probe_wait: Duration::ZERO,
            wait: WaitPolicy::immediate(3),
            ..Default::default()
        }
    }

    pub fn selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn max_interstitial(mut self, max_interstitial: usize) -> Self {
        self.max_interstitial = max_interstitial;
        self
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for harness operations
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Malformed question catalog; nothing has run yet
    #[error("configuration error in row {row}: {reason}")]
    Config { row: usize, reason: String },

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("question '{question}' has no option {index} ({available} rendered)")]
    OptionOutOfRange {
        question: String,
        index: usize,
        available: usize,
    },

    #[error("'{selector}' did not appear after {attempts} attempts")]
    ElementTimeout { selector: String, attempts: usize },

    #[error("primary action control '{selector}' is missing")]
    ActionControlMissing { selector: String },

    #[error("still no questions after {0} clicks through informational pages")]
    InterstitialLimit(usize),

    #[error("run did not reach an end state within {0} steps")]
    StepLimit(usize),

    #[error("launching the flow did not open a new window")]
    NoFlowWindow,

    /// Fatal error with the position the run had reached
    #[error("run {run} aborted on page {page}, position {position} (question: {question}): {source}")]
    RunAborted {
        run: usize,
        page: usize,
        position: usize,
        question: String,
        source: Box<HarnessError>,
    },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HarnessError {
    pub(crate) fn config(row: usize, reason: impl Into<String>) -> Self {
        HarnessError::Config {
            row,
            reason: reason.into(),
        }
    }
}
