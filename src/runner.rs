//! Types for sweep run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The success marker was present on the completion page
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Failure => "Failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed run of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run number (1-based)
    pub run: usize,

    /// Option index tested for each exhaustive question, in plan order
    pub combination: Vec<usize>,

    pub outcome: Outcome,
}

/// Result of a complete sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Whether every planned run completed
    pub completed: bool,

    /// Error message if the sweep was aborted
    pub error: Option<String>,

    /// Exhaustive questions, in plan order
    pub exhaustive: Vec<String>,

    /// Every run that reached an outcome
    pub runs: Vec<RunRecord>,

    pub started: DateTime<Utc>,

    pub finished: DateTime<Utc>,
}

impl SweepReport {
    pub fn successes(&self) -> usize {
        self.runs.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.runs.len() - self.successes()
    }
}
