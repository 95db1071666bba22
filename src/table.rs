//! Output table: one header row, one row per run.
//!
//! The table is written progressively. Row 0 holds question texts in column
//! (discovery) order. Each run writes its selections into the last row and the
//! driver opens a fresh row when the run ends, so after N runs the table has
//! N + 2 rows. Outcomes are appended positionally by [`OutputTable::append_results`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::runner::Outcome;

/// Header of the trailing outcome column
pub const RESULTS_HEADER: &str = "Results";

/// Answer label used for questions a run never reached
pub const UNANSWERED: &str = "(not reached)";

/// Outcome counts for one answer of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerTally {
    pub answer: String,
    pub successes: usize,
    pub failures: usize,
}

impl AnswerTally {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            successes: 0,
            failures: 0,
        }
    }
}

/// Answers given to one question, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBreakdown {
    pub question: String,
    pub answers: Vec<AnswerTally>,
}

/// In-memory sheet of optional text cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTable {
    /// Sheet name
    pub name: String,
    rows: Vec<Vec<Option<String>>>,
}

impl OutputTable {
    /// Create a sheet containing only an empty header row
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: vec![Vec::new()],
        }
    }

    pub fn set_header(&mut self, column: usize, text: &str) {
        self.set_cell(0, column, text);
    }

    /// Header texts, empty string for unset cells
    pub fn headers(&self) -> Vec<&str> {
        self.rows[0]
            .iter()
            .map(|c| c.as_deref().unwrap_or(""))
            .collect()
    }

    /// Open a new empty row at the bottom and return its index
    pub fn push_row(&mut self) -> usize {
        self.rows.push(Vec::new());
        self.last_row()
    }

    /// Index of the bottom row
    pub fn last_row(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        while self.rows.len() <= row {
            self.rows.push(Vec::new());
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, None);
        }
        cells[column] = Some(value.into());
    }

    /// Write into the bottom row, the one the current run fills
    pub fn set_current(&mut self, column: usize, value: impl Into<String>) {
        let row = self.last_row();
        self.set_cell(row, column, value);
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    pub fn row(&self, row: usize) -> Option<&[Option<String>]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Append the `Results` column.
    ///
    /// Data row `i` receives `results[i - 1]`. The bottom row is the one
    /// opened for a run that never happened (or never finished) and stays
    /// without an outcome. Returns the number of outcomes written.
    pub fn append_results(&mut self, results: &[Outcome]) -> usize {
        let column = self.rows[0].len();
        self.set_header(column, RESULTS_HEADER);

        let mut written = 0;
        for (row, outcome) in (1..self.last_row()).zip(results) {
            self.set_cell(row, column, outcome.as_str());
            written += 1;
        }
        written
    }

    /// Outcome counts per answer for every question column.
    ///
    /// Only rows carrying an outcome are counted. Empty without a `Results` column.
    pub fn breakdown(&self) -> Vec<ColumnBreakdown> {
        let headers = self.headers();
        let Some(results) = headers.iter().rposition(|h| *h == RESULTS_HEADER) else {
            return Vec::new();
        };

        let mut columns = Vec::new();
        for (column, question) in headers.iter().enumerate().filter(|(c, _)| *c != results) {
            let mut answers: Vec<AnswerTally> = Vec::new();
            for row in 1..self.row_count() {
                let Some(outcome) = self.cell(row, results) else {
                    continue;
                };
                let answer = self.cell(row, column).unwrap_or(UNANSWERED);
                let index = match answers.iter().position(|t| t.answer == answer) {
                    Some(i) => i,
                    None => {
                        answers.push(AnswerTally::new(answer));
                        answers.len() - 1
                    }
                };
                if outcome == Outcome::Success.as_str() {
                    answers[index].successes += 1;
                } else {
                    answers[index].failures += 1;
                }
            }
            columns.push(ColumnBreakdown {
                question: question.to_string(),
                answers,
            });
        }
        columns
    }

    /// Persist as pretty-printed JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
