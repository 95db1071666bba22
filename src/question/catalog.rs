//! Question catalog: the tabular configuration read before any run.
//!
//! A catalog is a YAML (or JSON) document:
//!
//! ```yaml
//! target:
//!   project_url: https://forms.example.org/projects
//!   success_selector: .submission-success
//! questions:
//!   - { text: "Are you a resident?", mode: test, type: boolean, options: 2, default: -1 }
//!   - { text: "Which programs?", mode: default, type: checkbox, options: 4, default: "0, 2" }
//! ```
//!
//! Rows are validated up front; any malformed row aborts with its 1-based
//! row number before a browser is touched.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::types::{Mode, QuestionKind, Variant};
use crate::harness::types::{HarnessError, HarnessResult};

/// Default-cell value meaning "use the built-in default"
pub const NO_CUSTOM_DEFAULT: i64 = -1;

/// A spreadsheet-style cell: numbers may arrive as integers, floats or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<CellValue>),
}

impl CellValue {
    fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Int(n) => Some(*n),
            CellValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_sentinel(&self) -> bool {
        self.as_integer() == Some(NO_CUSTOM_DEFAULT)
    }

    fn render(&self) -> String {
        match self {
            CellValue::Int(n) => n.to_string(),
            CellValue::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::List(items) => items.iter().map(CellValue::render).collect::<Vec<_>>().join(", "),
        }
    }
}

/// Where and how to reach the application under test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSection {
    /// Page holding the link that launches the flow
    pub project_url: Option<String>,
    pub entry_selector: Option<String>,
    /// Marker present on the completion page of a successful run
    pub success_selector: Option<String>,
    /// Output sheet name
    pub sheet: Option<String>,
}

/// One raw configuration row; every cell is optional until validated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub text: Option<String>,
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub options: Option<CellValue>,
    pub default: Option<CellValue>,
}

/// A validated row, ready for registration
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDef {
    /// 1-based row in the catalog
    pub row: usize,
    pub text: String,
    pub mode: Mode,
    pub options: usize,
    pub variant: Variant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub target: Option<TargetSection>,
    #[serde(default)]
    pub questions: Vec<QuestionRow>,
}

impl Catalog {
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> HarnessResult<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn target(&self) -> TargetSection {
        self.target.clone().unwrap_or_default()
    }

    /// Validate every row
    pub fn definitions(&self) -> HarnessResult<Vec<QuestionDef>> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, row)| row.validate(i + 1))
            .collect()
    }
}

impl QuestionRow {
    pub fn validate(&self, row: usize) -> HarnessResult<QuestionDef> {
        let err = |reason: String| HarnessError::config(row, reason);

        let text = match self.text.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(err("missing question text".to_string())),
        };
        let mode: Mode = self
            .mode
            .as_deref()
            .ok_or_else(|| err("missing mode".to_string()))?
            .parse()
            .map_err(err)?;
        let kind: QuestionKind = self
            .kind
            .as_deref()
            .ok_or_else(|| err("missing type".to_string()))?
            .parse()
            .map_err(err)?;

        let options = match (&self.options, kind) {
            (Some(cell), _) => match cell.as_integer() {
                Some(n) if n >= 0 => n as usize,
                _ => return Err(err(format!("option count '{}' is not a non-negative integer", cell.render()))),
            },
            (None, QuestionKind::Text) => 0,
            (None, _) => return Err(err("missing option count".to_string())),
        };

        let variant = match &self.default {
            None => Variant::standard(kind),
            Some(cell) if cell.is_sentinel() => Variant::standard(kind),
            Some(cell) => custom_default(kind, cell).map_err(err)?,
        };

        Ok(QuestionDef {
            row,
            text,
            mode,
            options,
            variant,
        })
    }
}

fn custom_default(kind: QuestionKind, cell: &CellValue) -> Result<Variant, String> {
    let index = || match cell.as_integer() {
        Some(n) if n >= 0 => Ok(n as usize),
        _ => Err(format!("default '{}' is not an option index", cell.render())),
    };
    Ok(match kind {
        QuestionKind::Radio => Variant::SingleChoice { default: index()? },
        QuestionKind::Boolean => Variant::Boolean { default: index()? },
        QuestionKind::Dropdown => match index()? {
            0 => return Err("default 0 is the dropdown placeholder".to_string()),
            raw => Variant::Dropdown { default: raw },
        },
        QuestionKind::Checkbox => Variant::MultiSelect {
            defaults: index_list(cell)?,
        },
        QuestionKind::Text => Variant::FreeText { literal: cell.render() },
    })
}

/// Indices separated by commas and/or whitespace; empty tokens are skipped
fn index_list(cell: &CellValue) -> Result<Vec<usize>, String> {
    let tokens: Vec<String> = match cell {
        CellValue::List(items) => items.iter().map(CellValue::render).collect(),
        CellValue::Text(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        other => vec![other.render()],
    };
    if tokens.is_empty() {
        return Err(format!("default '{}' lists no options", cell.render()));
    }
    tokens
        .iter()
        .map(|t| {
            t.trim()
                .parse::<usize>()
                .map_err(|_| format!("default token '{}' is not an option index", t))
        })
        .collect()
}
