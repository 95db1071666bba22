use rand::Rng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::harness::types::{HarnessError, HarnessResult};

/// How a question picks its answer in each run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Enumerate every option across runs (`test` in catalogs)
    #[serde(rename = "test", alias = "exhaustive")]
    Exhaustive,
    /// Uniformly random option each run
    Random,
    /// Always the configured default
    Default,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "test" | "exhaustive" => Ok(Mode::Exhaustive),
            "random" => Ok(Mode::Random),
            "default" => Ok(Mode::Default),
            other => Err(format!("unknown mode '{}' (expected test, random or default)", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Exhaustive => "test",
            Mode::Random => "random",
            Mode::Default => "default",
        })
    }
}

/// Control type of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Radio,
    Boolean,
    Dropdown,
    Checkbox,
    Text,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Radio => "radio",
            QuestionKind::Boolean => "boolean",
            QuestionKind::Dropdown => "dropdown",
            QuestionKind::Checkbox => "checkbox",
            QuestionKind::Text => "text",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "radio" => Ok(QuestionKind::Radio),
            "boolean" => Ok(QuestionKind::Boolean),
            "dropdown" => Ok(QuestionKind::Dropdown),
            "checkbox" => Ok(QuestionKind::Checkbox),
            "text" => Ok(QuestionKind::Text),
            other => Err(format!(
                "unknown question type '{}' (expected dropdown, radio, boolean, checkbox or text)",
                other
            )),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal typed into free-text questions without a configured default
pub const DEFAULT_TEXT_RESPONSE: &str = "123";

/// Kind-specific data, chiefly the default answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Radio list; `default` indexes the rendered options
    SingleChoice { default: usize },
    /// Two-option radio list rendered as toggles
    Boolean { default: usize },
    /// `default` is a raw index, so 0 would be the placeholder
    Dropdown { default: usize },
    /// Every index in `defaults` is clicked, in order
    MultiSelect { defaults: Vec<usize> },
    FreeText { literal: String },
}

impl Variant {
    /// Variant with the built-in default answer
    pub fn standard(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Radio => Variant::SingleChoice { default: 1 },
            QuestionKind::Boolean => Variant::Boolean { default: 1 },
            QuestionKind::Dropdown => Variant::Dropdown { default: 1 },
            QuestionKind::Checkbox => Variant::MultiSelect { defaults: vec![0] },
            QuestionKind::Text => Variant::FreeText {
                literal: DEFAULT_TEXT_RESPONSE.to_string(),
            },
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Variant::SingleChoice { .. } => QuestionKind::Radio,
            Variant::Boolean { .. } => QuestionKind::Boolean,
            Variant::Dropdown { .. } => QuestionKind::Dropdown,
            Variant::MultiSelect { .. } => QuestionKind::Checkbox,
            Variant::FreeText { .. } => QuestionKind::Text,
        }
    }
}

/// What applying one option amounts to, before touching the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Click these raw option indices in order
    Click {
        indices: Vec<usize>,
        /// Exhaustive mode only: whether this was the last rendered option
        last_option: Option<bool>,
    },
    /// Type this literal into the text input
    Type(String),
}

/// A question on the target form, identified by its displayed text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    column: usize,
    mode: Mode,
    declared_options: usize,
    variant: Variant,
    /// Whether the last exhaustive application hit the final rendered option
    last_option: bool,
}

impl Question {
    pub fn new(text: impl Into<String>, column: usize, mode: Mode, declared_options: usize, variant: Variant) -> Self {
        Self {
            text: text.into(),
            column,
            mode,
            declared_options,
            variant,
            last_option: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Output table column
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kind(&self) -> QuestionKind {
        self.variant.kind()
    }

    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Option count declared in the catalog (0 for discovered questions)
    pub fn option_count(&self) -> usize {
        self.declared_options
    }

    pub fn is_exhaustive(&self) -> bool {
        self.mode == Mode::Exhaustive
    }

    /// Whether the most recent exhaustive application selected the final option.
    ///
    /// Stays `true` after [`Question::rearm`] until a run applies the question,
    /// so a question the run never reached ends its enumeration.
    pub fn last_option_reached(&self) -> bool {
        self.last_option
    }

    /// Reset the last-option signal ahead of a run
    pub fn rearm(&mut self) {
        self.last_option = true;
    }

    pub(crate) fn set_last_option(&mut self, last: bool) {
        self.last_option = last;
    }

    /// Decide which raw options to click for `index`, given `live` rendered options.
    ///
    /// `live` counts every rendered entry, including a dropdown's placeholder.
    pub fn select(&self, index: usize, live: usize, rng: &mut dyn RngCore) -> HarnessResult<Selection> {
        // raw index of the first selectable entry
        let first = match self.variant {
            Variant::Dropdown { .. } => 1,
            _ => 0,
        };

        if let Variant::FreeText { literal } = &self.variant {
            return Ok(Selection::Type(literal.clone()));
        }

        let selection = match self.mode {
            Mode::Exhaustive => {
                let raw = index + first;
                Selection::Click {
                    indices: vec![self.check(raw, live)?],
                    last_option: Some(raw + 1 == live),
                }
            }
            Mode::Random => {
                if live <= first {
                    return Err(self.out_of_range(first, live));
                }
                Selection::Click {
                    indices: vec![rng.gen_range(first..live)],
                    last_option: None,
                }
            }
            Mode::Default => {
                let indices = match &self.variant {
                    Variant::SingleChoice { default }
                    | Variant::Boolean { default }
                    | Variant::Dropdown { default } => vec![*default],
                    Variant::MultiSelect { defaults } => defaults.clone(),
                    Variant::FreeText { .. } => Vec::new(),
                };
                for &raw in &indices {
                    self.check(raw, live)?;
                }
                Selection::Click {
                    indices,
                    last_option: None,
                }
            }
        };
        Ok(selection)
    }

    fn check(&self, raw: usize, live: usize) -> HarnessResult<usize> {
        if raw < live {
            Ok(raw)
        } else {
            Err(self.out_of_range(raw, live))
        }
    }

    fn out_of_range(&self, index: usize, available: usize) -> HarnessError {
        HarnessError::OptionOutOfRange {
            question: self.text.clone(),
            index,
            available,
        }
    }
}
