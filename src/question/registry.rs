//! Question registry and page-structure classifier.

use std::collections::HashMap;
use tracing::info;

use super::catalog::QuestionDef;
use super::types::{Mode, Question, QuestionKind, Variant};
use crate::harness::types::{HarnessError, HarnessResult};

/// Control structure observed in a question's input block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStructure {
    /// Class attribute of the grouping element, if the block has one
    pub group_marker: Option<String>,

    /// Whether the block holds a collapsible dropdown control
    pub has_dropdown: bool,
}

impl BlockStructure {
    pub fn grouped(marker: &str) -> Self {
        Self {
            group_marker: Some(marker.to_string()),
            has_dropdown: false,
        }
    }

    pub fn dropdown() -> Self {
        Self {
            group_marker: None,
            has_dropdown: true,
        }
    }

    fn marker_contains(&self, needle: &str) -> bool {
        self.group_marker.as_deref().is_some_and(|m| m.contains(needle))
    }
}

/// One classification rule; rules are evaluated top to bottom
#[derive(Debug, Clone, Copy)]
pub struct ClassRule {
    pub name: &'static str,
    pub matches: fn(&BlockStructure) -> bool,
    pub kind: QuestionKind,
}

fn radio_marker(s: &BlockStructure) -> bool {
    s.marker_contains("radio")
}

fn boolean_marker(s: &BlockStructure) -> bool {
    s.marker_contains("boolean")
}

fn any_group(s: &BlockStructure) -> bool {
    s.group_marker.is_some()
}

fn dropdown_control(s: &BlockStructure) -> bool {
    s.has_dropdown
}

fn anything(_: &BlockStructure) -> bool {
    true
}

/// Ordered rules for questions discovered on a live page.
///
/// Boolean groups are grouped controls too, so the boolean rule must stay
/// above the generic grouping rule.
pub const CLASSIFICATION_RULES: &[ClassRule] = &[
    ClassRule {
        name: "radio-group",
        matches: radio_marker,
        kind: QuestionKind::Radio,
    },
    ClassRule {
        name: "boolean-group",
        matches: boolean_marker,
        kind: QuestionKind::Boolean,
    },
    ClassRule {
        name: "grouped",
        matches: any_group,
        kind: QuestionKind::Checkbox,
    },
    ClassRule {
        name: "dropdown",
        matches: dropdown_control,
        kind: QuestionKind::Dropdown,
    },
    ClassRule {
        name: "free-text",
        matches: anything,
        kind: QuestionKind::Text,
    },
];

/// Kind of an unseen question, falling back to free text
pub fn classify(structure: &BlockStructure) -> QuestionKind {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(structure))
        .map(|rule| rule.kind)
        .unwrap_or(QuestionKind::Text)
}

/// Questions keyed by their displayed text; column = registration order
#[derive(Debug, Clone, Default)]
pub struct QuestionRegistry {
    questions: Vec<Question>,
    index: HashMap<String, usize>,
}

impl QuestionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions in column order
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    pub fn get(&self, text: &str) -> HarnessResult<&Question> {
        self.index
            .get(text)
            .map(|&i| &self.questions[i])
            .ok_or_else(|| HarnessError::UnknownQuestion(text.to_string()))
    }

    pub fn get_mut(&mut self, text: &str) -> HarnessResult<&mut Question> {
        match self.index.get(text) {
            Some(&i) => Ok(&mut self.questions[i]),
            None => Err(HarnessError::UnknownQuestion(text.to_string())),
        }
    }

    /// Register a catalog question in the next column
    pub fn create_from_config(&mut self, def: &QuestionDef) -> HarnessResult<&Question> {
        if self.contains(&def.text) {
            return Err(HarnessError::config(
                def.row,
                format!("duplicate question '{}'", def.text),
            ));
        }
        let column = self.insert(Question::new(
            def.text.clone(),
            self.len(),
            def.mode,
            def.options,
            def.variant.clone(),
        ));
        Ok(&self.questions[column])
    }

    /// Register a question first seen on a live page.
    ///
    /// Discovered questions answer with their built-in default and declare no
    /// options; their option set is read from the page. Returns the existing
    /// question if `text` is already known.
    pub fn create_from_page(&mut self, text: &str, structure: &BlockStructure) -> &mut Question {
        let column = match self.index.get(text) {
            Some(&i) => i,
            None => {
                let kind = classify(structure);
                info!(question = %text, kind = %kind, column = self.len(), "discovered question");
                self.insert(Question::new(text, self.len(), Mode::Default, 0, Variant::standard(kind)))
            }
        };
        &mut self.questions[column]
    }

    /// Texts of the exhaustive questions, in column order
    pub fn exhaustive(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter(|q| q.is_exhaustive())
            .map(|q| q.text().to_string())
            .collect()
    }

    fn insert(&mut self, question: Question) -> usize {
        let column = self.questions.len();
        self.index.insert(question.text().to_string(), column);
        self.questions.push(question);
        column
    }
}
