//! Questions on the target form: answer selection, registry and catalog.

pub mod apply;
pub mod catalog;
pub mod registry;
pub mod types;

pub use apply::ApplyContext;
pub use catalog::{Catalog, CellValue, QuestionDef, QuestionRow, TargetSection};
pub use registry::{BlockStructure, CLASSIFICATION_RULES, ClassRule, QuestionRegistry, classify};
pub use types::{DEFAULT_TEXT_RESPONSE, Mode, Question, QuestionKind, Selection, Variant};
