//! Applying a question's selection to the live page.

use rand::RngCore;
use tracing::debug;

use super::types::{Question, QuestionKind, Selection};
use crate::browser::{Browser, BrowserError, ElementRef};
use crate::harness::types::{HarnessResult, Selectors};
use crate::table::OutputTable;

/// Everything a question needs to answer itself during a run
pub struct ApplyContext<'a> {
    pub browser: &'a mut dyn Browser,
    pub selectors: &'a Selectors,
    pub table: &'a mut OutputTable,
    pub rng: &'a mut dyn RngCore,
}

impl Question {
    /// Select option `index` of the block at page position `position`.
    ///
    /// Records the chosen label(s) in the current table row at this question's
    /// column and returns the recorded value. Multi-select labels are joined
    /// with `", "`. Free-text questions ignore `index` and type their literal.
    pub fn apply_option(&mut self, ctx: &mut ApplyContext<'_>, index: usize, position: usize) -> HarnessResult<String> {
        let block = input_block(ctx, position)?;

        if self.kind() == QuestionKind::Text {
            if let Selection::Type(literal) = self.select(index, 0, ctx.rng)? {
                let field = ctx.browser.find_one_within(&block, &ctx.selectors.text_input)?;
                ctx.table.set_current(self.column(), literal.clone());
                ctx.browser.send_keys(&field, &literal)?;
                debug!(question = %self.text(), value = %literal, "typed free text");
                return Ok(literal);
            }
        }

        if self.kind() == QuestionKind::Dropdown {
            let control = ctx.browser.find_one_within(&block, &ctx.selectors.dropdown)?;
            ctx.browser.click(&control)?;
        }

        let options = ctx.browser.find_within(&block, option_selector(ctx.selectors, self.kind()))?;
        let (indices, last_option) = match self.select(index, options.len(), ctx.rng)? {
            Selection::Click { indices, last_option } => (indices, last_option),
            Selection::Type(_) => (Vec::new(), None),
        };

        let mut labels = Vec::with_capacity(indices.len());
        for &raw in &indices {
            labels.push(ctx.browser.text(&options[raw])?);
        }
        let value = labels.join(", ");
        ctx.table.set_current(self.column(), value.clone());

        for &raw in &indices {
            if self.kind() == QuestionKind::Checkbox {
                ctx.browser.script_click(&options[raw])?;
            } else {
                ctx.browser.click(&options[raw])?;
            }
        }

        if let Some(last) = last_option {
            self.set_last_option(last);
        }
        debug!(
            question = %self.text(),
            mode = %self.mode(),
            index,
            rendered = options.len(),
            value = %value,
            "applied option"
        );
        Ok(value)
    }
}

/// Input block at `position` among the blocks on the current page
fn input_block(ctx: &mut ApplyContext<'_>, position: usize) -> HarnessResult<ElementRef> {
    let selector = &ctx.selectors.question_input;
    ctx.browser
        .find_all(selector)?
        .into_iter()
        .nth(position)
        .ok_or_else(|| BrowserError::NoSuchElement(format!("{} #{}", selector, position)).into())
}

fn option_selector(selectors: &Selectors, kind: QuestionKind) -> &str {
    match kind {
        QuestionKind::Boolean => &selectors.toggle_option,
        QuestionKind::Dropdown => &selectors.dropdown_option,
        QuestionKind::Radio | QuestionKind::Checkbox | QuestionKind::Text => &selectors.choice_option,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockBlock, MockBrowser, MockFlow, MockPage};
    use crate::question::types::{Mode, Variant};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Browser sitting on the first page of a freshly launched flow
    fn open(blocks: Vec<MockBlock>) -> MockBrowser {
        let selectors = Selectors::default();
        let mut browser = MockBrowser::new(MockFlow::new(vec![MockPage::new(blocks)]), selectors.clone());
        let entry = browser.find_one(&selectors.entry).unwrap();
        browser.click(&entry).unwrap();
        browser.switch_to_window("run-1").unwrap();
        browser
    }

    fn apply(browser: &mut MockBrowser, table: &mut OutputTable, q: &mut Question, index: usize, position: usize) -> HarnessResult<String> {
        let selectors = Selectors::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = ApplyContext {
            browser,
            selectors: &selectors,
            table,
            rng: &mut rng,
        };
        q.apply_option(&mut ctx, index, position)
    }

    #[test]
    fn test_multi_select_default_concatenates_labels() {
        let mut browser = open(vec![MockBlock::checkbox("Programs", &["SNAP", "WIC", "Medicaid"])]);
        let mut table = OutputTable::new("t");
        table.push_row();
        let mut q = Question::new("Programs", 0, Mode::Default, 3, Variant::MultiSelect { defaults: vec![0, 2] });

        let value = apply(&mut browser, &mut table, &mut q, 0, 0).unwrap();

        assert_eq!(value, "SNAP, Medicaid");
        assert_eq!(table.cell(1, 0), Some("SNAP, Medicaid"));
        assert_eq!(
            browser.answers(1),
            &[
                ("Programs".to_string(), "SNAP".to_string()),
                ("Programs".to_string(), "Medicaid".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropdown_exhaustive_zero_selects_first_real_entry() {
        let mut browser = open(vec![
            MockBlock::boolean("Resident?"),
            MockBlock::dropdown("Household", &["1", "2"]),
        ]);
        let mut table = OutputTable::new("t");
        table.push_row();
        let mut q = Question::new("Household", 3, Mode::Exhaustive, 2, Variant::standard(QuestionKind::Dropdown));

        assert_eq!(apply(&mut browser, &mut table, &mut q, 0, 1).unwrap(), "1");
        assert!(!q.last_option_reached());
        assert_eq!(table.cell(1, 3), Some("1"));

        assert_eq!(apply(&mut browser, &mut table, &mut q, 1, 1).unwrap(), "2");
        assert!(q.last_option_reached());
    }

    #[test]
    fn test_free_text_types_literal() {
        let mut browser = open(vec![MockBlock::text("Zip")]);
        let mut table = OutputTable::new("t");
        table.push_row();
        let mut q = Question::new("Zip", 0, Mode::Exhaustive, 0, Variant::FreeText { literal: "94110".to_string() });

        assert_eq!(apply(&mut browser, &mut table, &mut q, 5, 0).unwrap(), "94110");
        assert_eq!(browser.answers(1), &[("Zip".to_string(), "94110".to_string())]);
    }

    #[test]
    fn test_exhaustive_index_beyond_rendered_options_fails() {
        let mut browser = open(vec![MockBlock::radio("Color", &["Red", "Blue"])]);
        let mut table = OutputTable::new("t");
        table.push_row();
        let mut q = Question::new("Color", 0, Mode::Exhaustive, 5, Variant::standard(QuestionKind::Radio));

        let err = apply(&mut browser, &mut table, &mut q, 2, 0).unwrap_err();
        assert!(matches!(err, crate::harness::types::HarnessError::OptionOutOfRange { available: 2, .. }));
        assert_eq!(table.cell(1, 0), None);
    }

    #[test]
    fn test_missing_block_position_is_reported() {
        let mut browser = open(vec![MockBlock::radio("Color", &["Red", "Blue"])]);
        let mut table = OutputTable::new("t");
        let mut q = Question::new("Color", 0, Mode::Default, 2, Variant::standard(QuestionKind::Radio));

        let err = apply(&mut browser, &mut table, &mut q, 0, 4).unwrap_err();
        assert!(err.to_string().contains("#4"));
    }
}
