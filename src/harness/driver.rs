//! Page/run driver.
//!
//! One run launches a fresh flow from the project page, answers every block
//! page by page and ends once the flow navigates away from the location it
//! was launched at. The driver owns all sweep state: the registry, planned
//! responses, the output table and the outcome list.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::thread;
use tracing::{debug, info, warn};

use super::planner::RunTarget;
use super::types::{DriverSettings, HarnessError, HarnessResult, Selectors};
use crate::browser::{Browser, BrowserError, ElementRef};
use crate::question::{ApplyContext, BlockStructure, Catalog, QuestionRegistry};
use crate::runner::Outcome;
use crate::table::OutputTable;

/// Address the location a new window holds before it loads
const BLANK_URL: &str = "about:blank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Ended,
}

/// Where the current run is, for error reports
#[derive(Debug, Clone, Default)]
struct Cursor {
    page: usize,
    position: usize,
    question: Option<String>,
}

pub struct FlowDriver<B: Browser> {
    browser: B,
    settings: DriverSettings,
    registry: QuestionRegistry,
    /// Planned option index per exhaustive question
    responses: HashMap<String, usize>,
    table: OutputTable,
    results: Vec<Outcome>,
    rng: StdRng,
    state: RunState,
    runs: usize,
    cursor: Cursor,
}

impl<B: Browser> FlowDriver<B> {
    /// Register the catalog's questions and prepare the output table.
    ///
    /// The browser must already show the project page.
    pub fn new(mut browser: B, settings: DriverSettings, catalog: &Catalog, sheet: &str) -> HarnessResult<Self> {
        let mut registry = QuestionRegistry::new();
        let mut table = OutputTable::new(sheet);
        for def in catalog.definitions()? {
            let question = registry.create_from_config(&def)?;
            table.set_header(question.column(), question.text());
        }
        // row for the first run
        table.push_row();

        browser.set_implicit_wait(settings.implicit_wait)?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(questions = registry.len(), exhaustive = registry.exhaustive().len(), "driver ready");

        Ok(Self {
            browser,
            settings,
            registry,
            responses: HashMap::new(),
            table,
            results: Vec::new(),
            rng,
            state: RunState::NotStarted,
            runs: 0,
            cursor: Cursor::default(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs started so far
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn table(&self) -> &OutputTable {
        &self.table
    }

    pub fn results(&self) -> &[Outcome] {
        &self.results
    }

    pub fn registry(&self) -> &QuestionRegistry {
        &self.registry
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    /// Append the `Results` column for every finished run
    pub fn record_results(&mut self) -> usize {
        self.table.append_results(&self.results)
    }

    pub fn into_parts(self) -> (B, OutputTable, Vec<Outcome>) {
        (self.browser, self.table, self.results)
    }

    /// Execute one full run, wrapping any failure with the position reached
    pub fn run_once(&mut self) -> HarnessResult<Outcome> {
        self.runs += 1;
        self.cursor = Cursor::default();
        self.state = RunState::Running;
        let selectors = self.settings.selectors.clone();

        let result = self
            .launch(&selectors)
            .and_then(|(project, baseline)| {
                self.traverse(&selectors, &baseline)?;
                self.finish(&selectors, &project)
            });

        result.map_err(|source| {
            let cursor = self.cursor.clone();
            warn!(run = self.runs, page = cursor.page, position = cursor.position, error = %source, "run aborted");
            HarnessError::RunAborted {
                run: self.runs,
                page: cursor.page,
                position: cursor.position,
                question: cursor.question.unwrap_or_else(|| "none".to_string()),
                source: Box::new(source),
            }
        })
    }

    /// Open a fresh flow; returns the project window handle and the baseline location
    fn launch(&mut self, selectors: &Selectors) -> HarnessResult<(String, String)> {
        let project = self.browser.window_handle()?;
        let before = self.browser.window_handles()?;

        let entry = self.wait_for(&selectors.entry)?;
        self.browser.click(&entry)?;

        let mut flow = None;
        for attempt in 0..self.settings.wait.attempts.max(1) {
            flow = self.browser.window_handles()?.into_iter().find(|h| !before.contains(h));
            if flow.is_some() {
                break;
            }
            self.pause(attempt);
        }
        let flow = flow.ok_or(HarnessError::NoFlowWindow)?;
        self.browser.switch_to_window(&flow)?;

        let mut baseline = self.browser.current_url()?;
        for attempt in 0..self.settings.wait.attempts {
            if baseline != BLANK_URL {
                break;
            }
            self.pause(attempt);
            baseline = self.browser.current_url()?;
        }
        info!(run = self.runs, window = %flow, baseline = %baseline, "run launched");
        Ok((project, baseline))
    }

    /// Answer pages until the flow leaves the baseline location
    fn traverse(&mut self, selectors: &Selectors, baseline: &str) -> HarnessResult<()> {
        let mut steps = 0;
        while self.browser.current_url()? == baseline {
            let mut blocks = self.probe_all(&selectors.question_label)?.len();
            debug!(page = self.cursor.page, blocks, "page");

            let mut position = 0;
            while position < blocks {
                steps += 1;
                if steps > self.settings.max_steps {
                    return Err(HarnessError::StepLimit(self.settings.max_steps));
                }
                self.cursor.position = position;
                self.cursor.question = None;
                self.answer_block(selectors, position)?;

                // an answer may reveal follow-up blocks
                blocks = self.probe_all(&selectors.question_label)?.len();
                position += 1;
            }

            steps += 1;
            if steps > self.settings.max_steps {
                return Err(HarnessError::StepLimit(self.settings.max_steps));
            }
            self.cursor.question = None;
            self.advance_page(selectors)?;
            self.cursor.page += 1;
            self.cursor.position = 0;
        }
        Ok(())
    }

    /// Resolve the block at `position` and apply its planned response
    fn answer_block(&mut self, selectors: &Selectors, position: usize) -> HarnessResult<()> {
        let text = self.block_text(selectors, position)?;
        self.cursor.question = Some(text.clone());

        if !self.registry.contains(&text) {
            let structure = self.inspect_block(selectors, position)?;
            let question = self.registry.create_from_page(&text, &structure);
            self.table.set_header(question.column(), question.text());
        }

        let index = self.responses.get(&text).copied().unwrap_or(0);
        let question = self.registry.get_mut(&text)?;
        let mut ctx = ApplyContext {
            browser: &mut self.browser,
            selectors,
            table: &mut self.table,
            rng: &mut self.rng,
        };
        question.apply_option(&mut ctx, index, position)?;
        Ok(())
    }

    fn block_text(&mut self, selectors: &Selectors, position: usize) -> HarnessResult<String> {
        let labels = self.browser.find_all(&selectors.question_label)?;
        let label = labels.get(position).ok_or_else(|| {
            BrowserError::NoSuchElement(format!("{} #{}", selectors.question_label, position))
        })?;
        let inner = self.browser.find_within(label, &selectors.label_text)?;
        let text = match inner.first() {
            Some(p) => self.browser.text(p)?,
            None => self.browser.text(label)?,
        };
        Ok(text.trim().to_string())
    }

    /// Read the control structure of an unseen question's input block
    fn inspect_block(&mut self, selectors: &Selectors, position: usize) -> HarnessResult<BlockStructure> {
        let inputs = self.browser.find_all(&selectors.question_input)?;
        let input = inputs.get(position).cloned().ok_or_else(|| {
            BrowserError::NoSuchElement(format!("{} #{}", selectors.question_input, position))
        })?;

        let group = self.probe_within(&input, &selectors.group)?;
        let group_marker = match group.first() {
            Some(fieldset) => Some(self.browser.attribute(fieldset, "class")?.unwrap_or_default()),
            None => None,
        };
        let has_dropdown = !self.probe_within(&input, &selectors.dropdown)?.is_empty();
        Ok(BlockStructure {
            group_marker,
            has_dropdown,
        })
    }

    /// Click the primary action, then through any question-less pages.
    ///
    /// Every click is followed by a wait for the enabled action control, so
    /// the next page has rendered before it is inspected. Stops once blocks
    /// appear, the location changes, or no enabled action control remains.
    fn advance_page(&mut self, selectors: &Selectors) -> HarnessResult<()> {
        let url = self.browser.current_url()?;
        let primary = self.wait_for_action(&selectors.primary_action)?;
        self.browser.click(&primary)?;
        if self.browser.current_url()? != url {
            debug!("flow left the page sequence");
            return Ok(());
        }
        self.wait_for_action(&selectors.primary_enabled)?;

        let mut clicks = 0;
        loop {
            if !self.probe_all(&selectors.question_label)?.is_empty() {
                return Ok(());
            }
            let Some(next) = self.probe_all(&selectors.primary_enabled)?.into_iter().next() else {
                debug!("no enabled action control on question-less page");
                return Ok(());
            };
            clicks += 1;
            if clicks > self.settings.max_interstitial {
                return Err(HarnessError::InterstitialLimit(self.settings.max_interstitial));
            }
            debug!(clicks, "clicking through informational page");
            self.browser.click(&next)?;
            if self.browser.current_url()? != url {
                debug!("flow left the page sequence");
                return Ok(());
            }
            match self.wait_for(&selectors.primary_enabled) {
                Ok(_) => {}
                Err(HarnessError::ElementTimeout { .. }) => {
                    debug!("action control never re-enabled after informational page");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait for an action control; its absence ends the run
    fn wait_for_action(&mut self, selector: &str) -> HarnessResult<ElementRef> {
        match self.wait_for(selector) {
            Err(HarnessError::ElementTimeout { .. }) => Err(HarnessError::ActionControlMissing {
                selector: selector.to_string(),
            }),
            other => other,
        }
    }

    /// Record the outcome, open the next row and return to the project window
    fn finish(&mut self, selectors: &Selectors, project: &str) -> HarnessResult<Outcome> {
        let row = self.table.last_row();
        if let Some(cells) = self.table.row(row) {
            debug!(row, written = cells.iter().flatten().count(), "run row complete");
        }
        self.table.push_row();

        let outcome = if self.probe_all(&selectors.success_marker)?.is_empty() {
            Outcome::Failure
        } else {
            Outcome::Success
        };
        self.results.push(outcome);

        self.browser.close_window()?;
        self.browser.switch_to_window(project)?;
        self.state = RunState::Ended;
        info!(run = self.runs, %outcome, pages = self.cursor.page, "run ended");
        Ok(outcome)
    }

    /// Poll for an element that may not have rendered yet
    fn wait_for(&mut self, selector: &str) -> HarnessResult<ElementRef> {
        let attempts = self.settings.wait.attempts.max(1);
        for attempt in 0..attempts {
            match self.browser.find_all(selector) {
                Ok(found) => {
                    if let Some(first) = found.into_iter().next() {
                        return Ok(first);
                    }
                }
                Err(e) if e.is_absence() => {}
                Err(e) => return Err(e.into()),
            }
            self.pause(attempt);
        }
        Err(HarnessError::ElementTimeout {
            selector: selector.to_string(),
            attempts,
        })
    }

    fn pause(&self, attempt: usize) {
        if attempt + 1 < self.settings.wait.attempts {
            thread::sleep(self.settings.wait.interval);
        }
    }

    /// Lookup under the short probe wait, restoring the regular wait afterwards
    fn probe_all(&mut self, selector: &str) -> HarnessResult<Vec<ElementRef>> {
        self.browser.set_implicit_wait(self.settings.probe_wait)?;
        let found = self.browser.find_all(selector);
        self.browser.set_implicit_wait(self.settings.implicit_wait)?;
        Ok(found?)
    }

    fn probe_within(&mut self, parent: &ElementRef, selector: &str) -> HarnessResult<Vec<ElementRef>> {
        self.browser.set_implicit_wait(self.settings.probe_wait)?;
        let found = self.browser.find_within(parent, selector);
        self.browser.set_implicit_wait(self.settings.implicit_wait)?;
        Ok(found?)
    }
}

impl<B: Browser> RunTarget for FlowDriver<B> {
    fn prepare_option(&mut self, question: &str, index: usize) -> HarnessResult<()> {
        self.registry.get_mut(question)?.rearm();
        self.responses.insert(question.to_string(), index);
        Ok(())
    }

    fn execute_run(&mut self) -> HarnessResult<Outcome> {
        self.run_once()
    }

    fn last_option_reached(&self, question: &str) -> HarnessResult<bool> {
        Ok(self.registry.get(question)?.last_option_reached())
    }

    fn declared_options(&self, question: &str) -> HarnessResult<usize> {
        Ok(self.registry.get(question)?.option_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MockBlock, MockBrowser, MockFlow, MockPage, SuccessRule};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const CATALOG: &str = r#"
questions:
  - { text: "Resident?", mode: test, type: boolean, options: 2, default: -1 }
  - { text: "Zip?", mode: default, type: text, options: 0, default: "94110" }
"#;

    fn driver(flow: MockFlow, catalog: &str) -> FlowDriver<MockBrowser> {
        let settings = DriverSettings::immediate().seed(3);
        let browser = MockBrowser::new(flow, settings.selectors.clone());
        FlowDriver::new(browser, settings, &Catalog::from_yaml(catalog).unwrap(), "Sweep").unwrap()
    }

    fn basic_flow() -> MockFlow {
        MockFlow::new(vec![MockPage::new(vec![
            MockBlock::boolean("Resident?"),
            MockBlock::text("Zip?"),
        ])])
    }

    #[test]
    fn test_single_run_answers_and_returns_to_project() {
        let mut d = driver(basic_flow(), CATALOG);
        assert_eq!(d.state(), RunState::NotStarted);

        d.prepare_option("Resident?", 0).unwrap();
        let outcome = d.run_once().unwrap();

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(d.state(), RunState::Ended);
        assert_eq!(d.table().cell(1, 0), Some("Yes"));
        assert_eq!(d.table().cell(1, 1), Some("94110"));
        assert_eq!(d.table().row_count(), 3);
        assert!(!d.last_option_reached("Resident?").unwrap());
        assert_eq!(d.browser().open_windows(), 1);
        assert_eq!(d.browser_mut().window_handle().unwrap(), "project");
    }

    #[test]
    fn test_unseen_question_is_discovered() {
        let flow = MockFlow::new(vec![
            MockPage::new(vec![MockBlock::boolean("Resident?")]),
            MockPage::new(vec![
                MockBlock::dropdown("Household", &["1", "2", "3"]),
                MockBlock::radio("Color", &["Red", "Green", "Blue"]),
            ]),
        ]);
        let mut d = driver(flow, CATALOG);
        d.run_once().unwrap();

        assert_eq!(d.table().headers(), vec!["Resident?", "Zip?", "Household", "Color"]);
        // built-in defaults: first real dropdown entry, radio index 1
        assert_eq!(d.table().cell(1, 2), Some("1"));
        assert_eq!(d.table().cell(1, 3), Some("Green"));
        assert_eq!(d.table().cell(1, 1), None);
    }

    #[test]
    fn test_interstitial_pages_are_clicked_through() {
        let flow = MockFlow::new(vec![
            MockPage::interstitial(),
            MockPage::new(vec![MockBlock::boolean("Resident?")]),
            MockPage::interstitial(),
            MockPage::interstitial(),
            MockPage::new(vec![MockBlock::text("Zip?")]),
        ]);
        let mut d = driver(flow, CATALOG);
        assert_eq!(d.run_once().unwrap(), Outcome::Success);
        assert_eq!(d.browser().answers(1).len(), 2);
    }

    #[test]
    fn test_interstitial_limit_is_fatal() {
        let mut pages = vec![MockPage::new(vec![MockBlock::boolean("Resident?")])];
        pages.extend(std::iter::repeat_n(MockPage::interstitial(), 6));
        pages.push(MockPage::new(vec![MockBlock::text("Zip?")]));

        let settings = DriverSettings::immediate().max_interstitial(3);
        let browser = MockBrowser::new(MockFlow::new(pages), settings.selectors.clone());
        let mut d = FlowDriver::new(browser, settings, &Catalog::from_yaml(CATALOG).unwrap(), "Sweep").unwrap();

        let err = d.run_once().unwrap_err();
        match err {
            HarnessError::RunAborted { run, page, source, .. } => {
                assert_eq!(run, 1);
                assert_eq!(page, 0);
                assert!(matches!(*source, HarnessError::InterstitialLimit(3)));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_failure_outcome_without_success_marker() {
        let mut d = driver(basic_flow().success(SuccessRule::Never), CATALOG);
        assert_eq!(d.run_once().unwrap(), Outcome::Failure);
        assert_eq!(d.results(), &[Outcome::Failure]);
    }

    #[test]
    fn test_out_of_range_plan_aborts_with_context() {
        let mut d = driver(basic_flow(), CATALOG);
        d.prepare_option("Resident?", 2).unwrap();
        let err = d.run_once().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("run 1 aborted on page 0, position 0"));
        assert!(message.contains("Resident?"));
    }

    #[test]
    fn test_probe_wait_is_restored() {
        let mut d = driver(basic_flow(), CATALOG);
        d.run_once().unwrap();
        let waits = d.browser().implicit_waits();
        assert!(!waits.is_empty());
        assert_eq!(waits.last(), Some(&Duration::ZERO));
        assert_eq!(waits.len() % 2, 1);
    }

    #[test]
    fn test_unknown_planned_question() {
        let mut d = driver(basic_flow(), CATALOG);
        assert!(matches!(
            d.prepare_option("Missing", 0),
            Err(HarnessError::UnknownQuestion(_))
        ));
    }

    #[test]
    fn test_follow_up_question_is_answered_on_same_page() {
        let flow = MockFlow::new(vec![MockPage::new(vec![
            MockBlock::boolean("Resident?"),
            MockBlock::text("Zip?").revealed_by("Resident?"),
        ])]);
        let mut d = driver(flow, CATALOG);
        d.run_once().unwrap();

        assert_eq!(
            d.browser().answers(1),
            &[
                ("Resident?".to_string(), "Yes".to_string()),
                ("Zip?".to_string(), "94110".to_string()),
            ]
        );
        assert_eq!(d.table().cell(1, 1), Some("94110"));
    }

    #[test]
    fn test_follow_up_discovered_question_gets_a_column() {
        let flow = MockFlow::new(vec![MockPage::new(vec![
            MockBlock::boolean("Resident?"),
            MockBlock::radio("County", &["North", "South"]).revealed_by("Resident?"),
        ])]);
        let mut d = driver(flow, CATALOG);
        d.run_once().unwrap();

        assert_eq!(d.table().headers(), vec!["Resident?", "Zip?", "County"]);
        assert_eq!(d.table().cell(1, 2), Some("South"));
    }

    #[test]
    fn test_advance_waits_for_next_page_to_render() {
        let flow = MockFlow::new(vec![
            MockPage::new(vec![MockBlock::boolean("Resident?")]),
            MockPage::interstitial(),
            MockPage::new(vec![MockBlock::text("Zip?")]),
        ])
        .render_lag(2);
        let mut d = driver(flow, CATALOG);

        assert_eq!(d.run_once().unwrap(), Outcome::Success);
        assert_eq!(
            d.browser().answers(1),
            &[
                ("Resident?".to_string(), "Yes".to_string()),
                ("Zip?".to_string(), "94110".to_string()),
            ]
        );
        assert_eq!(d.table().cell(1, 1), Some("94110"));
    }

    #[test]
    fn test_page_that_never_renders_is_fatal() {
        let flow = MockFlow::new(vec![
            MockPage::new(vec![MockBlock::boolean("Resident?")]),
            MockPage::new(vec![MockBlock::text("Zip?")]),
        ])
        .render_lag(10);
        let mut d = driver(flow, CATALOG);

        match d.run_once() {
            Err(HarnessError::RunAborted { source, .. }) => match *source {
                HarnessError::ActionControlMissing { selector } => {
                    assert_eq!(selector, Selectors::default().primary_enabled);
                }
                other => panic!("unexpected cause {:?}", other),
            },
            other => panic!("expected an aborted run, got {:?}", other.map(|o| o.to_string())),
        }
    }

    #[test]
    fn test_closed_runs_release_mock_elements() {
        let mut d = driver(basic_flow(), CATALOG);
        d.run_once().unwrap();
        d.run_once().unwrap();
        assert_eq!(d.browser().tracked_elements(), 0);
    }
}
