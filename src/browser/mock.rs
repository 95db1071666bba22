//! In-memory questionnaire application for testing without a browser.
//!
//! `MockBrowser` plays both sides: a project page with a launch link, and the
//! flows that link opens in new windows. A flow is a list of pages; each page
//! holds question blocks rendered with the same structure the real target
//! uses (label block, input block, grouped fieldset / select / text input),
//! so the driver exercises exactly the selectors it would use live.
//!
//! Pages without blocks behave as interstitials. Clicking the primary action
//! on the last page moves the window to a completion URL, where the success
//! marker is present if the flow's [`SuccessRule`] holds.
//!
//! A block may stay hidden until another question of the same run has been
//! answered, and a flow may lag behind a page advance: until the enabled
//! primary control has been looked up `render_lag` times, the document still
//! shows the previous page.

use std::collections::HashMap;
use std::time::Duration;

use super::{Browser, BrowserError, BrowserResult, ElementRef};
use crate::harness::types::Selectors;

/// URL of the simulated project page
pub const MOCK_PROJECT_URL: &str = "https://forms.mock/projects";

/// Label rendered as the first entry of every dropdown
pub const MOCK_PLACEHOLDER: &str = "Select...";

const PROJECT_HANDLE: &str = "project";

/// Question catalog matching [`MockFlow::demo`]
pub const DEMO_CATALOG: &str = include_str!("../../demos/benefits_catalog.yaml");

/// Control rendered in a question block
#[derive(Debug, Clone, PartialEq)]
pub enum MockControl {
    Radio(Vec<String>),
    Boolean(Vec<String>),
    Checkbox(Vec<String>),
    /// Options without the placeholder, which is always rendered first
    Dropdown(Vec<String>),
    Text,
}

impl MockControl {
    /// Class attribute of the grouping fieldset, if the control has one
    fn group_class(&self) -> Option<&'static str> {
        match self {
            MockControl::Radio(_) => Some("field-group radio-group"),
            MockControl::Boolean(_) => Some("field-group boolean-group"),
            MockControl::Checkbox(_) => Some("field-group checkbox-group"),
            MockControl::Dropdown(_) | MockControl::Text => None,
        }
    }
}

/// One question on a page
#[derive(Debug, Clone, PartialEq)]
pub struct MockBlock {
    pub label: String,
    pub control: MockControl,
    /// Rendered only once this question has been answered in the run
    pub revealed_by: Option<String>,
}

impl MockBlock {
    pub fn radio(label: &str, options: &[&str]) -> Self {
        Self::new(label, MockControl::Radio(owned(options)))
    }

    pub fn boolean(label: &str) -> Self {
        Self::new(label, MockControl::Boolean(owned(&["Yes", "No"])))
    }

    pub fn checkbox(label: &str, options: &[&str]) -> Self {
        Self::new(label, MockControl::Checkbox(owned(options)))
    }

    pub fn dropdown(label: &str, options: &[&str]) -> Self {
        Self::new(label, MockControl::Dropdown(owned(options)))
    }

    pub fn text(label: &str) -> Self {
        Self::new(label, MockControl::Text)
    }

    pub fn new(label: &str, control: MockControl) -> Self {
        Self {
            label: label.to_string(),
            control,
            revealed_by: None,
        }
    }

    /// Hide the block until `question` has been answered
    pub fn revealed_by(mut self, question: &str) -> Self {
        self.revealed_by = Some(question.to_string());
        self
    }

    /// Option labels as rendered, dropdown placeholder included
    fn rendered_options(&self) -> Vec<String> {
        match &self.control {
            MockControl::Radio(o) | MockControl::Boolean(o) | MockControl::Checkbox(o) => o.clone(),
            MockControl::Dropdown(o) => {
                let mut rendered = vec![MOCK_PLACEHOLDER.to_string()];
                rendered.extend(o.iter().cloned());
                rendered
            }
            MockControl::Text => Vec::new(),
        }
    }
}

/// A page of the flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockPage {
    pub blocks: Vec<MockBlock>,
}

impl MockPage {
    pub fn new(blocks: Vec<MockBlock>) -> Self {
        Self { blocks }
    }

    /// A purely informational page with only a continue button
    pub fn interstitial() -> Self {
        Self::default()
    }
}

/// Decides whether the completion page shows the success marker
#[derive(Debug, Clone, PartialEq)]
pub enum SuccessRule {
    Always,
    Never,
    /// Success when `question` was answered with `answer` during the run
    WhenAnswered { question: String, answer: String },
}

impl SuccessRule {
    fn holds(&self, answers: &[(String, String)]) -> bool {
        match self {
            SuccessRule::Always => true,
            SuccessRule::Never => false,
            SuccessRule::WhenAnswered { question, answer } => answers
                .iter()
                .any(|(q, a)| q == question && a == answer),
        }
    }
}

/// The scripted application behind the launch link
#[derive(Debug, Clone, PartialEq)]
pub struct MockFlow {
    pub pages: Vec<MockPage>,
    pub success: SuccessRule,
    /// Enabled-control lookups before an advanced page replaces the old one
    pub render_lag: usize,
}

impl MockFlow {
    pub fn new(pages: Vec<MockPage>) -> Self {
        Self {
            pages,
            success: SuccessRule::Always,
            render_lag: 0,
        }
    }

    pub fn success(mut self, rule: SuccessRule) -> Self {
        self.success = rule;
        self
    }

    pub fn render_lag(mut self, lookups: usize) -> Self {
        self.render_lag = lookups;
        self
    }

    /// Benefits screener used by the `demo` command; pairs with [`DEMO_CATALOG`]
    pub fn demo() -> Self {
        Self::new(vec![
            MockPage::new(vec![
                MockBlock::boolean("Are you a resident of the state?"),
                MockBlock::dropdown("How many people live in your household?", &["1", "2", "3", "4 or more"]),
            ]),
            MockPage::interstitial(),
            MockPage::new(vec![
                MockBlock::checkbox(
                    "Which programs do you already receive?",
                    &["SNAP", "WIC", "Medicaid", "None of these"],
                ),
                MockBlock::text("What is your zip code?"),
            ]),
            MockPage::new(vec![MockBlock::radio(
                "How did you hear about us?",
                &["A friend", "A clinic", "Online"],
            )]),
        ])
        .success(SuccessRule::WhenAnswered {
            question: "Are you a resident of the state?".to_string(),
            answer: "Yes".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    EntryLink,
    Label { run: usize, page: usize, block: usize },
    LabelText { run: usize, page: usize, block: usize },
    Input { run: usize, page: usize, block: usize },
    Fieldset { run: usize, page: usize, block: usize },
    Select { run: usize, page: usize, block: usize },
    Choice { run: usize, page: usize, block: usize, index: usize },
    TextField { run: usize, page: usize, block: usize },
    Primary { run: usize, page: usize },
    SuccessMarker { run: usize },
}

impl Node {
    fn run(&self) -> Option<usize> {
        match *self {
            Node::EntryLink => None,
            Node::Label { run, .. }
            | Node::LabelText { run, .. }
            | Node::Input { run, .. }
            | Node::Fieldset { run, .. }
            | Node::Select { run, .. }
            | Node::Choice { run, .. }
            | Node::TextField { run, .. }
            | Node::Primary { run, .. }
            | Node::SuccessMarker { run } => Some(run),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Project,
    Flow {
        run: usize,
        page: usize,
        complete: bool,
        /// Lookups left before the page's own markup replaces the previous page
        settling: usize,
    },
}

#[derive(Debug, Clone)]
struct Window {
    handle: String,
    content: Content,
}

/// Simulated browser hosting a project page and the flows it launches
#[derive(Debug, Clone)]
pub struct MockBrowser {
    flow: MockFlow,
    selectors: Selectors,
    nodes: HashMap<usize, Node>,
    next_node: usize,
    windows: Vec<Window>,
    current: Option<String>,
    /// Answers recorded per launched run, in the order they were given
    answers: Vec<Vec<(String, String)>>,
    implicit_waits: Vec<Duration>,
    clicks: usize,
}

impl MockBrowser {
    /// Create a browser focused on the project page
    pub fn new(flow: MockFlow, selectors: Selectors) -> Self {
        Self {
            flow,
            selectors,
            nodes: HashMap::new(),
            next_node: 0,
            windows: vec![Window {
                handle: PROJECT_HANDLE.to_string(),
                content: Content::Project,
            }],
            current: Some(PROJECT_HANDLE.to_string()),
            answers: Vec::new(),
            implicit_waits: Vec::new(),
            clicks: 0,
        }
    }

    /// Number of flows opened through the launch link
    pub fn runs_launched(&self) -> usize {
        self.answers.len()
    }

    /// Answers given during run `run` (1-based)
    pub fn answers(&self, run: usize) -> &[(String, String)] {
        run.checked_sub(1)
            .and_then(|i| self.answers.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every implicit wait the driver configured, in order
    pub fn implicit_waits(&self) -> &[Duration] {
        &self.implicit_waits
    }

    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn clicks(&self) -> usize {
        self.clicks
    }

    /// Element references still resolvable
    pub fn tracked_elements(&self) -> usize {
        self.nodes.len()
    }

    fn register(&mut self, node: Node) -> ElementRef {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, node);
        ElementRef(format!("mock-{}", id))
    }

    fn node(&self, element: &ElementRef) -> BrowserResult<Node> {
        element
            .id()
            .strip_prefix("mock-")
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| self.nodes.get(&i).copied())
            .ok_or_else(|| BrowserError::StaleElement(element.id().to_string()))
    }

    fn window(&self) -> BrowserResult<&Window> {
        let current = self
            .current
            .as_deref()
            .ok_or_else(|| BrowserError::NoSuchWindow("no window has focus".to_string()))?;
        self.windows
            .iter()
            .find(|w| w.handle == current)
            .ok_or_else(|| BrowserError::NoSuchWindow(current.to_string()))
    }

    fn window_mut(&mut self) -> BrowserResult<&mut Window> {
        let current = self
            .current
            .clone()
            .ok_or_else(|| BrowserError::NoSuchWindow("no window has focus".to_string()))?;
        self.windows
            .iter_mut()
            .find(|w| w.handle == current)
            .ok_or(BrowserError::NoSuchWindow(current))
    }

    /// The live (run, page) of the focused window, if it shows a question page
    fn live_page(&self) -> BrowserResult<Option<(usize, usize)>> {
        Ok(match self.window()?.content {
            Content::Flow { run, page, complete: false, .. } => Some((run, page)),
            _ => None,
        })
    }

    /// Resolve a block node, failing if its page is no longer displayed
    fn block(&self, element: &ElementRef, run: usize, page: usize, block: usize) -> BrowserResult<&MockBlock> {
        if self.live_page()? != Some((run, page)) {
            return Err(BrowserError::StaleElement(element.id().to_string()));
        }
        self.flow.pages[page]
            .blocks
            .get(block)
            .ok_or_else(|| BrowserError::StaleElement(element.id().to_string()))
    }

    /// Raw indices of the blocks of `page` currently in the document
    fn visible_blocks(&self, run: usize, page: usize) -> Vec<usize> {
        let answered = self.answers(run);
        self.flow.pages[page]
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| match &b.revealed_by {
                Some(question) => answered.iter().any(|(q, _)| q == question),
                None => true,
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn settle(&mut self) -> BrowserResult<()> {
        if let Content::Flow { settling, .. } = &mut self.window_mut()?.content {
            *settling = settling.saturating_sub(1);
        }
        Ok(())
    }

    fn record_answer(&mut self, run: usize, question: String, answer: String) {
        if let Some(log) = run.checked_sub(1).and_then(|i| self.answers.get_mut(i)) {
            log.push((question, answer));
        }
    }

    fn launch(&mut self) {
        self.answers.push(Vec::new());
        let run = self.answers.len();
        self.windows.push(Window {
            handle: format!("run-{}", run),
            content: Content::Flow {
                run,
                page: 0,
                complete: self.flow.pages.is_empty(),
                settling: 0,
            },
        });
    }

    fn advance(&mut self, element: &ElementRef, run: usize, page: usize) -> BrowserResult<()> {
        if self.live_page()? != Some((run, page)) {
            return Err(BrowserError::StaleElement(element.id().to_string()));
        }
        let last = self.flow.pages.len();
        let lag = self.flow.render_lag;
        if let Content::Flow { page, complete, settling, .. } = &mut self.window_mut()?.content {
            *page += 1;
            *complete = *page >= last;
            *settling = if *complete { 0 } else { lag };
        }
        Ok(())
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Browser for MockBrowser {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        if url != MOCK_PROJECT_URL {
            return Err(BrowserError::Protocol(format!("unknown mock URL: {}", url)));
        }
        self.window_mut()?.content = Content::Project;
        Ok(())
    }

    fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let content = self.window()?.content.clone();
        let nodes: Vec<Node> = match content {
            Content::Project if selector == self.selectors.entry => vec![Node::EntryLink],
            Content::Project => Vec::new(),
            Content::Flow { run, complete: true, .. } => {
                if selector == self.selectors.success_marker
                    && self.flow.success.holds(self.answers(run))
                {
                    vec![Node::SuccessMarker { run }]
                } else {
                    Vec::new()
                }
            }
            Content::Flow { run, page, complete: false, settling } if settling > 0 => {
                // the previous page's markup is still in the document
                if selector == self.selectors.primary_enabled {
                    self.settle()?;
                }
                if selector == self.selectors.question_label && page > 0 {
                    let stale = page - 1;
                    self.visible_blocks(run, stale)
                        .into_iter()
                        .map(|block| Node::Label { run, page: stale, block })
                        .collect()
                } else {
                    Vec::new()
                }
            }
            Content::Flow { run, page, complete: false, .. } => {
                let visible = self.visible_blocks(run, page);
                if selector == self.selectors.question_label {
                    visible.into_iter().map(|block| Node::Label { run, page, block }).collect()
                } else if selector == self.selectors.question_input {
                    visible.into_iter().map(|block| Node::Input { run, page, block }).collect()
                } else if selector == self.selectors.primary_action
                    || selector == self.selectors.primary_enabled
                {
                    vec![Node::Primary { run, page }]
                } else {
                    Vec::new()
                }
            }
        };
        Ok(nodes.into_iter().map(|n| self.register(n)).collect())
    }

    fn find_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let nodes: Vec<Node> = match self.node(parent)? {
            Node::Label { run, page, block } => {
                self.block(parent, run, page, block)?;
                if selector == self.selectors.label_text {
                    vec![Node::LabelText { run, page, block }]
                } else {
                    Vec::new()
                }
            }
            Node::Input { run, page, block } => {
                let control = self.block(parent, run, page, block)?.control.clone();
                let options = |count: usize| -> Vec<Node> {
                    (0..count)
                        .map(|index| Node::Choice { run, page, block, index })
                        .collect()
                };
                let s = &self.selectors;
                match control {
                    _ if selector == s.group && control.group_class().is_some() => {
                        vec![Node::Fieldset { run, page, block }]
                    }
                    MockControl::Radio(o) | MockControl::Checkbox(o) if selector == s.choice_option => {
                        options(o.len())
                    }
                    MockControl::Boolean(o) if selector == s.toggle_option => options(o.len()),
                    MockControl::Dropdown(_) if selector == s.dropdown => {
                        vec![Node::Select { run, page, block }]
                    }
                    MockControl::Dropdown(o) if selector == s.dropdown_option => options(o.len() + 1),
                    MockControl::Text if selector == s.text_input => {
                        vec![Node::TextField { run, page, block }]
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        };
        Ok(nodes.into_iter().map(|n| self.register(n)).collect())
    }

    fn click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        self.clicks += 1;
        match self.node(element)? {
            Node::EntryLink => {
                if self.window()?.content != Content::Project {
                    return Err(BrowserError::StaleElement(element.id().to_string()));
                }
                self.launch();
                Ok(())
            }
            Node::Choice { run, page, block, index } => {
                let block = self.block(element, run, page, block)?;
                if matches!(block.control, MockControl::Dropdown(_)) && index == 0 {
                    return Err(BrowserError::Protocol(
                        "the dropdown placeholder cannot be selected".to_string(),
                    ));
                }
                let question = block.label.clone();
                let answer = block.rendered_options()[index].clone();
                self.record_answer(run, question, answer);
                Ok(())
            }
            Node::Primary { run, page } => self.advance(element, run, page),
            Node::Label { run, page, block }
            | Node::LabelText { run, page, block }
            | Node::Input { run, page, block }
            | Node::Fieldset { run, page, block }
            | Node::Select { run, page, block }
            | Node::TextField { run, page, block } => {
                self.block(element, run, page, block).map(|_| ())
            }
            Node::SuccessMarker { .. } => Ok(()),
        }
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        match self.node(element)? {
            Node::TextField { run, page, block } => {
                let question = self.block(element, run, page, block)?.label.clone();
                self.record_answer(run, question, text.to_string());
                Ok(())
            }
            _ => Err(BrowserError::Protocol(format!(
                "element {} does not accept text",
                element.id()
            ))),
        }
    }

    fn text(&mut self, element: &ElementRef) -> BrowserResult<String> {
        Ok(match self.node(element)? {
            Node::Label { run, page, block } | Node::LabelText { run, page, block } => {
                self.block(element, run, page, block)?.label.clone()
            }
            Node::Choice { run, page, block, index } => {
                self.block(element, run, page, block)?.rendered_options()[index].clone()
            }
            Node::Primary { .. } => "Continue".to_string(),
            Node::SuccessMarker { .. } => "Submitted".to_string(),
            Node::EntryLink => "Open app".to_string(),
            _ => String::new(),
        })
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> BrowserResult<Option<String>> {
        if name != "class" {
            return Ok(None);
        }
        Ok(match self.node(element)? {
            Node::Fieldset { run, page, block } => self
                .block(element, run, page, block)?
                .control
                .group_class()
                .map(str::to_string),
            Node::Primary { .. } => Some("btn-primary".to_string()),
            _ => None,
        })
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        Ok(match self.window()?.content {
            Content::Project => MOCK_PROJECT_URL.to_string(),
            Content::Flow { run, complete: false, .. } => format!("https://forms.mock/run/{}", run),
            Content::Flow { run, complete: true, .. } => {
                format!("https://forms.mock/run/{}/complete", run)
            }
        })
    }

    fn window_handle(&mut self) -> BrowserResult<String> {
        Ok(self.window()?.handle.clone())
    }

    fn window_handles(&mut self) -> BrowserResult<Vec<String>> {
        Ok(self.windows.iter().map(|w| w.handle.clone()).collect())
    }

    fn switch_to_window(&mut self, handle: &str) -> BrowserResult<()> {
        if !self.windows.iter().any(|w| w.handle == handle) {
            return Err(BrowserError::NoSuchWindow(handle.to_string()));
        }
        self.current = Some(handle.to_string());
        Ok(())
    }

    fn close_window(&mut self) -> BrowserResult<()> {
        let window = self.window()?.clone();
        if let Content::Flow { run, .. } = window.content {
            // launch links are single use, so only other runs' elements survive
            self.nodes.retain(|_, node| node.run().is_some_and(|r| r != run));
        }
        let handle = window.handle;
        self.windows.retain(|w| w.handle != handle);
        self.current = None;
        Ok(())
    }

    fn set_implicit_wait(&mut self, wait: Duration) -> BrowserResult<()> {
        self.implicit_waits.push(wait);
        Ok(())
    }
}
