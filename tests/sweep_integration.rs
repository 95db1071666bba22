//! End-to-end sweeps against the in-memory questionnaire

use pretty_assertions::assert_eq;
use std::time::Duration;

use form_sweep::browser::mock::{DEMO_CATALOG, MOCK_PROJECT_URL};
use form_sweep::browser::{
    Browser, BrowserResult, ElementRef, MockBlock, MockBrowser, MockFlow, MockPage, SuccessRule,
};
use form_sweep::harness::{DriverSettings, FlowDriver, HarnessError, Selectors, run_sweep};
use form_sweep::question::Catalog;
use form_sweep::runner::Outcome;
use form_sweep::session::Session;
use form_sweep::table::{OutputTable, RESULTS_HEADER};

fn sweep_driver<B: Browser>(mut browser: B, settings: DriverSettings, catalog: &str) -> FlowDriver<B> {
    browser.navigate(MOCK_PROJECT_URL).expect("project page");
    let catalog = Catalog::from_yaml(catalog).expect("catalog parses");
    FlowDriver::new(browser, settings, &catalog, "Sweep").expect("driver")
}

fn mock(flow: MockFlow, settings: &DriverSettings) -> MockBrowser {
    MockBrowser::new(flow, settings.selectors.clone())
}

const RESIDENT_AND_ZIP: &str = r#"
questions:
  - { text: "Are you a resident?", mode: test, type: boolean, options: 2, default: -1 }
  - { text: "Zip code", mode: default, type: text, options: 0, default: "94110" }
"#;

fn resident_flow() -> MockFlow {
    MockFlow::new(vec![MockPage::new(vec![
        MockBlock::boolean("Are you a resident?"),
        MockBlock::text("Zip code"),
    ])])
    .success(SuccessRule::WhenAnswered {
        question: "Are you a resident?".to_string(),
        answer: "Yes".to_string(),
    })
}

#[test]
fn test_boolean_and_text_sweep_runs_twice() {
    let settings = DriverSettings::immediate();
    let mut driver = sweep_driver(mock(resident_flow(), &settings), settings, RESIDENT_AND_ZIP);

    let report = run_sweep(&mut driver);

    assert!(report.completed, "sweep failed: {:?}", report.error);
    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.exhaustive, vec!["Are you a resident?".to_string()]);

    let table = driver.table();
    // header + 2 data rows + trailing row
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.headers(), vec!["Are you a resident?", "Zip code", RESULTS_HEADER]);
    assert_eq!(table.cell(1, 0), Some("Yes"));
    assert_eq!(table.cell(2, 0), Some("No"));
    assert_eq!(table.cell(1, 1), Some("94110"));
    assert_eq!(table.cell(2, 1), Some("94110"));
    assert_eq!(table.cell(1, 2), Some("Success"));
    assert_eq!(table.cell(2, 2), Some("Failure"));
    assert_eq!(table.cell(3, 0), None);
    assert_eq!(driver.results(), &[Outcome::Success, Outcome::Failure]);
}

#[test]
fn test_demo_screener_enumerates_cross_product() {
    let settings = DriverSettings::immediate().seed(11);
    let mut driver = sweep_driver(mock(MockFlow::demo(), &settings), settings, DEMO_CATALOG);

    let report = run_sweep(&mut driver);
    assert!(report.completed, "sweep failed: {:?}", report.error);

    let combos: Vec<Vec<usize>> = report.runs.iter().map(|r| r.combination.clone()).collect();
    let mut expected = Vec::new();
    for resident in 0..2 {
        for household in 0..4 {
            expected.push(vec![resident, household]);
        }
    }
    assert_eq!(combos, expected);
    assert_eq!(report.successes(), 4);

    let table = driver.table();
    assert_eq!(table.row_count(), 8 + 2);
    assert_eq!(
        table.headers(),
        vec![
            "Are you a resident of the state?",
            "How many people live in your household?",
            "Which programs do you already receive?",
            "What is your zip code?",
            "How did you hear about us?",
            RESULTS_HEADER,
        ]
    );
    let households: Vec<&str> = (1..=8).filter_map(|r| table.cell(r, 1)).collect();
    assert_eq!(households, vec!["1", "2", "3", "4 or more", "1", "2", "3", "4 or more"]);
    assert_eq!(table.cell(5, 2), Some("SNAP, Medicaid"));
    assert_eq!(table.cell(8, 4), Some("A clinic"));

    assert_eq!(driver.browser().runs_launched(), 8);
    assert_eq!(driver.browser().open_windows(), 1);
}

#[test]
fn test_rendered_options_override_declared_count() {
    let catalog = r#"
questions:
  - { text: "Household", mode: test, type: dropdown, options: 5, default: -1 }
"#;
    let flow = MockFlow::new(vec![MockPage::new(vec![MockBlock::dropdown("Household", &["1", "2", "3"])])]);
    let settings = DriverSettings::immediate();
    let mut driver = sweep_driver(mock(flow, &settings), settings, catalog);

    let report = run_sweep(&mut driver);
    assert!(report.completed);
    assert_eq!(report.runs.len(), 3);
    assert_eq!(driver.table().cell(3, 0), Some("3"));
}

#[test]
fn test_no_exhaustive_questions_means_one_run() {
    let catalog = r#"
questions:
  - { text: "Color", mode: random, type: radio, options: 3, default: -1 }
"#;
    let flow = MockFlow::new(vec![MockPage::new(vec![MockBlock::radio("Color", &["Red", "Green", "Blue"])])]);
    let settings = DriverSettings::immediate().seed(5);
    let mut driver = sweep_driver(mock(flow, &settings), settings, catalog);

    let report = run_sweep(&mut driver);
    assert!(report.completed);
    assert_eq!(report.runs.len(), 1);
    assert!(report.runs[0].combination.is_empty());
    assert!(["Red", "Green", "Blue"].contains(&driver.table().cell(1, 0).unwrap_or("")));
}

#[test]
fn test_seeded_random_sweeps_are_reproducible() {
    let catalog = r#"
questions:
  - { text: "Resident?", mode: test, type: boolean, options: 2, default: -1 }
  - { text: "Color", mode: random, type: radio, options: 3, default: -1 }
  - { text: "Size", mode: random, type: dropdown, options: 4, default: -1 }
"#;
    let flow = || {
        MockFlow::new(vec![MockPage::new(vec![
            MockBlock::boolean("Resident?"),
            MockBlock::radio("Color", &["Red", "Green", "Blue"]),
            MockBlock::dropdown("Size", &["S", "M", "L", "XL"]),
        ])])
    };

    let tables: Vec<OutputTable> = (0..2)
        .map(|_| {
            let settings = DriverSettings::immediate().seed(99);
            let mut driver = sweep_driver(mock(flow(), &settings), settings, catalog);
            assert!(run_sweep(&mut driver).completed);
            driver.into_parts().1
        })
        .collect();
    assert_eq!(tables[0], tables[1]);
}

/// Mock whose flow loses its continue button after a number of runs
struct BrokenAfter {
    inner: MockBrowser,
    healthy_runs: usize,
    primary: String,
}

impl Browser for BrokenAfter {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.inner.navigate(url)
    }

    fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        if selector == self.primary && self.inner.runs_launched() > self.healthy_runs {
            return Ok(Vec::new());
        }
        self.inner.find_all(selector)
    }

    fn find_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        self.inner.find_within(parent, selector)
    }

    fn click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        self.inner.click(element)
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        self.inner.send_keys(element, text)
    }

    fn text(&mut self, element: &ElementRef) -> BrowserResult<String> {
        self.inner.text(element)
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> BrowserResult<Option<String>> {
        self.inner.attribute(element, name)
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        self.inner.current_url()
    }

    fn window_handle(&mut self) -> BrowserResult<String> {
        self.inner.window_handle()
    }

    fn window_handles(&mut self) -> BrowserResult<Vec<String>> {
        self.inner.window_handles()
    }

    fn switch_to_window(&mut self, handle: &str) -> BrowserResult<()> {
        self.inner.switch_to_window(handle)
    }

    fn close_window(&mut self) -> BrowserResult<()> {
        self.inner.close_window()
    }

    fn set_implicit_wait(&mut self, wait: Duration) -> BrowserResult<()> {
        self.inner.set_implicit_wait(wait)
    }
}

#[test]
fn test_fatal_error_preserves_partial_output() {
    let catalog = r#"
questions:
  - { text: "Color", mode: test, type: radio, options: 3, default: -1 }
  - { text: "Zip code", mode: default, type: text, options: 0, default: "94110" }
"#;
    let flow = MockFlow::new(vec![MockPage::new(vec![
        MockBlock::radio("Color", &["Red", "Green", "Blue"]),
        MockBlock::text("Zip code"),
    ])]);
    let settings = DriverSettings::immediate();
    let selectors = Selectors::default();
    let browser = BrokenAfter {
        inner: mock(flow, &settings),
        healthy_runs: 2,
        primary: selectors.primary_action.clone(),
    };
    let mut driver = sweep_driver(browser, settings, catalog);

    let report = run_sweep(&mut driver);

    assert!(!report.completed);
    assert_eq!(report.runs.len(), 2);
    let error = report.error.clone().unwrap_or_default();
    assert!(error.contains("run 3 aborted on page 0, position 1"), "{}", error);
    assert!(error.contains(".btn-primary"), "{}", error);

    let table = driver.table();
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.cell(1, 2), Some("Success"));
    assert_eq!(table.cell(2, 2), Some("Success"));
    // the aborted run's answers stay, without an outcome
    assert_eq!(table.cell(3, 0), Some("Blue"));
    assert_eq!(table.cell(3, 2), None);

    let dir = tempfile::tempdir().unwrap();
    let session = Session::in_dir(dir.path().join("aborted"));
    session.init(None).unwrap();
    session.save(table, &report).unwrap();
    assert_eq!(&OutputTable::load(&session.table_path()).unwrap(), table);
}

#[test]
fn test_driver_error_type_for_direct_runs() {
    let settings = DriverSettings::immediate();
    let browser = BrokenAfter {
        inner: mock(resident_flow(), &settings),
        healthy_runs: 0,
        primary: settings.selectors.primary_action.clone(),
    };
    let mut driver = sweep_driver(browser, settings, RESIDENT_AND_ZIP);

    match driver.run_once() {
        Err(HarnessError::RunAborted { run: 1, source, .. }) => {
            assert!(matches!(*source, HarnessError::ActionControlMissing { .. }));
        }
        other => panic!("expected an aborted run, got {:?}", other.map(|o| o.to_string())),
    }
}
