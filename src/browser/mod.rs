//! Browser automation surface consumed by the sweep engine.
//!
//! The engine never talks to a browser directly. Everything goes through the
//! [`Browser`] trait:
//! - [`WebDriverBrowser`] speaks the W3C WebDriver protocol over HTTP
//! - [`MockBrowser`] simulates a questionnaire application in memory

pub mod mock;
pub mod webdriver;

use std::time::Duration;

use thiserror::Error;

pub use mock::{MockBlock, MockBrowser, MockControl, MockFlow, MockPage, SuccessRule};
pub use webdriver::{WebDriverBrowser, WebDriverConfig};

/// Opaque handle to an element in the live page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors reported by a browser backend
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("no element matches '{0}'")]
    NoSuchElement(String),

    #[error("element {0} is no longer attached to the page")]
    StaleElement(String),

    #[error("no such window: {0}")]
    NoSuchWindow(String),

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrowserError {
    /// Whether the error means "not rendered (yet)" rather than a broken session
    pub fn is_absence(&self) -> bool {
        matches!(self, BrowserError::NoSuchElement(_) | BrowserError::StaleElement(_))
    }
}

/// Element lookup, interaction and window management.
///
/// Selectors are CSS selector strings. `find_all` returns an empty list when
/// nothing matches within the implicit wait; `find_one` turns that into
/// [`BrowserError::NoSuchElement`].
pub trait Browser {
    /// Load a URL in the current window
    fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// All elements matching `selector`, in document order
    fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementRef>>;

    /// All descendants of `parent` matching `selector`, in document order
    fn find_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>>;

    fn click(&mut self, element: &ElementRef) -> BrowserResult<()>;

    /// Click through a page script, bypassing overlays that swallow real clicks
    fn script_click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        self.click(element)
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> BrowserResult<()>;

    /// Visible text of an element
    fn text(&mut self, element: &ElementRef) -> BrowserResult<String>;

    fn attribute(&mut self, element: &ElementRef, name: &str) -> BrowserResult<Option<String>>;

    fn current_url(&mut self) -> BrowserResult<String>;

    /// Handle of the window that currently has focus
    fn window_handle(&mut self) -> BrowserResult<String>;

    fn window_handles(&mut self) -> BrowserResult<Vec<String>>;

    fn switch_to_window(&mut self, handle: &str) -> BrowserResult<()>;

    /// Close the focused window
    fn close_window(&mut self) -> BrowserResult<()>;

    fn set_implicit_wait(&mut self, wait: Duration) -> BrowserResult<()>;

    /// First element matching `selector`
    fn find_one(&mut self, selector: &str) -> BrowserResult<ElementRef> {
        self.find_all(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NoSuchElement(selector.to_string()))
    }

    /// First descendant of `parent` matching `selector`
    fn find_one_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<ElementRef> {
        self.find_within(parent, selector)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::NoSuchElement(selector.to_string()))
    }
}

impl<B: Browser + ?Sized> Browser for &mut B {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        (**self).navigate(url)
    }

    fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        (**self).find_all(selector)
    }

    fn find_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        (**self).find_within(parent, selector)
    }

    fn click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        (**self).click(element)
    }

    fn script_click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        (**self).script_click(element)
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        (**self).send_keys(element, text)
    }

    fn text(&mut self, element: &ElementRef) -> BrowserResult<String> {
        (**self).text(element)
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> BrowserResult<Option<String>> {
        (**self).attribute(element, name)
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        (**self).current_url()
    }

    fn window_handle(&mut self) -> BrowserResult<String> {
        (**self).window_handle()
    }

    fn window_handles(&mut self) -> BrowserResult<Vec<String>> {
        (**self).window_handles()
    }

    fn switch_to_window(&mut self, handle: &str) -> BrowserResult<()> {
        (**self).switch_to_window(handle)
    }

    fn close_window(&mut self) -> BrowserResult<()> {
        (**self).close_window()
    }

    fn set_implicit_wait(&mut self, wait: Duration) -> BrowserResult<()> {
        (**self).set_implicit_wait(wait)
    }
}
