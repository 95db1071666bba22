//! W3C WebDriver client.
//!
//! Talks to chromedriver/geckodriver (or a Selenium grid) over plain HTTP by
//! shelling out to `curl`, one request per command. Every command is
//! synchronous; the implicit wait configured on the session is what lets
//! lookups tolerate elements that have not rendered yet.
//!
//! # Configuration
//!
//! - `FORM_SWEEP_WEBDRIVER`: endpoint URL
//! - `FORM_SWEEP_REQUEST_TIMEOUT`: per-request timeout (seconds)

use serde_json::{Value, json};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use super::{Browser, BrowserError, BrowserResult, ElementRef};
use crate::config;

/// Configuration for the WebDriver client
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Endpoint URL (without the `/session` suffix)
    pub endpoint: String,
    /// Capabilities sent as `alwaysMatch` when creating the session
    pub capabilities: Value,
    /// Timeout for each HTTP request (seconds)
    pub request_timeout: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            endpoint: cfg.webdriver.endpoint.clone(),
            capabilities: json!({ "browserName": "chrome" }),
            request_timeout: cfg.webdriver.request_timeout,
        }
    }
}

impl WebDriverConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Ask Chrome to run without a visible window
    pub fn headless(mut self, headless: bool) -> Self {
        if headless {
            self.capabilities["goog:chromeOptions"] = json!({ "args": ["--headless=new"] });
        } else if let Some(caps) = self.capabilities.as_object_mut() {
            caps.remove("goog:chromeOptions");
        }
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

/// A live WebDriver session
#[derive(Debug)]
pub struct WebDriverBrowser {
    config: WebDriverConfig,
    session_id: String,
    /// Key the remote end uses for element references, learned from responses
    element_key: Option<String>,
    closed: bool,
}

impl WebDriverBrowser {
    /// Create a new session on the remote end
    pub fn connect(config: WebDriverConfig) -> BrowserResult<Self> {
        let body = json!({
            "capabilities": { "alwaysMatch": config.capabilities }
        });
        let value = send(&config, "POST", "/session", Some(&body))?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::Protocol("session response has no sessionId".to_string()))?
            .to_string();
        debug!(session = %session_id, endpoint = %config.endpoint, "WebDriver session created");

        Ok(Self {
            config,
            session_id,
            element_key: None,
            closed: false,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// End the session and close every window it owns
    pub fn quit(mut self) -> BrowserResult<()> {
        self.delete_session()
    }

    fn delete_session(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let path = format!("/session/{}", self.session_id);
        send(&self.config, "DELETE", &path, None).map(|_| ())
    }

    fn command(&self, method: &str, suffix: &str, body: Option<&Value>) -> BrowserResult<Value> {
        let path = format!("/session/{}{}", self.session_id, suffix);
        send(&self.config, method, &path, body)
    }

    fn elements(&mut self, value: Value) -> BrowserResult<Vec<ElementRef>> {
        let items = value
            .as_array()
            .ok_or_else(|| BrowserError::Protocol("expected a list of elements".to_string()))?;
        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            let (key, id) = parse_element(item)
                .ok_or_else(|| BrowserError::Protocol(format!("malformed element reference: {}", item)))?;
            if self.element_key.is_none() {
                self.element_key = Some(key);
            }
            elements.push(ElementRef(id));
        }
        Ok(elements)
    }
}

impl Drop for WebDriverBrowser {
    fn drop(&mut self) {
        if let Err(e) = self.delete_session() {
            warn!(session = %self.session_id, error = %e, "failed to delete WebDriver session");
        }
    }
}

impl Browser for WebDriverBrowser {
    fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.command("POST", "/url", Some(&json!({ "url": url }))).map(|_| ())
    }

    fn find_all(&mut self, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let body = locator(selector);
        let value = self.command("POST", "/elements", Some(&body))?;
        self.elements(value)
    }

    fn find_within(&mut self, parent: &ElementRef, selector: &str) -> BrowserResult<Vec<ElementRef>> {
        let body = locator(selector);
        let suffix = format!("/element/{}/elements", parent.id());
        let value = self.command("POST", &suffix, Some(&body))?;
        self.elements(value)
    }

    fn click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        let suffix = format!("/element/{}/click", element.id());
        self.command("POST", &suffix, Some(&json!({}))).map(|_| ())
    }

    fn script_click(&mut self, element: &ElementRef) -> BrowserResult<()> {
        let key = self
            .element_key
            .clone()
            .ok_or_else(|| BrowserError::Protocol("no element reference received yet".to_string()))?;
        let mut reference = serde_json::Map::new();
        reference.insert(key, Value::String(element.id().to_string()));
        let body = json!({
            "script": "arguments[0].click();",
            "args": [Value::Object(reference)],
        });
        self.command("POST", "/execute/sync", Some(&body)).map(|_| ())
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> BrowserResult<()> {
        let suffix = format!("/element/{}/value", element.id());
        self.command("POST", &suffix, Some(&json!({ "text": text }))).map(|_| ())
    }

    fn text(&mut self, element: &ElementRef) -> BrowserResult<String> {
        let suffix = format!("/element/{}/text", element.id());
        let value = self.command("GET", &suffix, None)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> BrowserResult<Option<String>> {
        let suffix = format!("/element/{}/attribute/{}", element.id(), name);
        let value = self.command("GET", &suffix, None)?;
        Ok(value.as_str().map(str::to_string))
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        let value = self.command("GET", "/url", None)?;
        expect_string(value, "current URL")
    }

    fn window_handle(&mut self) -> BrowserResult<String> {
        let value = self.command("GET", "/window", None)?;
        expect_string(value, "window handle")
    }

    fn window_handles(&mut self) -> BrowserResult<Vec<String>> {
        let value = self.command("GET", "/window/handles", None)?;
        Ok(value
            .as_array()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|h| h.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn switch_to_window(&mut self, handle: &str) -> BrowserResult<()> {
        self.command("POST", "/window", Some(&json!({ "handle": handle })))
            .map(|_| ())
    }

    fn close_window(&mut self) -> BrowserResult<()> {
        self.command("DELETE", "/window", None).map(|_| ())
    }

    fn set_implicit_wait(&mut self, wait: Duration) -> BrowserResult<()> {
        let body = json!({ "implicit": wait.as_millis() as u64 });
        self.command("POST", "/timeouts", Some(&body)).map(|_| ())
    }
}

/// Issue one HTTP request through curl and unwrap the WebDriver `value`
fn send(config: &WebDriverConfig, method: &str, path: &str, body: Option<&Value>) -> BrowserResult<Value> {
    let url = config.url(path);
    let timeout = config.request_timeout.to_string();
    let payload = body.map(serde_json::to_string).transpose()?;

    let mut command = Command::new("curl");
    command.args([
        "-s",
        "-X", method,
        url.as_str(),
        "-H", "Content-Type: application/json",
        "--max-time", timeout.as_str(),
    ]);
    if let Some(payload) = &payload {
        command.args(["-d", payload.as_str()]);
    }

    let output = command.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BrowserError::Connection(format!(
            "{} {} failed ({}): {}",
            method,
            url,
            output.status,
            stderr.trim()
        )));
    }

    parse_response(&output.stdout)
}

/// Extract the `value` member of a WebDriver response, mapping error payloads
pub(crate) fn parse_response(body: &[u8]) -> BrowserResult<Value> {
    let mut response: Value = serde_json::from_slice(body)?;
    let value = response
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(map_error(code, message));
    }

    Ok(value)
}

fn map_error(code: &str, message: String) -> BrowserError {
    match code {
        "no such element" => BrowserError::NoSuchElement(message),
        "stale element reference" => BrowserError::StaleElement(message),
        "no such window" => BrowserError::NoSuchWindow(message),
        other => BrowserError::Protocol(format!("{}: {}", other, message)),
    }
}

/// Pull the (key, id) pair out of a serialized element reference
pub(crate) fn parse_element(value: &Value) -> Option<(String, String)> {
    let object = value.as_object()?;
    object
        .iter()
        .find(|(key, _)| key.starts_with("element-") || key.as_str() == "ELEMENT")
        .and_then(|(key, id)| id.as_str().map(|id| (key.clone(), id.to_string())))
}

fn locator(selector: &str) -> Value {
    json!({ "using": "css selector", "value": selector })
}

fn expect_string(value: Value, what: &str) -> BrowserResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol(format!("{} is not a string", what)))
}
