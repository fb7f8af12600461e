//! Live Drive folder access through Chrome's DevTools protocol.
//!
//! Drive needs a signed-in session, so the reader either attaches to a Chrome
//! the user already started with `--remote-debugging-port`, or launches one on
//! a profile directory that is signed in. All calls are blocking; run them on
//! a blocking thread.

use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{BrowserConfig, DomConfig};
use crate::scanner::{DomReader, RawRow, ScanError, ScrollOffsets};

/// Open a browser according to `[browser]`.
pub fn open_browser(config: &BrowserConfig) -> Result<Browser, ScanError> {
    if !config.debug_ws_url.is_empty() {
        info!("Attaching to running Chrome at {}", config.debug_ws_url);
        return Browser::connect(config.debug_ws_url.clone())
            .map_err(|e| ScanError::Browser(format!("Failed to attach to Chrome: {}", e)));
    }

    let is_container = std::env::var("BACKUPCHECK_CONTAINER").is_ok()
        || std::path::Path::new("/.dockerenv").exists();
    let chrome_path = std::env::var("CHROME_PATH").ok().map(PathBuf::from);
    let user_data_dir = if config.user_data_dir.is_empty() {
        None
    } else {
        Some(PathBuf::from(&config.user_data_dir))
    };

    let options = LaunchOptions::default_builder()
        .headless(config.headless)
        .sandbox(!is_container)
        .path(chrome_path)
        .user_data_dir(user_data_dir)
        .idle_browser_timeout(Duration::from_secs(config.navigation_timeout_secs.max(60).saturating_mul(10)))
        .build()
        .map_err(|e| ScanError::Browser(format!("Failed to build Chrome launch options: {}", e)))?;

    Browser::new(options).map_err(|e| ScanError::Browser(format!("Failed to launch Chrome: {}", e)))
}

#[derive(Debug, Deserialize)]
struct ContainerLookup {
    found: bool,
}

/// [`DomReader`] over a Chrome tab showing the Drive folder.
pub struct ChromeDomReader {
    // Keeps the browser process (or websocket) alive for the tab's lifetime
    _browser: Browser,
    tab: Arc<Tab>,
    dom: DomConfig,
}

impl ChromeDomReader {
    /// Open `folder_url` in a new tab and wait for the list to render.
    pub fn open(browser: Browser, config: &BrowserConfig, dom: &DomConfig) -> Result<Self, ScanError> {
        let tab = browser
            .new_tab()
            .map_err(|e| ScanError::Browser(format!("Failed to create tab: {}", e)))?;
        let timeout = Duration::from_secs(config.navigation_timeout_secs);
        tab.set_default_timeout(timeout);

        info!("Opening {}", config.folder_url);
        tab.navigate_to(&config.folder_url)
            .map_err(|e| ScanError::Browser(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| ScanError::Browser(format!("Page load failed: {}", e)))?;

        // An empty folder never renders a row; the scan then sees zero rows.
        if let Err(e) = tab.wait_for_element_with_custom_timeout(&dom.row_selector, timeout) {
            debug!("No list rows appeared within {:?}: {}", timeout, e);
        }

        Ok(Self {
            _browser: browser,
            tab,
            dom: dom.clone(),
        })
    }

    fn eval_json<T: for<'de> Deserialize<'de>>(&self, script: &str) -> Result<T, ScanError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| ScanError::Evaluation(e.to_string()))?;
        let text = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScanError::Evaluation("script returned no value".to_string()))?;
        serde_json::from_str(text).map_err(|e| ScanError::Evaluation(format!("unexpected script result: {}", e)))
    }
}

impl DomReader for ChromeDomReader {
    fn has_scroll_container(&self) -> Result<bool, ScanError> {
        let lookup: ContainerLookup = self.eval_json(&container_check_script(&self.dom))?;
        Ok(lookup.found)
    }

    fn visible_rows(&self) -> Result<Vec<RawRow>, ScanError> {
        self.eval_json(&rows_script(&self.dom))
    }

    fn scroll_by(&mut self, px: u32) -> Result<ScrollOffsets, ScanError> {
        self.eval_json(&scroll_script(&self.dom, px))
    }
}

/// JavaScript expression returning the first matching scroll container (or null).
fn container_lookup(dom: &DomConfig) -> String {
    let selectors = serde_json::to_string(&dom.scroll_container_selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        "(() => {{ for (const s of {selectors}) {{ const el = document.querySelector(s); if (el) return el; }} return null; }})()"
    )
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn container_check_script(dom: &DomConfig) -> String {
    format!(
        "(() => {{ const c = {lookup}; return JSON.stringify({{ found: c !== null }}); }})()",
        lookup = container_lookup(dom)
    )
}

pub(crate) fn rows_script(dom: &DomConfig) -> String {
    format!(
        r#"(() => {{
  const text = (el) => el ? (el.innerText || el.textContent || "").trim() : null;
  const rows = Array.from(document.querySelectorAll({row}));
  return JSON.stringify(rows.map((row) => ({{
    name: text(row.querySelector({name})),
    date: text(row.querySelector({date})),
  }})));
}})()"#,
        row = js_string(&dom.row_selector),
        name = js_string(&dom.name_selector),
        date = js_string(&dom.date_selector),
    )
}

pub(crate) fn scroll_script(dom: &DomConfig, px: u32) -> String {
    format!(
        r#"(() => {{
  const c = {lookup};
  if (c === null) return JSON.stringify({{ before: 0, after: 0 }});
  const before = Math.round(c.scrollTop);
  c.scrollBy(0, {px});
  c.dispatchEvent(new Event("scroll"));
  return JSON.stringify({{ before: before, after: Math.round(c.scrollTop) }});
}})()"#,
        lookup = container_lookup(dom),
        px = px,
    )
}
