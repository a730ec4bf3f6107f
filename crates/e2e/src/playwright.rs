//! Playwright browser automation
//!
//! A spec is rendered into one Node.js program that drives a single browser
//! page through every step. Progress comes back as one JSON event per line
//! on stdout, prefixed with [`EVENT_PREFIX`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::config::{resolve_url, DEFAULT_BASE_URL};
use crate::error::{E2eError, E2eResult};
use crate::locator::js_str;
use crate::spec::{TestStep, Viewport};

/// Marks stdout lines that carry step events.
pub const EVENT_PREFIX: &str = "@@e2e ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not executed because an earlier step failed
    Skipped,
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub step_name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// The step failed because a Playwright wait ran out of time
    #[serde(default)]
    pub timed_out: bool,
    pub screenshot_path: Option<PathBuf>,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    Step {
        index: usize,
        ok: bool,
        duration_ms: u64,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        timeout: bool,
    },
    Done {
        ok: bool,
    },
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: Url,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    /// Node.js executable
    pub node_binary: PathBuf,
    /// Directory holding the `playwright` package; defaults to
    /// `$NODE_PATH`, then `<working_dir>/node_modules`
    pub node_path: Option<PathBuf>,
    /// Relative screenshot paths resolve against this directory
    pub working_dir: PathBuf,
    /// Upper bound for one whole browser session
    pub script_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            node_path: None,
            working_dir: PathBuf::from("."),
            script_timeout: Duration::from_secs(120),
        }
    }
}

impl PlaywrightConfig {
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport_width = viewport.width;
        self.viewport_height = viewport.height;
        self
    }

    fn effective_node_path(&self) -> PathBuf {
        self.node_path
            .clone()
            .or_else(|| std::env::var_os("NODE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| self.working_dir.join("node_modules"))
    }

    /// Resolve an output path the way the browser process will see it
    pub fn output_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

impl PlaywrightHandle {
    /// Create a handle after checking that Node.js and Playwright are usable
    pub async fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        let handle = Self::unchecked(config);
        handle.check_playwright_installed().await?;
        Ok(handle)
    }

    /// Create a handle without probing the Node.js installation
    pub fn unchecked(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    async fn check_playwright_installed(&self) -> E2eResult<()> {
        let output = TokioCommand::new(&self.config.node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .current_dir(&self.config.working_dir)
            .env("NODE_PATH", self.config.effective_node_path())
            .output()
            .await
            .map_err(|e| {
                E2eError::PlaywrightNotFound(format!(
                    "cannot run '{}': {}",
                    self.config.node_binary.display(),
                    e
                ))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(E2eError::PlaywrightNotFound(format!(
                "package 'playwright' does not resolve from {}",
                self.config.effective_node_path().display()
            )))
        }
    }

    /// Build the Playwright program for a set of steps
    pub fn build_script(&self, steps: &[TestStep]) -> E2eResult<String> {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const pw = require('playwright');

const EVENT = {prefix};
const emit = (event) => process.stdout.write(EVENT + JSON.stringify(event) + '\n');

async function waitForText(locator, text, timeout) {{
  const deadline = Date.now() + timeout;
  for (;;) {{
    const remaining = Math.max(1, deadline - Date.now());
    const current = await locator.first().textContent({{ timeout: remaining }}).catch(() => null);
    if (current !== null && current.includes(text)) return;
    if (Date.now() >= deadline) {{
      const error = new Error('text ' + JSON.stringify(text) + ' not found within ' + timeout + 'ms');
      error.name = 'TimeoutError';
      throw error;
    }}
    await new Promise((r) => setTimeout(r, 100));
  }}
}}

(async () => {{
  const browser = await pw.{browser}.launch({{ headless: {headless} }});
  let failed = false;
  try {{
    const context = await browser.newContext({{
      viewport: {{ width: {width}, height: {height} }}
    }});
    const page = await context.newPage();
    const steps = [
"#,
            prefix = js_str(EVENT_PREFIX),
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
        ));

        for (i, step) in steps.iter().enumerate() {
            script.push_str(&format!("      // Step {}: {}\n", i + 1, step.name()));
            script.push_str(&format!(
                "      async () => {{\n        {}\n      }},\n",
                self.step_to_js(step)?
            ));
        }

        script.push_str(
            r#"    ];
    for (let i = 0; i < steps.length; i++) {
      const started = Date.now();
      try {
        await steps[i]();
        emit({ event: 'step', index: i, ok: true, duration_ms: Date.now() - started });
      } catch (error) {
        emit({
          event: 'step',
          index: i,
          ok: false,
          duration_ms: Date.now() - started,
          error: String((error && error.message) || error),
          timeout: Boolean(error && error.name === 'TimeoutError'),
        });
        failed = true;
        break;
      }
    }
  } finally {
    await browser.close();
  }
  emit({ event: 'done', ok: !failed });
  process.exitCode = failed ? 1 : 0;
})().catch((error) => {
  process.stderr.write(String((error && error.stack) || error) + '\n');
  process.exitCode = 2;
});
"#,
        );

        Ok(script)
    }

    /// Convert a step to the body of its async closure
    fn step_to_js(&self, step: &TestStep) -> E2eResult<String> {
        let js = match step {
            TestStep::Navigate { url } => {
                let target = resolve_url(&self.config.base_url, url)?;
                format!("await page.goto({});", js_str(target.as_str()))
            }
            TestStep::Fill { target, value } => {
                format!("await {}.fill({});", target.to_js("page"), js_str(value))
            }
            TestStep::Click { target, timeout_ms } => match timeout_ms {
                Some(ms) => format!("await {}.click({{ timeout: {} }});", target.to_js("page"), ms),
                None => format!("await {}.click();", target.to_js("page")),
            },
            TestStep::Press { target, key } => match target {
                Some(t) => format!("await {}.press({});", t.to_js("page"), js_str(key)),
                None => format!("await page.keyboard.press({});", js_str(key)),
            },
            TestStep::ExpectVisible { target, timeout_ms } => format!(
                "await {}.waitFor({{ state: 'visible', timeout: {} }});",
                target.to_js("page"),
                timeout_ms
            ),
            TestStep::ExpectHidden { target, timeout_ms } => format!(
                "await {}.waitFor({{ state: 'hidden', timeout: {} }});",
                target.to_js("page"),
                timeout_ms
            ),
            TestStep::ExpectText { target, text, timeout_ms } => format!(
                "await waitForText({}, {}, {});",
                target.to_js("page"),
                js_str(text),
                timeout_ms
            ),
            TestStep::Sleep { ms } => format!("await page.waitForTimeout({});", ms),
            TestStep::Screenshot { path, full_page } => {
                let path = self.config.output_path(path);
                format!(
                    "await page.screenshot({{ path: {}, fullPage: {} }});",
                    js_str(&path.to_string_lossy()),
                    full_page
                )
            }
            TestStep::Log { message } => {
                format!("console.log('[TEST] ' + {});", js_str(message))
            }
        };
        Ok(js)
    }

    /// Run all steps in one browser session.
    ///
    /// A failing step is reported in the returned results, not as an error;
    /// `Err` means the harness itself could not run the browser.
    pub async fn run(&self, steps: &[TestStep]) -> E2eResult<Vec<StepResult>> {
        for step in steps {
            if let TestStep::Screenshot { path, .. } = step {
                if let Some(parent) = self.config.output_path(path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let script = self.build_script(steps)?;

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("verify.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .current_dir(&self.config.working_dir)
            .env("NODE_PATH", self.config.effective_node_path())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.config.script_timeout, child).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(E2eError::Timeout(format!(
                    "browser session exceeded {} ms",
                    self.config.script_timeout.as_millis()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let (events, finished) = parse_events(&stdout)?;
        let results = self.collect_results(steps, events);
        let any_failed = results.iter().any(|r| r.status == StepStatus::Failed);

        if !finished && !any_failed {
            return Err(E2eError::Playwright(format!(
                "browser process exited with {} before finishing:\n{}",
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            debug!("Playwright stderr: {}", stderr.trim());
        }

        Ok(results)
    }

    fn collect_results(&self, steps: &[TestStep], events: Vec<ScriptEvent>) -> Vec<StepResult> {
        let mut results: Vec<StepResult> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepResult {
                index,
                step_name: step.name(),
                status: StepStatus::Skipped,
                duration_ms: 0,
                error: None,
                timed_out: false,
                screenshot_path: None,
            })
            .collect();

        for event in events {
            if let ScriptEvent::Step { index, ok, duration_ms, error, timeout } = event {
                let Some(result) = results.get_mut(index) else {
                    warn!("Ignoring event for unknown step {}", index);
                    continue;
                };
                result.status = if ok { StepStatus::Passed } else { StepStatus::Failed };
                result.duration_ms = duration_ms;
                result.error = error;
                result.timed_out = !ok && timeout;
                if ok {
                    if let TestStep::Screenshot { path, .. } = &steps[index] {
                        result.screenshot_path = Some(self.config.output_path(path));
                    }
                }
            }
        }

        results
    }
}

/// Split browser stdout into step events; returns whether `done` was seen.
fn parse_events(stdout: &str) -> E2eResult<(Vec<ScriptEvent>, bool)> {
    let mut events = Vec::new();
    let mut finished = false;

    for line in stdout.lines() {
        match line.strip_prefix(EVENT_PREFIX) {
            Some(payload) => {
                let event: ScriptEvent = serde_json::from_str(payload)?;
                if let ScriptEvent::Done { ok } = &event {
                    debug!("Browser session finished (ok: {})", ok);
                    finished = true;
                }
                events.push(event);
            }
            None if !line.trim().is_empty() => info!("[browser] {}", line),
            None => {}
        }
    }

    Ok((events, finished))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{AriaRole, Locator};

    fn handle() -> PlaywrightHandle {
        PlaywrightHandle::unchecked(PlaywrightConfig {
            base_url: Url::parse("http://127.0.0.1:3000").unwrap(),
            working_dir: PathBuf::from("/work"),
            ..Default::default()
        })
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("lynx".parse::<Browser>().is_err());
    }

    #[test]
    fn test_step_js() {
        let h = handle();
        let js = h
            .step_to_js(&TestStep::ExpectVisible {
                target: Locator::role(AriaRole::Heading, "Vip-Auto CRM"),
                timeout_ms: 10000,
            })
            .unwrap();
        assert_eq!(
            js,
            r#"await page.getByRole("heading", { name: "Vip-Auto CRM" }).waitFor({ state: 'visible', timeout: 10000 });"#
        );

        let js = h
            .step_to_js(&TestStep::Screenshot {
                path: PathBuf::from("shots/a.png"),
                full_page: true,
            })
            .unwrap();
        assert_eq!(js, r#"await page.screenshot({ path: "/work/shots/a.png", fullPage: true });"#);

        let js = h.step_to_js(&TestStep::Navigate { url: String::new() }).unwrap();
        assert_eq!(js, r#"await page.goto("http://127.0.0.1:3000/");"#);
    }

    #[test]
    fn test_script_exits_without_cutting_stdout() {
        let h = handle();
        let script = h
            .build_script(&crate::login::LoginScenario::new().to_spec().steps)
            .unwrap();
        // process.exit() would drop pending pipe writes, including `done`.
        assert!(!script.contains("process.exit("));
        assert!(script.contains("process.exitCode = failed ? 1 : 0;"));
        assert!(script.contains("process.exitCode = 2;"));
    }

    #[test]
    fn test_parse_events_ignores_noise() {
        let stdout = "[TEST] hello\n@@e2e {\"event\":\"step\",\"index\":0,\"ok\":true,\"duration_ms\":12}\n\n@@e2e {\"event\":\"done\",\"ok\":true}\n";
        let (events, finished) = parse_events(stdout).unwrap();
        assert!(finished);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_collect_results_marks_skipped_and_timeout() {
        let h = handle();
        let steps = vec![
            TestStep::Navigate { url: String::new() },
            TestStep::ExpectVisible {
                target: Locator::role(AriaRole::Heading, "Vip-Auto CRM"),
                timeout_ms: 10000,
            },
            TestStep::Screenshot {
                path: PathBuf::from("v.png"),
                full_page: false,
            },
        ];
        let stdout = concat!(
            "@@e2e {\"event\":\"step\",\"index\":0,\"ok\":true,\"duration_ms\":40}\n",
            "@@e2e {\"event\":\"step\",\"index\":1,\"ok\":false,\"duration_ms\":10002,",
            "\"error\":\"Timeout 10000ms exceeded.\",\"timeout\":true}\n",
            "@@e2e {\"event\":\"done\",\"ok\":false}\n",
        );
        let (events, _) = parse_events(stdout).unwrap();
        let results = h.collect_results(&steps, events);

        assert_eq!(results[0].status, StepStatus::Passed);
        assert_eq!(results[1].status, StepStatus::Failed);
        assert!(results[1].timed_out);
        assert_eq!(results[2].status, StepStatus::Skipped);
        assert!(results[2].screenshot_path.is_none());
    }
}
