//! Main test runner that orchestrates the target server, Playwright and
//! screenshot evidence

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{resolve_base_url, FileConfig};
use crate::error::{E2eError, E2eResult};
use crate::evidence::{BaselineComparer, Evidence, EvidenceConfig, VisualDiff};
use crate::login::{Credentials, LoginScenario};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, StepResult, StepStatus};
use crate::server::{login_preflight, wait_for_reachable, ServerConfig, ServerHandle};
use crate::spec::TestSpec;

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub evidence: Vec<Evidence>,
    pub visual_diffs: Vec<VisualDiff>,
    pub error: Option<String>,
    /// A step wait ran out of time
    pub timed_out: bool,
    /// The harness could not complete the run (no Node.js or Playwright,
    /// browser crash, session limit); nothing was verified
    #[serde(default)]
    pub harness_error: bool,
}

impl TestResult {
    fn harness_failure(name: &str, error: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            steps: vec![],
            evidence: vec![],
            visual_diffs: vec![],
            error: Some(error.to_string()),
            timed_out: false,
            harness_error: true,
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Failed runs that never reached a verdict
    #[serde(default)]
    pub harness_errors: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn has_harness_errors(&self) -> bool {
        self.harness_errors > 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    server_config: ServerConfig,
    playwright_config: PlaywrightConfig,
    evidence_config: EvidenceConfig,
    credentials: Credentials,

    /// Managed server process (if any)
    server: Option<ServerHandle>,
    prepared: bool,

    specs_dir: PathBuf,
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            playwright_config: config.playwright,
            evidence_config: config.evidence,
            credentials: config.credentials,
            server: None,
            prepared: false,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        }
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.playwright_config.base_url
    }

    /// Get the application ready before any browser work.
    ///
    /// Starts the configured server command if there is one and waits for it.
    /// An already running application is only polled when `wait_for_ready`
    /// is set; otherwise the browser's own navigation error is what gets
    /// reported. Runs the optional login API preflight last.
    pub async fn prepare(&mut self) -> E2eResult<()> {
        if self.prepared {
            return Ok(());
        }

        if self.server_config.is_managed() && self.server.is_none() {
            let server = ServerHandle::spawn(self.server_config.clone()).await?;
            self.playwright_config.base_url = server.base_url().clone();
            self.server = Some(server);
        } else if self.server_config.wait_for_ready {
            wait_for_reachable(&self.playwright_config.base_url, self.server_config.startup_timeout)
                .await?;
        }

        if self.server_config.api_preflight {
            login_preflight(&self.playwright_config.base_url, &self.credentials).await?;
        }

        self.prepared = true;
        Ok(())
    }

    /// Stop the managed server, if any
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        self.prepared = false;
        Ok(())
    }

    /// Run the built-in login verification
    pub async fn run_login(&mut self, scenario: &LoginScenario) -> E2eResult<TestSuiteResult> {
        self.credentials = scenario.get_credentials().clone();
        self.run_specs(&[scenario.to_spec()]).await
    }

    /// Run all specs in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run specs carrying a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        if filtered.is_empty() {
            return Err(E2eError::TestNotFound(format!("no spec tagged '{}'", tag)));
        }
        self.run_specs(&filtered).await
    }

    /// Run a specific spec by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::TestNotFound(name.to_string()))?;
        self.run_specs(&[spec]).await
    }

    /// Run a list of test specs
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut harness_errors = 0;

        self.prepare().await?;

        info!("Running {} test(s) against {}", specs.len(), self.playwright_config.base_url);

        for spec in specs {
            let result = match self.run_spec(spec).await {
                Ok(result) => result,
                Err(e) => {
                    error!("✗ {} - {}", spec.name, e);
                    TestResult::harness_failure(&spec.name, &e)
                }
            };

            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                if result.harness_error {
                    harness_errors += 1;
                }
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(TestSuiteResult {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            base_url: self.playwright_config.base_url.to_string(),
            total: specs.len(),
            passed,
            failed,
            harness_errors,
            duration_ms,
            results,
        })
    }

    /// Run a single test spec in one browser session
    pub async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running test: {}", spec.name);
        spec.validate()?;

        let pw_config = self.playwright_config.clone().with_viewport(spec.viewport);
        let playwright = PlaywrightHandle::new(pw_config).await?;

        let steps = playwright.run(&spec.steps).await?;

        let failure = steps.iter().find(|s| s.status == StepStatus::Failed);
        let mut test_error = failure.map(|s| {
            format!(
                "step {} ({}) failed: {}",
                s.index + 1,
                s.step_name,
                s.error.as_deref().unwrap_or("unknown error")
            )
        });
        let timed_out = failure.map(|s| s.timed_out).unwrap_or(false);

        // Screenshots are only trusted once the whole flow passed.
        let mut evidence = Vec::new();
        if test_error.is_none() {
            for path in steps.iter().filter_map(|s| s.screenshot_path.as_deref()) {
                match Evidence::inspect(path) {
                    Ok(e) => {
                        info!("Screenshot saved: {} ({}x{})", path.display(), e.width, e.height);
                        evidence.push(e);
                    }
                    Err(e) => {
                        test_error = Some(e.to_string());
                        break;
                    }
                }
            }
        }

        let mut visual_diffs = Vec::new();
        if spec.visual_regression && test_error.is_none() {
            let comparer = BaselineComparer::new(self.evidence_config.clone())?;

            for item in &evidence {
                let name = baseline_name(&spec.name, &item.path);
                match comparer.compare(&name, &item.path, Some(spec.visual_threshold)) {
                    Ok(diff) => {
                        if !diff.matches {
                            test_error = Some(format!(
                                "Visual regression in '{}': {:.2}% pixels differ",
                                name, diff.diff_percent
                            ));
                        }
                        visual_diffs.push(diff);
                    }
                    Err(E2eError::BaselineNotFound(_)) => {
                        warn!(
                            "No baseline for '{}' - run with --update-baselines to create it",
                            name
                        );
                    }
                    Err(e) => {
                        test_error = Some(format!("Visual comparison error: {}", e));
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(TestResult {
            name: spec.name.clone(),
            success: test_error.is_none(),
            duration_ms,
            steps,
            evidence,
            visual_diffs,
            error: test_error,
            timed_out,
            harness_error: false,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// `<spec>-<file stem>`, so two specs can share a screenshot file name
fn baseline_name(spec_name: &str, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "screenshot".to_string());
    format!("{}-{}", spec_name, stem)
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,
    pub evidence: EvidenceConfig,
    /// Used by the login API preflight
    pub credentials: Credentials,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            evidence: EvidenceConfig::default(),
            credentials: Credentials::default(),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl RunnerConfig {
    /// Layer a YAML config file over the defaults
    pub fn apply_file(mut self, file: &FileConfig) -> E2eResult<Self> {
        if let Some(url) = &file.base_url {
            self.playwright.base_url = resolve_base_url(Some(url.clone()))?;
        }
        if let Some(dir) = &file.specs_dir {
            self.specs_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &file.output_dir {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(browser) = &file.browser {
            self.playwright.browser = browser.parse()?;
        }
        if let Some(headless) = file.headless {
            self.playwright.headless = headless;
        }
        if let Some(w) = file.viewport_width {
            self.playwright.viewport_width = w;
        }
        if let Some(h) = file.viewport_height {
            self.playwright.viewport_height = h;
        }
        if let Some(node) = &file.node_binary {
            self.playwright.node_binary = PathBuf::from(node);
        }
        if let Some(path) = &file.node_path {
            self.playwright.node_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = file.script_timeout_ms {
            self.playwright.script_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.startup_timeout_ms {
            self.server.startup_timeout = Duration::from_millis(ms);
        }
        if let Some(cmd) = &file.server_command {
            self.server.command = cmd.clone();
        }
        if let Some(dir) = &file.server_dir {
            self.server.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(wait) = file.wait_for_server {
            self.server.wait_for_ready = wait;
        }
        if let Some(preflight) = file.api_preflight {
            self.server.api_preflight = preflight;
        }
        if let Some(dir) = &file.baseline_dir {
            self.evidence.baseline_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &file.diff_dir {
            self.evidence.diff_dir = PathBuf::from(dir);
        }
        if let Some(t) = file.visual_threshold {
            if !(0.0..=100.0).contains(&t) {
                return Err(E2eError::InvalidConfig(format!(
                    "visual_threshold {} outside 0-100",
                    t
                )));
            }
            self.evidence.threshold = t;
        }
        Ok(self)
    }
}
