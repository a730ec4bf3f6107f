//! Subcommands and the configuration layering they share

pub mod check;
pub mod list;
pub mod login;
pub mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use vipauto_e2e::config::{resolve_base_url, FileConfig};
use vipauto_e2e::playwright::Browser;
use vipauto_e2e::{RunnerConfig, TestSuiteResult};

use crate::output::OutputFormat;

/// How a subcommand ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// The application was checked and did not behave
    Failed,
    /// The harness could not finish, so nothing was verified
    HarnessError,
}

impl Outcome {
    pub fn of_suite(suite: &TestSuiteResult) -> Self {
        if suite.has_harness_errors() {
            Outcome::HarnessError
        } else if suite.all_passed() {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }
}

/// 0 passed, 1 verification failed, 2 harness error
pub fn exit_code(outcome: &anyhow::Result<Outcome>) -> i32 {
    match outcome {
        Ok(Outcome::Passed) => 0,
        Ok(Outcome::Failed) => 1,
        Ok(Outcome::HarnessError) | Err(_) => 2,
    }
}

/// Flags that apply to every subcommand
pub struct GlobalArgs {
    pub base_url: Option<String>,
    pub config: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Browser and server settings shared by `login` and `run`
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Node.js executable
    #[arg(long)]
    pub node: Option<PathBuf>,

    /// Directory containing the `playwright` package
    #[arg(long, env = "NODE_PATH")]
    pub node_path: Option<PathBuf>,

    /// Upper bound for one browser session, in milliseconds
    #[arg(long)]
    pub script_timeout_ms: Option<u64>,

    /// Start the application with this command, e.g. "node server.js"
    #[arg(long)]
    pub server_command: Option<String>,

    /// Working directory for --server-command
    #[arg(long)]
    pub server_dir: Option<PathBuf>,

    /// How long to wait for the application to answer, in milliseconds
    #[arg(long)]
    pub startup_timeout_ms: Option<u64>,

    /// Poll the base URL until it answers before opening the browser
    #[arg(long)]
    pub wait_for_server: bool,

    /// POST the credentials to /login before opening the browser
    #[arg(long)]
    pub api_preflight: bool,

    /// Output directory for the JSON report
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Defaults, then the config file, then `BASE_URL` / `--base-url`, then flags
pub fn build_config(global: &GlobalArgs, session: &SessionArgs) -> anyhow::Result<RunnerConfig> {
    let mut config = base_config(global)?;

    if let Some(browser) = session.browser {
        config.playwright.browser = browser;
    }
    if session.headed {
        config.playwright.headless = false;
    }
    if let Some(node) = &session.node {
        config.playwright.node_binary = node.clone();
    }
    if let Some(path) = &session.node_path {
        config.playwright.node_path = Some(path.clone());
    }
    if let Some(ms) = session.script_timeout_ms {
        config.playwright.script_timeout = Duration::from_millis(ms);
    }
    if let Some(cmd) = &session.server_command {
        config.server.command = cmd.split_whitespace().map(String::from).collect();
    }
    if let Some(dir) = &session.server_dir {
        config.server.working_dir = Some(dir.clone());
    }
    if let Some(ms) = session.startup_timeout_ms {
        config.server.startup_timeout = Duration::from_millis(ms);
    }
    if session.wait_for_server {
        config.server.wait_for_ready = true;
    }
    if session.api_preflight {
        config.server.api_preflight = true;
    }
    if let Some(dir) = &session.output {
        config.output_dir = dir.clone();
    }

    config.playwright.working_dir =
        std::env::current_dir().context("cannot determine the working directory")?;

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Defaults layered with the config file and the base URL only
pub fn base_config(global: &GlobalArgs) -> anyhow::Result<RunnerConfig> {
    let mut config = RunnerConfig::default();

    if let Some(path) = &global.config {
        let file = FileConfig::from_file(path)?;
        config = config
            .apply_file(&file)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
    }

    if let Some(url) = global.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.playwright.base_url = resolve_base_url(Some(url.to_string()))?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use chrono::Utc;
    use vipauto_e2e::playwright::Browser;
    use vipauto_e2e::runner::TestResult;

    fn global(base_url: Option<&str>, config: Option<PathBuf>) -> GlobalArgs {
        GlobalArgs {
            base_url: base_url.map(String::from),
            config,
            format: OutputFormat::Table,
        }
    }

    fn config_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    fn result(success: bool, harness_error: bool) -> TestResult {
        TestResult {
            name: "login-flow".into(),
            success,
            duration_ms: 1,
            steps: vec![],
            evidence: vec![],
            visual_diffs: vec![],
            error: (!success).then(|| "boom".to_string()),
            timed_out: false,
            harness_error,
        }
    }

    fn suite(results: Vec<TestResult>) -> TestSuiteResult {
        let passed = results.iter().filter(|r| r.success).count();
        TestSuiteResult {
            run_id: "run".into(),
            started_at: Utc::now(),
            base_url: "http://localhost:3000/".into(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            harness_errors: results.iter().filter(|r| r.harness_error).count(),
            duration_ms: 1,
            results,
        }
    }

    #[test]
    fn test_defaults_without_file_or_url() {
        let config = base_config(&global(None, None)).unwrap();
        assert_eq!(config.playwright.base_url.as_str(), "http://localhost:3000/");

        let config = base_config(&global(Some("  "), None)).unwrap();
        assert_eq!(config.playwright.base_url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn test_base_url_beats_config_file() {
        let file = config_file("base_url: http://crm.local:8080\nbrowser: firefox\n");

        let config = base_config(&global(None, Some(file.path().to_path_buf()))).unwrap();
        assert_eq!(config.playwright.base_url.as_str(), "http://crm.local:8080/");

        let config = base_config(&global(
            Some("http://staging.test:3000"),
            Some(file.path().to_path_buf()),
        ))
        .unwrap();
        assert_eq!(config.playwright.base_url.as_str(), "http://staging.test:3000/");
        assert_eq!(config.playwright.browser, Browser::Firefox);

        // A blank BASE_URL keeps the file's value.
        let config = base_config(&global(Some(""), Some(file.path().to_path_buf()))).unwrap();
        assert_eq!(config.playwright.base_url.as_str(), "http://crm.local:8080/");
    }

    #[test]
    fn test_bad_inputs_are_errors() {
        assert!(base_config(&global(Some("ftp://crm.local"), None)).is_err());

        let file = config_file("bogus_key: 1\n");
        assert!(base_config(&global(None, Some(file.path().to_path_buf()))).is_err());
    }

    #[test]
    fn test_flags_beat_config_file() {
        let file = config_file("browser: firefox\nheadless: true\nwait_for_server: false\n");
        let session = SessionArgs {
            browser: Some(Browser::Webkit),
            headed: true,
            wait_for_server: true,
            server_command: Some("node server.js".into()),
            ..Default::default()
        };

        let config = build_config(&global(None, Some(file.path().to_path_buf())), &session).unwrap();
        assert_eq!(config.playwright.browser, Browser::Webkit);
        assert!(!config.playwright.headless);
        assert!(config.server.wait_for_ready);
        assert_eq!(config.server.command, vec!["node", "server.js"]);
    }

    #[test]
    fn test_outcome_of_suite() {
        assert_eq!(Outcome::of_suite(&suite(vec![result(true, false)])), Outcome::Passed);
        assert_eq!(Outcome::of_suite(&suite(vec![result(false, false)])), Outcome::Failed);
        assert_eq!(
            Outcome::of_suite(&suite(vec![result(false, false), result(false, true)])),
            Outcome::HarnessError
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(Outcome::Passed)), 0);
        assert_eq!(exit_code(&Ok(Outcome::Failed)), 1);
        assert_eq!(exit_code(&Ok(Outcome::HarnessError)), 2);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("no specs directory"))), 2);
    }
}
