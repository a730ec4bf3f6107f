//! Target URL resolution and the optional YAML configuration file

use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Environment variable that selects the application under test.
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Used when [`BASE_URL_ENV`] is unset or empty.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Resolve the base URL from an optional raw value.
///
/// `None` and blank strings fall back to [`DEFAULT_BASE_URL`]. Anything else
/// must be an absolute `http` or `https` URL.
pub fn resolve_base_url(value: Option<String>) -> E2eResult<Url> {
    let raw = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let url = Url::parse(&raw)
        .map_err(|e| E2eError::InvalidConfig(format!("base URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(E2eError::InvalidConfig(format!(
            "base URL '{}' has unsupported scheme '{}'",
            raw, other
        ))),
    }
}

/// Read [`BASE_URL_ENV`] from the process environment.
pub fn base_url_from_env() -> E2eResult<Url> {
    let value = std::env::var(BASE_URL_ENV).ok();
    debug!("{} = {:?}", BASE_URL_ENV, value);
    resolve_base_url(value)
}

/// Resolve a navigation target against the base URL.
///
/// An empty target is the base URL itself, which is what the login flow
/// opens. Absolute targets pass through untouched.
pub fn resolve_url(base: &Url, target: &str) -> E2eResult<Url> {
    let target = target.trim();
    if target.is_empty() {
        return Ok(base.clone());
    }
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute);
    }
    base.join(target)
        .map_err(|e| E2eError::InvalidConfig(format!("cannot join '{}' onto {}: {}", target, base, e)))
}

/// Settings read from a YAML file. Every key is optional; missing keys keep
/// the built-in defaults and command-line flags win over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub specs_dir: Option<String>,
    pub output_dir: Option<String>,
    pub browser: Option<String>,
    pub headless: Option<bool>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub node_binary: Option<String>,
    pub node_path: Option<String>,
    pub script_timeout_ms: Option<u64>,
    pub startup_timeout_ms: Option<u64>,
    pub server_command: Option<Vec<String>>,
    pub server_dir: Option<String>,
    pub wait_for_server: Option<bool>,
    pub api_preflight: Option<bool>,
    pub baseline_dir: Option<String>,
    pub diff_dir: Option<String>,
    pub visual_threshold: Option<f64>,
}

impl FileConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            E2eError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }
}
