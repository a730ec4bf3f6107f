//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering tests
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default)]
    pub viewport: Viewport,

    /// Steps to execute in order, inside one browser page
    pub steps: Vec<TestStep>,

    /// Compare screenshots against stored baselines
    #[serde(default)]
    pub visual_regression: bool,

    /// Threshold for visual diff (0.0 - 100.0 percent)
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// A single step in a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL; empty or relative URLs resolve against the base URL
    Navigate {
        #[serde(default)]
        url: String,
    },

    /// Replace the value of an input field
    Fill {
        target: Locator,
        value: String,
    },

    /// Click an element
    Click {
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Press a key, on an element or on the page keyboard
    Press {
        #[serde(default)]
        target: Option<Locator>,
        key: String,
    },

    /// Wait until an element is visible; fails after `timeout_ms`
    ExpectVisible {
        target: Locator,
        #[serde(default = "default_expect_timeout")]
        timeout_ms: u64,
    },

    /// Wait until an element is hidden or gone
    ExpectHidden {
        target: Locator,
        #[serde(default = "default_expect_timeout")]
        timeout_ms: u64,
    },

    /// Wait until an element's text contains `text`
    ExpectText {
        target: Locator,
        text: String,
        #[serde(default = "default_expect_timeout")]
        timeout_ms: u64,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Save a PNG screenshot of the page
    Screenshot {
        path: PathBuf,
        #[serde(default)]
        full_page: bool,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_expect_timeout() -> u64 {
    5000
}

impl TestStep {
    /// Short stable label used in logs and reports
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } if url.is_empty() => "navigate:<base>".to_string(),
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::Fill { target, .. } => format!("fill:{}", target),
            TestStep::Click { target, .. } => format!("click:{}", target),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::ExpectVisible { target, .. } => format!("expect_visible:{}", target),
            TestStep::ExpectHidden { target, .. } => format!("expect_hidden:{}", target),
            TestStep::ExpectText { target, .. } => format!("expect_text:{}", target),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    fn timeout_ms(&self) -> Option<u64> {
        match self {
            TestStep::Click { timeout_ms, .. } => *timeout_ms,
            TestStep::ExpectVisible { timeout_ms, .. }
            | TestStep::ExpectHidden { timeout_ms, .. }
            | TestStep::ExpectText { timeout_ms, .. } => Some(*timeout_ms),
            _ => None,
        }
    }
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml).map_err(E2eError::from)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "specs directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Reject specs that cannot run meaningfully
    pub fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("spec name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("spec '{}' has no steps", self.name)));
        }
        if !(0.0..=100.0).contains(&self.visual_threshold) {
            return Err(E2eError::SpecParse(format!(
                "spec '{}': visual_threshold {} outside 0-100",
                self.name, self.visual_threshold
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.timeout_ms() == Some(0) {
                return Err(E2eError::SpecParse(format!(
                    "spec '{}' step {} ({}): timeout must be non-zero",
                    self.name,
                    i + 1,
                    step.name()
                )));
            }
            if let TestStep::Screenshot { path, .. } = step {
                if path.as_os_str().is_empty() {
                    return Err(E2eError::SpecParse(format!(
                        "spec '{}' step {}: screenshot path is empty",
                        self.name,
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }

    /// Paths of all screenshots this spec writes, in step order
    pub fn screenshot_paths(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                TestStep::Screenshot { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}
