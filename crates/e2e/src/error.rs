//! Error types for E2E verification

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server at {url} not reachable after {attempts} attempts")]
    ServerHealthCheck { url: String, attempts: usize },

    #[error("Playwright not found: {0}. Install with: npm install playwright && npx playwright install chromium")]
    PlaywrightNotFound(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Login rejected by {url}: {message}")]
    Authentication { url: String, message: String },

    #[error("Evidence missing or unreadable: {0}")]
    Evidence(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;
