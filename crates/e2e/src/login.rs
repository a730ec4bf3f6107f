//! The built-in Vip-Auto CRM login verification
//!
//! Opens the base URL, signs in through the labelled form, waits for the
//! dashboard heading and saves a screenshot as evidence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::locator::{AriaRole, Locator};
use crate::spec::{TestSpec, TestStep, Viewport};

pub const LOGIN_LABEL: &str = "Логин:";
pub const PASSWORD_LABEL: &str = "Пароль:";
pub const SUBMIT_BUTTON: &str = "Войти";
pub const DASHBOARD_HEADING: &str = "Vip-Auto CRM";
pub const DASHBOARD_TIMEOUT_MS: u64 = 10_000;
pub const SCREENSHOT_PATH: &str = "jules-scratch/verification/verification.png";

pub const DEFAULT_LOGIN: &str = "director";
pub const DEFAULT_PASSWORD: &str = "password";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

// Keep passwords out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Builder for the login scenario.
#[derive(Debug, Clone)]
pub struct LoginScenario {
    credentials: Credentials,
    heading_timeout_ms: u64,
    screenshot_path: PathBuf,
    viewport: Viewport,
}

impl Default for LoginScenario {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            heading_timeout_ms: DASHBOARD_TIMEOUT_MS,
            screenshot_path: PathBuf::from(SCREENSHOT_PATH),
            viewport: Viewport::default(),
        }
    }
}

impl LoginScenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn heading_timeout_ms(mut self, ms: u64) -> Self {
        self.heading_timeout_ms = ms;
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = path.into();
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn get_screenshot_path(&self) -> &std::path::Path {
        &self.screenshot_path
    }

    pub fn to_spec(&self) -> TestSpec {
        TestSpec {
            name: "login-flow".to_string(),
            description: "A user can log in and is redirected to the dashboard".to_string(),
            tags: vec!["auth".to_string(), "smoke".to_string()],
            viewport: self.viewport,
            steps: vec![
                TestStep::Navigate { url: String::new() },
                TestStep::Fill {
                    target: Locator::label(LOGIN_LABEL),
                    value: self.credentials.login.clone(),
                },
                TestStep::Fill {
                    target: Locator::label(PASSWORD_LABEL),
                    value: self.credentials.password.clone(),
                },
                TestStep::Click {
                    target: Locator::role(AriaRole::Button, SUBMIT_BUTTON),
                    timeout_ms: None,
                },
                TestStep::ExpectVisible {
                    target: Locator::role(AriaRole::Heading, DASHBOARD_HEADING),
                    timeout_ms: self.heading_timeout_ms,
                },
                TestStep::Screenshot {
                    path: self.screenshot_path.clone(),
                    full_page: false,
                },
            ],
            visual_regression: false,
            visual_threshold: 0.5,
        }
    }
}
