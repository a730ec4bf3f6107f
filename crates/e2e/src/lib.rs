//! Vip-Auto CRM E2E verification
//!
//! This crate drives a real browser through the CRM's login flow and keeps a
//! screenshot as evidence. It:
//! - Resolves the target from `BASE_URL` (fallback `http://localhost:3000`)
//! - Optionally starts the application and waits until it answers
//! - Renders declarative YAML scenarios into one Playwright session
//! - Checks the captured screenshot and compares it with a baseline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TestRunner                               │
//! │    ├── prepare()   -> ServerHandle (optional)               │
//! │    │                  wait_for_reachable (opt-in)           │
//! │    │                  login_preflight (optional)            │
//! │    ├── run_spec()  -> PlaywrightHandle::run(steps)          │
//! │    │                  Evidence::inspect(screenshot)         │
//! │    │                  BaselineComparer::compare (optional)  │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    └── steps: navigate | fill | click | press               │
//! │               expect_visible | expect_hidden | expect_text  │
//! │               sleep | screenshot | log                      │
//! │  Locator: role+name | label | placeholder | text | css      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod evidence;
pub mod locator;
pub mod login;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;

pub use error::{E2eError, E2eResult};
pub use login::{Credentials, LoginScenario};
pub use runner::{RunnerConfig, TestRunner, TestSuiteResult};
pub use spec::{TestSpec, TestStep};
