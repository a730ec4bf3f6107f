//! `login` - the built-in login verification

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use vipauto_e2e::login::{DASHBOARD_TIMEOUT_MS, SCREENSHOT_PATH};
use vipauto_e2e::{Credentials, LoginScenario, TestRunner};

use super::{build_config, GlobalArgs, Outcome, SessionArgs};
use crate::output;

/// Password source when `--password` is not given
pub const PASSWORD_ENV: &str = "VIPAUTO_PASSWORD";

#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    /// Login to submit (default: director)
    #[arg(long)]
    pub login: Option<String>,

    /// Password to submit (default: password)
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// How long to wait for the dashboard heading, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Where to save the screenshot
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Flag, then `VIPAUTO_PASSWORD`, then the built-in account.
///
/// The environment is read here as well because running without a
/// subcommand builds [`LoginArgs`] without clap.
fn credentials(login: Option<String>, password: Option<String>, env_password: Option<String>) -> Credentials {
    let defaults = Credentials::default();
    Credentials {
        login: login.unwrap_or(defaults.login),
        password: password.or(env_password).unwrap_or(defaults.password),
    }
}

pub async fn execute(args: LoginArgs, global: &GlobalArgs) -> anyhow::Result<Outcome> {
    let mut config = build_config(global, &args.session)?;

    let credentials = credentials(args.login, args.password, std::env::var(PASSWORD_ENV).ok());
    config.credentials = credentials.clone();

    let scenario = LoginScenario::new()
        .credentials(credentials)
        .heading_timeout_ms(args.timeout_ms.unwrap_or(DASHBOARD_TIMEOUT_MS))
        .screenshot_path(args.screenshot.unwrap_or_else(|| PathBuf::from(SCREENSHOT_PATH)));

    info!("Verifying login at {}", config.playwright.base_url);

    let mut runner = TestRunner::with_config(config);
    let suite = runner.run_login(&scenario).await?;
    runner.write_results(&suite)?;

    output::print_suite(&suite, global.format);
    Ok(Outcome::of_suite(&suite))
}
