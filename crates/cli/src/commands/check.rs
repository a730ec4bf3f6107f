//! `check` - is the application answering?

use std::time::Duration;

use clap::Args;

use vipauto_e2e::server::wait_for_reachable;

use super::{base_config, GlobalArgs, Outcome};
use crate::output;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// How long to keep trying, in milliseconds
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,
}

pub async fn execute(args: CheckArgs, global: &GlobalArgs) -> anyhow::Result<Outcome> {
    let config = base_config(global)?;
    let url = &config.playwright.base_url;

    match wait_for_reachable(url, Duration::from_millis(args.timeout_ms)).await {
        Ok(()) => {
            output::print_success(&format!("{} is reachable", url));
            Ok(Outcome::Passed)
        }
        Err(e) => {
            output::print_error(&e.to_string());
            Ok(Outcome::Failed)
        }
    }
}
