//! `run` - YAML scenarios from the specs directory

use std::path::PathBuf;

use clap::Args;

use vipauto_e2e::TestRunner;

use super::{build_config, GlobalArgs, Outcome, SessionArgs};
use crate::output;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to test specs directory
    #[arg(short, long)]
    pub specs: Option<PathBuf>,

    /// Run only specs carrying this tag
    #[arg(short, long, conflicts_with = "name")]
    pub tag: Option<String>,

    /// Run only the spec with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Overwrite visual baselines with this run's screenshots
    #[arg(long)]
    pub update_baselines: bool,

    /// Directory holding baseline screenshots
    #[arg(long)]
    pub baseline_dir: Option<PathBuf>,

    /// Visual diff threshold (percentage)
    #[arg(long)]
    pub visual_threshold: Option<f64>,

    #[command(flatten)]
    pub session: SessionArgs,
}

pub async fn execute(args: RunArgs, global: &GlobalArgs) -> anyhow::Result<Outcome> {
    let mut config = build_config(global, &args.session)?;

    if let Some(dir) = args.specs {
        config.specs_dir = dir;
    }
    if let Some(dir) = args.baseline_dir {
        config.evidence.baseline_dir = dir;
    }
    if let Some(threshold) = args.visual_threshold {
        anyhow::ensure!(
            (0.0..=100.0).contains(&threshold),
            "--visual-threshold must be between 0 and 100"
        );
        config.evidence.threshold = threshold;
    }
    config.evidence.auto_update = args.update_baselines;

    let mut runner = TestRunner::with_config(config);

    let suite = if let Some(name) = args.name {
        runner.run_named(&name).await?
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    runner.write_results(&suite)?;

    output::print_suite(&suite, global.format);
    Ok(Outcome::of_suite(&suite))
}
