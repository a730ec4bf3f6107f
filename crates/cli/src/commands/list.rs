//! `list` - scenarios found in the specs directory

use std::path::PathBuf;

use clap::Args;

use vipauto_e2e::TestSpec;

use super::{base_config, GlobalArgs, Outcome};
use crate::output;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path to test specs directory
    #[arg(short, long)]
    pub specs: Option<PathBuf>,

    /// Only list specs carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub fn execute(args: ListArgs, global: &GlobalArgs) -> anyhow::Result<Outcome> {
    let config = base_config(global)?;
    let dir = args.specs.unwrap_or(config.specs_dir);

    let specs = TestSpec::load_all(&dir)?;
    let selected: Vec<&TestSpec> = match &args.tag {
        Some(tag) => TestSpec::filter_by_tag(&specs, tag),
        None => specs.iter().collect(),
    };

    output::print_specs(&selected, global.format);
    Ok(Outcome::Passed)
}
