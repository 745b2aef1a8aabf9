use clap::Args;

use super::{get_config, output_result};
use crate::Cli;

/// Prints the configuration the other commands would run with.
#[derive(Args)]
pub struct ConfigCommand {}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        output_result(&cfg, cli.output.as_deref(), cli.json)
    }
}
