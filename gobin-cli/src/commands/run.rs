//! `gobin run` — the watch → sync pipeline in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use gobin_core::{config, ConfigLayer};
use gobin_runtime::{start_blocking, LogFormat};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Emit log lines as JSON objects.
    #[arg(long)]
    pub json_logs: bool,
}

impl RunArgs {
    pub fn run(self, flags: ConfigLayer) -> Result<()> {
        let config = config::resolve(flags).context("invalid configuration")?;
        let format = if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        start_blocking(config, format).context("gobin stopped with an error")?;
        Ok(())
    }
}
