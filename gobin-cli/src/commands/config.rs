//! `gobin config` — show what a run would use.

use anyhow::{Context, Result};
use clap::Args;

use gobin_core::{config, ConfigLayer};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit machine-readable JSON instead of YAML.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    pub fn run(self, flags: ConfigLayer) -> Result<()> {
        let config = config::resolve(flags).context("invalid configuration")?;
        let rendered = if self.json {
            serde_json::to_string_pretty(&config).context("failed to serialize config as JSON")?
        } else {
            serde_yaml::to_string(&config).context("failed to serialize config as YAML")?
        };
        println!("{}", rendered.trim_end());
        Ok(())
    }
}
