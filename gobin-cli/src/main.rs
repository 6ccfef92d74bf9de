//! gobin — mirror a local directory to a remote host as it changes.
//!
//! # Usage
//!
//! ```text
//! gobin [-H host] [-u user] [-i identity] [-s source] [-t target] [--watchman path]
//! gobin run [flags]
//! gobin config [--json] [flags]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{config::ConfigArgs, run::RunArgs};
use gobin_core::ConfigLayer;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gobin",
    version,
    about = "Watch a directory with Watchman and copy every change to a remote host over ssh",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch and sync until interrupted (the default).
    Run(RunArgs),

    /// Print the resolved configuration.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Settings shared by every command; they form the top configuration layer
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Remote host name or ~/.ssh/config alias.
    #[arg(short = 'H', long, global = true)]
    pub hostname: Option<String>,

    /// Remote user.
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Private key used for the ssh session.
    #[arg(short, long = "identity-file", global = true)]
    pub identity_file: Option<String>,

    /// Local directory to watch. Defaults to the working directory.
    #[arg(short, long, global = true)]
    pub source: Option<PathBuf>,

    /// Remote directory. Defaults to the source directory's name.
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Watchman executable.
    #[arg(long, global = true)]
    pub watchman: Option<String>,
}

impl From<SettingsArgs> for ConfigLayer {
    fn from(args: SettingsArgs) -> Self {
        ConfigLayer {
            hostname: args.hostname,
            user: args.user,
            identityfile: args.identity_file,
            source: args.source,
            target: args.target,
            watchman: args.watchman,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let flags = ConfigLayer::from(cli.settings);
    match cli.command {
        None => RunArgs::default().run(flags),
        Some(Commands::Run(args)) => args.run(flags),
        Some(Commands::Config(args)) => args.run(flags),
    }
}
