use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod completion;
mod config;
mod dispatch;
mod render;

use completion::CliCompletionShell;
use dispatch::run_cli;

const LOG_ENV: &str = "SKINPACK_LOG";

#[derive(Parser, Debug)]
#[command(name = "skinpack")]
#[command(version, about = "Installs skin packages into the desktop host", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "SKINPACK_CONFIG")]
    config: Option<PathBuf>,
    /// Show every step and enable debug diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a .rmskin package.
    Install {
        package: PathBuf,
        /// Carry variables over in merge installs too.
        #[arg(short = 'k', long = "keepvars")]
        keep_variables: bool,
        /// Never carry variables over.
        #[arg(short = 'n', long = "novariables", conflicts_with = "keep_variables")]
        no_variables: bool,
        /// Leave the host stopped after installing.
        #[arg(short = 'x', long = "norestart")]
        no_restart: bool,
        /// Snapshot resources before a merge install.
        #[arg(long)]
        snapshot_merge: bool,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show package metadata and where each entry would go.
    Inspect {
        package: PathBuf,
        /// Plugin platform tag to select.
        #[arg(long)]
        platform: Option<String>,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests;
