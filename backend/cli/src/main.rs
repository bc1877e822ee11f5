mod check_cmd;
mod console;
mod run_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Nudge: inactivity-triggered outreach for chat groups")]
#[command(version)]
struct Cli {
    /// Config file (defaults to `$NUDGE_CONFIG_DIR/config.yaml` or `~/.nudge/config.yaml`)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the errors and warnings found
    Check {
        /// Print the validation report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the scheduler against the terminal: `<group> <user> <text>` lines
    /// on stdin are group messages, reminders are printed to stdout
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| nudge_config::config_file_path(&nudge_config::config_dir()));

    match cli.command {
        Commands::Check { json } => {
            if !check_cmd::run(&config_path, json).await? {
                std::process::exit(1);
            }
        }
        Commands::Run => run_cmd::run(&config_path).await?,
    }

    Ok(())
}
