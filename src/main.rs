use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod cmd;

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(version, about = "Autonomous research agent - plan, research, write and review a report")]
pub struct Cli {
    /// Debug logging and per-run diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to a sleuth.toml. Defaults to <project-dir>/sleuth.toml, then the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a topic and write a report
    Run {
        /// Topic to research (prompted for when omitted)
        topic: Option<String>,

        /// Maximum revision rounds after the first draft
        #[arg(short, long)]
        max_iterations: Option<i64>,

        /// Report file (any path with an extension) or directory. Defaults to [report] output_dir.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use canned search results and skip the language model
        #[arg(long)]
        offline: bool,

        /// Research this many queries concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the report without saving it
        #[arg(long)]
        no_save: bool,

        /// Print the final state as JSON instead of the report
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show the stage graph and the state merge policy
    Graph,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default sleuth.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let _log_guard = sleuth::telemetry::init_tracing(cli.log_json, level, cli.log_file.as_deref());

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            topic,
            max_iterations,
            output,
            offline,
            concurrency,
            no_save,
            json,
        } => {
            let args = cmd::RunArgs {
                topic: topic.clone(),
                max_iterations: *max_iterations,
                output: output.clone(),
                offline: *offline,
                concurrency: *concurrency,
                save: !*no_save,
                json: *json,
            };
            cmd::cmd_run(&cli, &project_dir, args).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&cli, &project_dir, command.clone())?,
        Commands::Graph => cmd::cmd_graph()?,
    }

    Ok(())
}
