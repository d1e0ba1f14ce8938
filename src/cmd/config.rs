//! Configuration view and validation commands: `sleuth config`.

use anyhow::Result;
use std::path::Path;

use super::super::{Cli, ConfigCommands};
use sleuth::config::SleuthConfig;
use sleuth::sleuth_config::{CONFIG_FILE_NAME, SleuthToml};

pub fn cmd_config(cli: &Cli, project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = SleuthConfig::load(project_dir, cli.config.as_deref())?;
            let toml = &config.toml;

            println!();
            println!("Sleuth Configuration");
            println!("====================");
            println!();
            match &config.source {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No {CONFIG_FILE_NAME} found; using defaults."),
            }
            println!();

            println!("[llm]");
            println!("  endpoint = \"{}\"", toml.llm.endpoint);
            println!("  model = \"{}\"", config.model());
            println!("  api_key_env = \"{}\"", toml.llm.api_key_env);
            println!("  timeout_secs = {}", toml.llm.timeout_secs);
            println!();

            println!("[search]");
            println!("  provider = \"{}\"", toml.search.provider);
            println!("  max_results_per_query = {}", toml.search.max_results_per_query);
            println!("  search_depth = \"{}\"", toml.search.search_depth);
            println!();

            println!("[pipeline]");
            println!("  max_iterations = {}", toml.pipeline.max_iterations);
            println!("  min_search_results = {}", toml.pipeline.min_search_results);
            println!("  max_sources = {}", toml.pipeline.max_sources);
            println!("  research_concurrency = {}", toml.pipeline.research_concurrency);
            println!("  scoring = \"{}\"", toml.pipeline.scoring);
            println!();

            println!("[report]");
            println!("  output_dir = \"{}\"", toml.report.output_dir.display());
            println!("  language = \"{}\"", toml.report.language);
            println!();

            println!("Keys:");
            let status = |present: bool| if present { "set" } else { "missing" };
            println!("  {} = {}", toml.llm.api_key_env, status(config.llm_api_key().is_some()));
            println!("  {} = {}", toml.search.api_key_env, status(config.search_api_key().is_some()));
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let config = SleuthConfig::load(project_dir, cli.config.as_deref())?;
            println!();
            if config.source.is_none() {
                println!("No {CONFIG_FILE_NAME} found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME));
            if config_path.exists() {
                println!("{} already exists.", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            SleuthToml::default().save(&config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [llm] model, endpoint, temperatures");
            println!("  - [search] provider, max_results_per_query");
            println!("  - [pipeline] max_iterations, research_concurrency, scoring");
            println!("  - [report] output_dir, language");
            println!();
        }
    }

    Ok(())
}
