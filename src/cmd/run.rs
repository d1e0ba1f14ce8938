//! One research run: `sleuth run`.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::super::Cli;
use sleuth::config::SleuthConfig;
use sleuth::orchestrator::{Orchestrator, RunOutcome};
use sleuth::report::save_report;
use sleuth::sleuth_config::SearchProviderKind;
use sleuth::state::{ReportStatus, ResearchState};
use sleuth::ui::ResearchProgress;
use sleuth::ui::icons::{CROSS, FILE, SPARKLE, WARN};
use sleuth::util::truncate_chars;

/// Characters of the report echoed to the terminal.
const REPORT_PREVIEW_CHARS: usize = 2000;
/// Characters of review feedback echoed to the terminal.
const FEEDBACK_PREVIEW_CHARS: usize = 500;

pub struct RunArgs {
    pub topic: Option<String>,
    pub max_iterations: Option<i64>,
    pub output: Option<PathBuf>,
    pub offline: bool,
    pub concurrency: Option<usize>,
    pub save: bool,
    pub json: bool,
}

fn prompt_for_topic() -> Result<String> {
    if !console::Term::stdout().is_term() {
        bail!("No topic given. Pass one as an argument: sleuth run \"<topic>\"");
    }
    let topic: String = dialoguer::Input::new()
        .with_prompt("Research topic")
        .interact_text()
        .context("Failed to read topic")?;
    Ok(topic)
}

/// Refuse to run online without a language-model key.
fn check_api_keys(config: &SleuthConfig) -> Result<()> {
    if config.offline {
        return Ok(());
    }
    if config.llm_api_key().is_none() {
        bail!(
            "{} is not set. Add it to your environment or .env file, or pass --offline.",
            config.toml.llm.api_key_env
        );
    }
    if config.toml.search.provider == SearchProviderKind::Auto && config.search_api_key().is_none() {
        eprintln!(
            "{}{} is not set; using canned search results.",
            WARN, config.toml.search.api_key_env
        );
    }
    Ok(())
}

pub async fn cmd_run(cli: &Cli, project_dir: &Path, args: RunArgs) -> Result<()> {
    let config = SleuthConfig::load(project_dir, cli.config.as_deref())?
        .with_offline(args.offline)
        .with_research_concurrency(args.concurrency);
    check_api_keys(&config)?;

    let topic = match args.topic {
        Some(topic) => topic,
        None => prompt_for_topic()?,
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        bail!("Topic must not be empty");
    }

    let max_iterations = args.max_iterations.unwrap_or(config.default_max_iterations());
    let initial = ResearchState::new(topic.as_str(), max_iterations)?;

    let mut orchestrator = Orchestrator::from_config(&config)?;
    if !args.json {
        println!();
        println!("{}Researching {}", SPARKLE, style(&topic).bold());
        println!();
        let first_pass = orchestrator.graph().order().len() as u64;
        orchestrator = orchestrator.with_observer(Arc::new(ResearchProgress::new(first_pass, cli.verbose)));
    }

    let outcome = orchestrator.run(initial).await?;

    let saved = match (args.save, outcome.state.best_report()) {
        (true, Some(report)) => {
            let target = args
                .output
                .unwrap_or_else(|| project_dir.join(config.report_dir()));
            Some(save_report(&target, &topic, report)?)
        }
        _ => None,
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize run outcome")?
        );
    } else {
        print_outcome(&outcome, saved.as_deref());
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, saved: Option<&Path>) {
    let state = &outcome.state;
    println!();

    match state.report_status() {
        ReportStatus::Accepted => println!("{}", style("Final report").bold().green()),
        ReportStatus::Draft => println!(
            "{}",
            style("Draft report (not accepted by review)").bold().yellow()
        ),
        ReportStatus::NoReport => println!("{}{}", CROSS, style("No report produced").bold().red()),
    }
    println!("Stopped: {}", outcome.halt);
    println!();

    if let Some(report) = state.best_report() {
        println!("{}", truncate_chars(report, REPORT_PREVIEW_CHARS));
        if report.chars().count() > REPORT_PREVIEW_CHARS {
            println!("{}", style("... (truncated, see saved file)").dim());
        }
        println!();
    }

    if let Some(feedback) = &state.review_feedback {
        println!("{}", style("Review feedback").bold());
        for line in textwrap::wrap(truncate_chars(feedback, FEEDBACK_PREVIEW_CHARS), 88) {
            println!("  {line}");
        }
        println!();
    }

    if !state.errors.is_empty() {
        println!("{}", style(format!("{} issue(s) during the run", state.errors.len())).yellow());
        for error in &state.errors {
            println!("  - {error}");
        }
        println!();
    }

    if let Some(path) = saved {
        println!("{}Saved report to {}", FILE, path.display());
    }
}
