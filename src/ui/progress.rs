use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::graph::HaltReason;
use crate::orchestrator::PipelineObserver;
use crate::stages::StageName;
use crate::state::{ResearchState, StepTag};
use crate::ui::icons::{CHECK, CROSS, PLAN, REVIEW, REVISE, SEARCH, WARN, WRITE};

/// Terminal progress for a research run, rendered via `indicatif`.
///
/// Two bars are stacked:
/// - Stage bar: stages completed out of the first-pass count
/// - Activity spinner: the running stage and its elapsed time
///
/// Revision rounds grow the stage bar's length so it never overflows.
pub struct ResearchProgress {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    spinner: ProgressBar,
    verbose: bool,
}

impl ResearchProgress {
    /// `first_pass` is the number of stages in one pass through the graph.
    pub fn new(first_pass: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        let stage_bar = multi.add(ProgressBar::new(first_pass));
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stages");

        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(spinner_style);
        spinner.set_prefix("   Now");

        Self {
            multi,
            stage_bar,
            spinner,
            verbose,
        }
    }

    /// Print a line above the bars, falling back to stderr if the UI is gone.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn describe(stage: StageName, state: &ResearchState) -> String {
        match stage {
            StageName::Plan => format!("{}Planning research on {}", PLAN, style(&state.topic).cyan()),
            StageName::Research => format!(
                "{}Researching {} queries",
                SEARCH,
                style(state.search_queries.len()).cyan()
            ),
            StageName::Write if state.needs_revision => format!(
                "{}Revising draft (round {}/{})",
                REVISE,
                style(state.iteration_count).cyan(),
                state.max_iterations
            ),
            StageName::Write => format!("{WRITE}Writing draft"),
            StageName::Review => format!("{REVIEW}Reviewing draft"),
        }
    }

    fn summarize(stage: StageName, state: &ResearchState) -> String {
        match (stage, state.current_step) {
            (StageName::Plan, _) => format!("{} queries planned", state.search_queries.len()),
            (StageName::Research, StepTag::ResearchFailed) => "no queries to research".to_string(),
            (StageName::Research, _) => format!(
                "{} results from {} sources",
                state.search_results.len(),
                state.sources.len()
            ),
            (StageName::Write, _) => format!(
                "{} chars",
                state.draft_report.as_deref().map(str::len).unwrap_or(0)
            ),
            (StageName::Review, StepTag::NeedsRevision) => "revision requested".to_string(),
            (StageName::Review, _) => "accepted".to_string(),
        }
    }
}

impl PipelineObserver for ResearchProgress {
    fn on_stage_start(&self, stage: StageName, state: &ResearchState) {
        if self.stage_bar.position() >= self.stage_bar.length().unwrap_or(0) {
            self.stage_bar.inc_length(1);
        }
        self.stage_bar.set_message(stage.to_string());
        self.spinner.set_message(Self::describe(stage, state));
        self.spinner.reset_elapsed();
        self.spinner.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_stage_finish(&self, stage: StageName, state: &ResearchState, elapsed: Duration) {
        self.stage_bar.inc(1);
        self.print_line(format!(
            "  {}{:<8} {} {}",
            CHECK,
            stage.to_string(),
            Self::summarize(stage, state),
            style(format!("({:.1}s)", elapsed.as_secs_f64())).dim()
        ));
    }

    fn on_halt(&self, reason: HaltReason, state: &ResearchState) {
        if self.verbose {
            for error in &state.errors {
                self.print_line(format!("    {} {}", style("→").dim(), style(error).dim()));
            }
        }
        self.spinner.finish_and_clear();
        let icon = match reason {
            HaltReason::Accepted => CHECK,
            HaltReason::RevisionBudgetExhausted => WARN,
            _ => CROSS,
        };
        self.stage_bar
            .finish_with_message(format!("{}{}", icon, style(reason.to_string()).bold()));
    }
}
