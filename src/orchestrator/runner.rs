//! The drive loop.
//!
//! Starting at the graph's entry stage the orchestrator repeatedly runs the
//! current stage, checks its update against the stage's declared writes,
//! merges it, and asks the stage's transition rule what comes next. The run
//! ends on the first halt. It only returns an error when a stage breaks its
//! contract; every domain failure ends as a halted state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::observer::{NoopObserver, PipelineObserver};
use crate::config::SleuthConfig;
use crate::errors::{ConfigurationError, PipelineError};
use crate::graph::{HaltReason, Next, StageGraph, TransitionRule};
use crate::llm::LanguageModel;
use crate::search::SearchProvider;
use crate::stages::{
    PlanStage, ResearchStage, ReviewStage, Stage, StageName, StageSettings, WriteStage,
};
use crate::state::{ResearchState, StateField, StateUpdate, StepTag};

/// One executed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub stage: StageName,
    pub step: StepTag,
    pub elapsed: Duration,
}

/// Final state of a run plus how it got there.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: ResearchState,
    pub halt: HaltReason,
    pub steps: Vec<StepRecord>,
}

impl RunOutcome {
    /// How many times `stage` ran.
    pub fn invocations(&self, stage: StageName) -> usize {
        self.steps.iter().filter(|s| s.stage == stage).count()
    }
}

pub struct Orchestrator {
    graph: StageGraph,
    observer: Arc<dyn PipelineObserver>,
}

impl Orchestrator {
    pub fn new(graph: StageGraph) -> Self {
        Self {
            graph,
            observer: Arc::new(NoopObserver),
        }
    }

    /// The fixed plan → research → write ⇄ review pipeline.
    pub fn standard(
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        settings: StageSettings,
        min_search_results: usize,
    ) -> Result<Self, ConfigurationError> {
        let settings = Arc::new(settings);
        let graph = StageGraph::builder()
            .entry(StageName::Plan)
            .stage(
                Arc::new(PlanStage::new(llm.clone(), settings.clone())),
                TransitionRule::standard(StageName::Plan),
            )
            .stage(
                Arc::new(ResearchStage::new(search, llm.clone(), settings.clone())),
                TransitionRule::EvidenceGate {
                    min_results: min_search_results,
                    then: StageName::Write,
                },
            )
            .stage(
                Arc::new(WriteStage::new(llm.clone(), settings.clone())),
                TransitionRule::standard(StageName::Write),
            )
            .stage(
                Arc::new(ReviewStage::new(llm, settings)),
                TransitionRule::standard(StageName::Review),
            )
            .build()?;
        Ok(Self::new(graph))
    }

    /// The standard pipeline with collaborators built from `config`.
    pub fn from_config(config: &SleuthConfig) -> Result<Self, ConfigurationError> {
        Self::standard(
            config.language_model()?,
            config.search_provider()?,
            config.stage_settings(),
            config.min_search_results(),
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Drive `initial` through the graph until a transition rule halts.
    pub async fn run(&self, initial: ResearchState) -> Result<RunOutcome, PipelineError> {
        let span = info_span!("research_run", run_id = %Uuid::new_v4(), topic = %initial.topic);
        self.drive(initial).instrument(span).await
    }

    async fn drive(&self, mut state: ResearchState) -> Result<RunOutcome, PipelineError> {
        let limit = self.graph.max_invocations(state.max_iterations);
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut current = self.graph.entry();

        info!(max_iterations = state.max_iterations, "starting research run");

        loop {
            if steps.len() >= limit {
                return Err(PipelineError::StepLimitExceeded { limit });
            }
            let stage = self
                .graph
                .stage(current)
                .ok_or(ConfigurationError::MissingStage(current))?;

            self.observer.on_stage_start(current, &state);
            let started = Instant::now();
            let outcome = stage
                .run(&state)
                .instrument(info_span!("stage", stage = %current))
                .await;
            let elapsed = started.elapsed();

            let update = outcome.into_update();
            check_declared(stage.as_ref(), &update)?;
            state.apply(update);

            info!(stage = %current, step = %state.current_step, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
            steps.push(StepRecord {
                stage: current,
                step: state.current_step,
                elapsed,
            });
            self.observer.on_stage_finish(current, &state, elapsed);

            let rule = self
                .graph
                .rule(current)
                .ok_or(ConfigurationError::MissingStage(current))?;
            match rule.decide(&state) {
                Next::Stage(next) => current = next,
                Next::Halt(halt) => {
                    info!(%halt, stages = steps.len(), errors = state.errors.len(), "research run halted");
                    self.observer.on_halt(halt, &state);
                    return Ok(RunOutcome { state, halt, steps });
                }
            }
        }
    }
}

/// Reject updates touching fields the stage did not declare.
fn check_declared(stage: &dyn Stage, update: &StateUpdate) -> Result<(), ConfigurationError> {
    let declared = stage.writes();
    match update
        .touched_fields()
        .into_iter()
        .find(|f| *f != StateField::CurrentStep && !declared.contains(f))
    {
        Some(field) => Err(ConfigurationError::UndeclaredField {
            stage: stage.name(),
            field,
        }),
        None => Ok(()),
    }
}

/// Run a full research pipeline with collaborators built from `config`.
///
/// Returns only the final state. Callers that need the halt reason, the step
/// log or a progress observer build the pipeline with
/// [`Orchestrator::from_config`] and call [`Orchestrator::run`] instead.
pub async fn run_research(
    topic: &str,
    max_iterations: i64,
    config: &SleuthConfig,
) -> Result<ResearchState, PipelineError> {
    let initial = ResearchState::new(topic, max_iterations)?;
    let orchestrator = Orchestrator::from_config(config)?;
    Ok(orchestrator.run(initial).await?.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;
    use crate::stages::StageOutcome;
    use crate::test_support::{ScriptedModel, ScriptedSearch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn orchestrator(model: ScriptedModel, search: ScriptedSearch) -> Orchestrator {
        Orchestrator::standard(Arc::new(model), Arc::new(search), StageSettings::default(), 3).unwrap()
    }

    #[tokio::test]
    async fn test_accepted_on_first_review() {
        let model = ScriptedModel::new()
            .reply(PromptRole::Writer, "# Report")
            .reply(PromptRole::Reviewer, "Excellent.");
        let outcome = orchestrator(model, ScriptedSearch::hits(3))
            .run(ResearchState::new("X", 2).unwrap())
            .await
            .unwrap();

        assert_eq!(outcome.halt, HaltReason::Accepted);
        let stages: Vec<_> = outcome.steps.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![StageName::Plan, StageName::Research, StageName::Write, StageName::Review]
        );
        assert!(outcome.state.final_report.unwrap().ends_with("# Report"));
        assert_eq!(outcome.state.current_step, StepTag::ReviewComplete);
    }

    #[tokio::test]
    async fn test_revision_loop_bounded() {
        let model = ScriptedModel::new()
            .reply(PromptRole::Reviewer, "needs improvement")
            .reply(PromptRole::Reviewer, "needs improvement")
            .reply(PromptRole::Reviewer, "needs improvement");
        let outcome = orchestrator(model, ScriptedSearch::hits(3))
            .run(ResearchState::new("X", 2).unwrap())
            .await
            .unwrap();

        assert_eq!(outcome.halt, HaltReason::RevisionBudgetExhausted);
        assert_eq!(outcome.invocations(StageName::Write), 2);
        assert_eq!(outcome.state.iteration_count, 2);
        assert!(outcome.state.final_report.is_none());
        assert!(outcome.state.draft_report.is_some());
    }

    #[tokio::test]
    async fn test_observer_sees_every_stage() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);
        impl PipelineObserver for Recorder {
            fn on_stage_start(&self, stage: StageName, _state: &ResearchState) {
                self.0.lock().unwrap().push(format!("start {stage}"));
            }
            fn on_halt(&self, reason: HaltReason, _state: &ResearchState) {
                self.0.lock().unwrap().push(format!("halt {reason}"));
            }
        }

        let recorder = Arc::new(Recorder::default());
        let orchestrator = orchestrator(ScriptedModel::new(), ScriptedSearch::failing())
            .with_observer(recorder.clone());
        orchestrator.run(ResearchState::new("X", 1).unwrap()).await.unwrap();

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start plan",
                "start research",
                "halt insufficient evidence (0 of 3 results)"
            ]
        );
    }

    struct Rogue;

    #[async_trait]
    impl Stage for Rogue {
        fn name(&self) -> StageName {
            StageName::Plan
        }

        fn writes(&self) -> &'static [StateField] {
            &[StateField::PlanSummary]
        }

        async fn run(&self, _state: &ResearchState) -> StageOutcome {
            StageOutcome::new(StateUpdate::new().final_report("sneaky"), StepTag::PlanningComplete)
        }
    }

    #[tokio::test]
    async fn test_undeclared_write_aborts_run() {
        let graph = StageGraph::builder()
            .entry(StageName::Plan)
            .stage(
                Arc::new(Rogue),
                TransitionRule::RevisionLoop {
                    revise: StageName::Plan,
                },
            )
            .build();
        // a revision loop back to the entry is itself forbidden
        assert!(graph.is_err());

        let settings = Arc::new(StageSettings::default());
        let graph = StageGraph::builder()
            .entry(StageName::Plan)
            .stage(Arc::new(Rogue), TransitionRule::standard(StageName::Plan))
            .stage(
                Arc::new(ResearchStage::new(
                    Arc::new(ScriptedSearch::hits(3)),
                    Arc::new(ScriptedModel::new()),
                    settings.clone(),
                )),
                TransitionRule::standard(StageName::Research),
            )
            .stage(
                Arc::new(WriteStage::new(Arc::new(ScriptedModel::new()), settings.clone())),
                TransitionRule::standard(StageName::Write),
            )
            .stage(
                Arc::new(ReviewStage::new(Arc::new(ScriptedModel::new()), settings)),
                TransitionRule::standard(StageName::Review),
            )
            .build()
            .unwrap();

        let err = Orchestrator::new(graph)
            .run(ResearchState::new("X", 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::UndeclaredField {
                stage: StageName::Plan,
                field: StateField::FinalReport
            })
        ));
    }

    #[test]
    fn test_check_declared_allows_current_step() {
        let update = StateUpdate::new().plan_summary("p").current_step(StepTag::PlanningComplete);
        assert!(check_declared(&Rogue, &update).is_ok());
    }

    /// Review stand-in that always asks for a revision without counting it.
    struct Stuck;

    #[async_trait]
    impl Stage for Stuck {
        fn name(&self) -> StageName {
            StageName::Review
        }

        fn writes(&self) -> &'static [StateField] {
            &[StateField::NeedsRevision, StateField::ReviewFeedback]
        }

        async fn run(&self, _state: &ResearchState) -> StageOutcome {
            StageOutcome::new(
                StateUpdate::new().needs_revision(true).review_feedback("again"),
                StepTag::NeedsRevision,
            )
        }
    }

    fn stuck_graph() -> StageGraph {
        let settings = Arc::new(StageSettings::default());
        StageGraph::builder()
            .entry(StageName::Plan)
            .stage(
                Arc::new(PlanStage::new(Arc::new(ScriptedModel::new()), settings.clone())),
                TransitionRule::standard(StageName::Plan),
            )
            .stage(
                Arc::new(ResearchStage::new(
                    Arc::new(ScriptedSearch::hits(3)),
                    Arc::new(ScriptedModel::new()),
                    settings.clone(),
                )),
                TransitionRule::standard(StageName::Research),
            )
            .stage(
                Arc::new(WriteStage::new(Arc::new(ScriptedModel::new()), settings)),
                TransitionRule::standard(StageName::Write),
            )
            .stage(Arc::new(Stuck), TransitionRule::standard(StageName::Review))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_step_limit_stops_runaway_revision_loop() {
        for k in 1..=3u32 {
            let orchestrator = Orchestrator::new(stuck_graph());
            let run = orchestrator.run(ResearchState::new("X", i64::from(k)).unwrap());
            let err = tokio::time::timeout(Duration::from_secs(5), run)
                .await
                .expect("run must terminate")
                .unwrap_err();
            let expected = 4 + 2 * k as usize;
            assert!(
                matches!(err, PipelineError::StepLimitExceeded { limit } if limit == expected),
                "k={k}: {err}"
            );
        }
    }
}
