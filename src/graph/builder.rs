//! Stage registry construction and validation.
//!
//! A [`StageGraph`] can only be obtained from [`StageGraphBuilder::build`],
//! which rejects malformed wiring up front:
//! - missing or unregistered entry stage
//! - a stage registered twice
//! - a stage declaring writes to `topic` or `max_iterations`
//! - a transition to an unregistered stage
//! - any cycle other than one revision loop that stays after the evidence gate

use std::collections::BTreeMap;
use std::sync::Arc;

use super::TransitionRule;
use crate::errors::ConfigurationError;
use crate::stages::{Stage, StageName};

struct Node {
    stage: Arc<dyn Stage>,
    rule: TransitionRule,
}

/// Validated stage registry with one transition rule per stage.
pub struct StageGraph {
    entry: StageName,
    nodes: BTreeMap<StageName, Node>,
    /// Stages in first-pass order, following forward edges from the entry.
    order: Vec<StageName>,
    /// Stages re-run per revision round.
    loop_len: usize,
}

impl StageGraph {
    pub fn builder() -> StageGraphBuilder {
        StageGraphBuilder::default()
    }

    pub fn entry(&self) -> StageName {
        self.entry
    }

    pub fn stage(&self, name: StageName) -> Option<&Arc<dyn Stage>> {
        self.nodes.get(&name).map(|node| &node.stage)
    }

    pub fn rule(&self, name: StageName) -> Option<TransitionRule> {
        self.nodes.get(&name).map(|node| node.rule)
    }

    /// Stages in first-pass order.
    pub fn order(&self) -> &[StageName] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Upper bound on stage invocations for a run with this revision budget.
    pub fn max_invocations(&self, max_iterations: u32) -> usize {
        self.order.len() + self.loop_len * max_iterations as usize
    }
}

#[derive(Default)]
pub struct StageGraphBuilder {
    entry: Option<StageName>,
    nodes: Vec<(Arc<dyn Stage>, TransitionRule)>,
}

impl StageGraphBuilder {
    pub fn entry(mut self, name: StageName) -> Self {
        self.entry = Some(name);
        self
    }

    pub fn stage(mut self, stage: Arc<dyn Stage>, rule: TransitionRule) -> Self {
        self.nodes.push((stage, rule));
        self
    }

    pub fn build(self) -> Result<StageGraph, ConfigurationError> {
        let mut nodes = BTreeMap::new();
        for (stage, rule) in self.nodes {
            let name = stage.name();
            if let Some(field) = stage.writes().iter().find(|f| f.is_immutable()) {
                return Err(ConfigurationError::ImmutableField {
                    stage: name,
                    field: *field,
                });
            }
            if nodes.insert(name, Node { stage, rule }).is_some() {
                return Err(ConfigurationError::DuplicateStage(name));
            }
        }

        let entry = self
            .entry
            .filter(|e| nodes.contains_key(e))
            .ok_or(ConfigurationError::MissingEntry)?;

        for node in nodes.values() {
            let target = node.rule.target();
            if !nodes.contains_key(&target) {
                return Err(ConfigurationError::MissingStage(target));
            }
        }

        // Walk forward edges from the entry. The walk ends at the stage whose
        // rule is the revision loop (or the last stage if there is none).
        let mut order = vec![entry];
        let mut gate_position = 0;
        let mut loop_len = 0;
        let mut current = entry;
        loop {
            let rule = nodes[&current].rule;
            let target = rule.target();
            let seen = order.iter().position(|s| *s == target);

            if rule.is_revision_loop() {
                let here = order.len() - 1;
                match seen {
                    Some(pos) if pos > gate_position && pos <= here => {
                        loop_len = here - pos + 1;
                    }
                    _ => {
                        return Err(ConfigurationError::ForbiddenCycle {
                            from: current,
                            to: target,
                        });
                    }
                }
                break;
            }

            if seen.is_some() {
                return Err(ConfigurationError::ForbiddenCycle {
                    from: current,
                    to: target,
                });
            }
            if matches!(rule, TransitionRule::EvidenceGate { .. }) {
                gate_position = order.len() - 1;
            }
            order.push(target);
            current = target;
        }

        Ok(StageGraph {
            entry,
            nodes,
            order,
            loop_len,
        })
    }
}
