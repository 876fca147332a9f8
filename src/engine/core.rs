// src/engine/core.rs

//! Pure bookkeeping for one run.
//!
//! [`CoreRun`] knows which generators and child tasks exist, what phase each
//! one is in, and when the run is over. It performs no IO: the async shell in
//! [`runtime`](crate::engine::runtime) evaluates readiness, runs operations
//! and writes completion records, then reports the results back here.
//!
//! Keeping this synchronous means the run semantics (settling groups,
//! idle-round accounting, outcome precedence) can be unit tested without
//! Tokio or a store.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::engine::report::{RunOutcome, RunReport};
use crate::errors::Catcher;
use crate::readiness::DependencyState;
use crate::types::Identifier;

/// Lifecycle of a generator or child task within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    /// Not yet allowed to run.
    #[default]
    Pending,
    /// Generator has produced its children; they are not all finished.
    Running,
    Succeeded,
    /// Found nothing to do.
    Passed,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskPhase::Succeeded | TaskPhase::Passed | TaskPhase::Failed
        )
    }
}

#[derive(Debug, Default)]
struct Entry {
    phase: TaskPhase,
    last_state: Option<DependencyState>,
    evaluations: u32,
    errors: Catcher,
}

impl Entry {
    fn finish(&mut self, clean: TaskPhase, errors: &[String]) {
        for err in errors {
            self.errors.add(err);
        }
        self.phase = if self.errors.has_errors() {
            TaskPhase::Failed
        } else {
            clean
        };
    }
}

#[derive(Debug, Default)]
struct GeneratorEntry {
    entry: Entry,
    children: Vec<Identifier>,
}

#[derive(Debug)]
pub struct CoreRun {
    generators: BTreeMap<Identifier, GeneratorEntry>,
    children: BTreeMap<Identifier, Entry>,
    rounds: u32,
    idle_rounds: u32,
    max_idle_rounds: u32,
}

impl CoreRun {
    pub fn new<I, S>(generator_ids: I, max_idle_rounds: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        let generators = generator_ids
            .into_iter()
            .map(|id| (id.into(), GeneratorEntry::default()))
            .collect();
        Self {
            generators,
            children: BTreeMap::new(),
            rounds: 0,
            idle_rounds: 0,
            max_idle_rounds: max_idle_rounds.max(1),
        }
    }

    pub fn pending_generators(&self) -> Vec<Identifier> {
        self.generators
            .iter()
            .filter(|(_, g)| g.entry.phase == TaskPhase::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn pending_children(&self) -> Vec<Identifier> {
        self.children
            .iter()
            .filter(|(_, c)| c.phase == TaskPhase::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn phase(&self, id: &str) -> Option<TaskPhase> {
        self.generators
            .get(id)
            .map(|g| g.entry.phase)
            .or_else(|| self.children.get(id).map(|c| c.phase))
    }

    fn entry_mut(&mut self, id: &str) -> Option<&mut Entry> {
        match self.generators.get_mut(id) {
            Some(g) => Some(&mut g.entry),
            None => self.children.get_mut(id),
        }
    }

    /// Remember a readiness answer that did not let the task move on.
    pub fn observe(&mut self, id: &str, state: DependencyState) {
        if let Some(entry) = self.entry_mut(id) {
            entry.last_state = Some(state);
            entry.evaluations += 1;
        }
    }

    /// A generator ran (possibly partially) and produced `children`.
    pub fn generator_ran(&mut self, id: &str, children: Vec<Identifier>, errors: &[String]) {
        let Some(generator) = self.generators.get_mut(id) else {
            return;
        };
        generator.entry.phase = TaskPhase::Running;
        generator.entry.last_state = Some(DependencyState::Ready);
        for err in errors {
            generator.entry.errors.add(err);
        }
        for child in &children {
            self.children.entry(child.clone()).or_default();
        }
        generator.children.extend(children);
    }

    /// A generator found no matching documents.
    pub fn generator_passed(&mut self, id: &str, errors: &[String]) {
        if let Some(generator) = self.generators.get_mut(id) {
            generator.entry.last_state = Some(DependencyState::Passed);
            generator.entry.finish(TaskPhase::Passed, errors);
        }
    }

    pub fn child_executed(&mut self, id: &str, errors: &[String]) {
        if let Some(child) = self.children.get_mut(id) {
            child.last_state = Some(DependencyState::Ready);
            child.finish(TaskPhase::Succeeded, errors);
        }
    }

    pub fn child_passed(&mut self, id: &str, errors: &[String]) {
        if let Some(child) = self.children.get_mut(id) {
            child.last_state = Some(DependencyState::Passed);
            child.finish(TaskPhase::Passed, errors);
        }
    }

    /// Generators whose children have all finished but which have not been
    /// finalized, with whether anything in the group went wrong.
    pub fn settled_generators(&self) -> Vec<(Identifier, bool)> {
        self.generators
            .iter()
            .filter(|(_, g)| g.entry.phase == TaskPhase::Running)
            .filter(|(_, g)| {
                g.children
                    .iter()
                    .all(|c| self.children.get(c).is_some_and(|e| e.phase.is_terminal()))
            })
            .map(|(id, g)| (id.clone(), g.entry.errors.has_errors() || self.failed_children(g) > 0))
            .collect()
    }

    fn failed_children(&self, generator: &GeneratorEntry) -> usize {
        generator
            .children
            .iter()
            .filter(|c| {
                self.children
                    .get(*c)
                    .is_some_and(|e| e.phase == TaskPhase::Failed)
            })
            .count()
    }

    /// Close a settled generator; `errors` are failures recording its own
    /// completion.
    pub fn finalize_generator(&mut self, id: &str, errors: &[String]) {
        let failed = match self.generators.get(id) {
            Some(generator) => self.failed_children(generator),
            None => return,
        };
        if let Some(generator) = self.generators.get_mut(id) {
            if failed > 0 {
                generator
                    .entry
                    .errors
                    .add(format!("{failed} child task(s) failed"));
            }
            generator.entry.finish(TaskPhase::Succeeded, errors);
            debug!(generator = %id, phase = ?generator.entry.phase, "generator finalized");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.generators.values().all(|g| g.entry.phase.is_terminal())
            && self.children.values().all(|c| c.phase.is_terminal())
    }

    /// Close a round. Returns `false` once too many consecutive rounds made
    /// no progress.
    pub fn end_round(&mut self, progressed: bool) -> bool {
        self.rounds += 1;
        if progressed {
            self.idle_rounds = 0;
        } else {
            self.idle_rounds += 1;
        }
        self.idle_rounds < self.max_idle_rounds
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn report(&self, canceled: bool) -> RunReport {
        let mut succeeded = Vec::new();
        let mut passed = Vec::new();
        let mut failed = BTreeMap::new();
        let mut blocked = BTreeMap::new();

        let generator_entries = self.generators.iter().map(|(id, g)| (id, &g.entry));
        for (id, entry) in generator_entries.chain(self.children.iter()) {
            match entry.phase {
                TaskPhase::Succeeded => {
                    if !self.generators.contains_key(id) {
                        succeeded.push(id.clone());
                    }
                }
                TaskPhase::Passed => passed.push(id.clone()),
                TaskPhase::Failed => {
                    failed.insert(id.clone(), entry.errors.errors().to_vec());
                }
                TaskPhase::Pending | TaskPhase::Running => {
                    blocked.insert(id.clone(), entry.last_state);
                }
            }
        }

        let outcome = if canceled {
            RunOutcome::Canceled
        } else if !blocked.is_empty() {
            RunOutcome::CompletedButBlocked
        } else if !failed.is_empty() {
            RunOutcome::CompletedWithErrors
        } else {
            RunOutcome::Succeeded
        };

        RunReport {
            outcome,
            succeeded,
            passed,
            failed,
            blocked,
            generators: self
                .generators
                .iter()
                .map(|(id, g)| (id.clone(), g.entry.phase))
                .collect(),
            rounds: self.rounds,
        }
    }
}
