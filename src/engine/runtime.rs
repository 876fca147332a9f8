// src/engine/runtime.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::errors::{Catcher, MigradagError, Result, StoreError};
use crate::generator::{Generator, MigrationTask};
use crate::readiness::DependencyState;
use crate::store::finish_migration;
use crate::types::{Identifier, ValidationPolicy};

use super::core::CoreRun;
use super::{Environment, RunReport, RuntimeOptions};

/// Local driver standing in for a job queue.
///
/// Each round it:
/// - evaluates pending generators and runs the ready ones,
/// - evaluates pending child tasks (up to `workers` at a time) and applies
///   the ready ones through their registered operation,
/// - writes a completion record for every generator whose children have all
///   finished.
///
/// A generator's own completion record is only written once its whole group
/// has settled, so naming a generator in `depends_on` means "wait for every
/// document of that migration".
///
/// All run semantics live in [`CoreRun`]; this type only performs the IO.
pub struct Runtime {
    env: Environment,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("env", &self.env)
            .field("options", &self.options)
            .finish()
    }
}

enum ChildVerdict {
    Executed(Catcher),
    Passed(Catcher),
    Waiting(DependencyState),
    Canceled,
}

struct ChildOutcome {
    id: Identifier,
    verdict: ChildVerdict,
}

impl Runtime {
    pub fn new(env: Environment, options: RuntimeOptions) -> Self {
        Self { env, options }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Register the generators in the dependency graph and check it.
    ///
    /// With [`ValidationPolicy::Require`] an invalid graph is an error; with
    /// `Warn` the problems are logged and the run proceeds.
    pub fn prepare(&self, generators: &[Generator]) -> Result<()> {
        let mut seen = HashSet::new();
        for generator in generators {
            if !seen.insert(generator.id()) {
                return Err(MigradagError::ConfigError(format!(
                    "migration '{}' is defined more than once",
                    generator.id()
                )));
            }
            let graph = self.env.graph();
            graph.add_node(generator.id());
            graph.add(generator.id(), generator.depends_on().iter().cloned());

            let operation = &generator.options().operation;
            if !self.env.registry().contains(operation) {
                warn!(
                    generator = %generator.id(),
                    operation = %operation,
                    "no operation registered; its tasks will fail"
                );
            }
        }

        match (self.env.graph().validate(), self.options.validation) {
            (Ok(()), _) => Ok(()),
            (Err(err), ValidationPolicy::Require) => Err(err.into()),
            (Err(err), ValidationPolicy::Warn) => {
                for problem in &err.problems {
                    warn!(%problem, "dependency graph problem; continuing anyway");
                }
                Ok(())
            }
        }
    }

    /// Drive every generator and its children until all are finished, the
    /// run stops making progress, or `ctx` is cancelled.
    ///
    /// Cancellation is reported through [`RunOutcome::Canceled`] in the
    /// returned report, not as an error.
    ///
    /// [`RunOutcome::Canceled`]: crate::engine::RunOutcome::Canceled
    pub async fn run(&self, ctx: &RunContext, generators: Vec<Generator>) -> Result<RunReport> {
        self.prepare(&generators)?;

        let mut core = CoreRun::new(
            generators.iter().map(|g| g.id().to_string()),
            self.options.max_idle_rounds,
        );
        let generators: BTreeMap<Identifier, Generator> = generators
            .into_iter()
            .map(|g| (g.id().to_string(), g))
            .collect();
        let mut tasks: BTreeMap<Identifier, MigrationTask> = BTreeMap::new();

        info!(
            migrations = generators.len(),
            workers = self.options.workers,
            "migration run started"
        );

        let canceled = loop {
            if ctx.is_canceled() {
                break true;
            }

            let mut progressed = false;

            match self.generator_round(ctx, &generators, &mut core, &mut tasks).await {
                Ok(p) => progressed |= p,
                Err(err) if err.is_canceled() => break true,
                Err(err) => return Err(err),
            }

            match self.child_round(ctx, &tasks, &mut core).await {
                Some(p) => progressed |= p,
                None => break true,
            }

            match self.finalize_round(ctx, &mut core).await {
                Some(p) => progressed |= p,
                None => break true,
            }

            if core.is_finished() {
                core.end_round(progressed);
                break false;
            }

            if !core.end_round(progressed) {
                warn!(rounds = core.rounds(), "no progress; giving up on waiting tasks");
                break false;
            }

            if !progressed && !ctx.pause(self.options.poll_interval).await {
                break true;
            }
        };

        let report = core.report(canceled);
        info!(
            outcome = %report.outcome,
            rounds = report.rounds,
            succeeded = report.succeeded.len(),
            passed = report.passed.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            "migration run finished"
        );
        Ok(report)
    }

    async fn generator_round(
        &self,
        ctx: &RunContext,
        generators: &BTreeMap<Identifier, Generator>,
        core: &mut CoreRun,
        tasks: &mut BTreeMap<Identifier, MigrationTask>,
    ) -> Result<bool> {
        let mut progressed = false;

        for id in core.pending_generators() {
            let Some(generator) = generators.get(&id) else {
                continue;
            };

            match generator.oracle().state(&self.env, ctx).await? {
                DependencyState::Ready => {
                    if let Err(err) = generator.run(&self.env, ctx).await {
                        if err.is_canceled() {
                            return Err(err);
                        }
                    }

                    let mut rx = generator.jobs();
                    let mut children = Vec::new();
                    while let Ok(task) = rx.try_recv() {
                        children.push(task.id.clone());
                        tasks.insert(task.id.clone(), task);
                    }
                    info!(generator = %id, children = children.len(), "migration generated");
                    core.generator_ran(&id, children, &generator.errors());
                    progressed = true;
                }
                DependencyState::Passed => {
                    let mut errors = Catcher::new();
                    persist(&self.env, ctx, &id, &id, false, &mut errors).await?;
                    info!(generator = %id, "nothing to migrate");
                    core.generator_passed(&id, errors.errors());
                    progressed = true;
                }
                state => {
                    debug!(generator = %id, %state, "migration waiting");
                    core.observe(&id, state);
                }
            }
        }

        Ok(progressed)
    }

    /// `None` when the run was cancelled mid-round.
    async fn child_round(
        &self,
        ctx: &RunContext,
        tasks: &BTreeMap<Identifier, MigrationTask>,
        core: &mut CoreRun,
    ) -> Option<bool> {
        let pending = core.pending_children();
        if pending.is_empty() {
            return Some(false);
        }

        let workers = self.options.workers.max(1);
        let mut queue = pending.into_iter().filter_map(|id| tasks.get(&id).cloned());
        let mut in_flight = JoinSet::new();
        let mut progressed = false;
        let mut canceled = false;

        loop {
            while in_flight.len() < workers {
                let Some(task) = queue.next() else { break };
                let env = self.env.clone();
                let ctx = ctx.clone();
                in_flight.spawn(async move { evaluate_child(env, ctx, task).await });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "child task panicked or was aborted");
                    continue;
                }
            };

            match outcome.verdict {
                ChildVerdict::Executed(errors) => {
                    core.child_executed(&outcome.id, errors.errors());
                    progressed = true;
                }
                ChildVerdict::Passed(errors) => {
                    core.child_passed(&outcome.id, errors.errors());
                    progressed = true;
                }
                ChildVerdict::Waiting(state) => core.observe(&outcome.id, state),
                ChildVerdict::Canceled => canceled = true,
            }
        }

        if canceled { None } else { Some(progressed) }
    }

    /// `None` when the run was cancelled mid-round.
    async fn finalize_round(&self, ctx: &RunContext, core: &mut CoreRun) -> Option<bool> {
        let settled = core.settled_generators();
        let progressed = !settled.is_empty();

        for (id, has_errors) in settled {
            let mut errors = Catcher::new();
            if let Err(err) = persist(&self.env, ctx, &id, &id, has_errors, &mut errors).await {
                debug!(generator = %id, error = %err, "finalization interrupted");
                return None;
            }
            core.finalize_generator(&id, errors.errors());
            if has_errors {
                warn!(generator = %id, "migration finished with errors");
            } else {
                info!(generator = %id, "migration finished");
            }
        }

        Some(progressed)
    }
}

/// Upsert a completion record, collecting write failures into `errors`.
/// Only cancellation is returned as an error.
async fn persist(
    env: &Environment,
    ctx: &RunContext,
    id: &str,
    group_id: &str,
    has_errors: bool,
    errors: &mut Catcher,
) -> Result<()> {
    match finish_migration(env.completions(), ctx, env.metadata_ns(), id, group_id, has_errors).await {
        Ok(()) => Ok(()),
        Err(StoreError::Canceled) => Err(MigradagError::Canceled),
        Err(err) => {
            warn!(task = %id, error = %err, "could not save completion record");
            errors.add(err);
            Ok(())
        }
    }
}

async fn evaluate_child(env: Environment, ctx: RunContext, task: MigrationTask) -> ChildOutcome {
    let verdict = match task.oracle.state(&env, &ctx).await {
        Err(_) => ChildVerdict::Canceled,
        Ok(DependencyState::Ready) => apply_child(&env, &ctx, &task).await,
        Ok(DependencyState::Passed) => {
            let mut errors = Catcher::new();
            match persist(&env, &ctx, &task.id, &task.migration, false, &mut errors).await {
                Ok(()) => ChildVerdict::Passed(errors),
                Err(_) => ChildVerdict::Canceled,
            }
        }
        Ok(state) => ChildVerdict::Waiting(state),
    };

    ChildOutcome {
        id: task.id,
        verdict,
    }
}

async fn apply_child(env: &Environment, ctx: &RunContext, task: &MigrationTask) -> ChildVerdict {
    let mut errors = Catcher::new();

    match env.registry().get(&task.operation) {
        Ok(op) => {
            if let Err(err) = op.apply(env, ctx, task).await {
                if ctx.is_canceled() {
                    return ChildVerdict::Canceled;
                }
                let message = format!("{err:#}");
                warn!(task = %task.id, error = %message, "migration task failed");
                errors.add(message);
            }
        }
        Err(err) => errors.add(err),
    }

    match persist(env, ctx, &task.id, &task.migration, errors.has_errors(), &mut errors).await {
        Ok(()) => {
            debug!(task = %task.id, has_errors = errors.has_errors(), "migration task finished");
            ChildVerdict::Executed(errors)
        }
        Err(_) => ChildVerdict::Canceled,
    }
}
