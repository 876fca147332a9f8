// tests/runtime_end_to_end.rs

mod common;
use crate::common::{
    Executed, events_ns, executed_log, fast_options, init_tracing, recording_env, seed,
    with_timeout, within,
};

use std::sync::Arc;
use std::time::Duration;

use migradag::config::{PlanFile, load_from_str};
use migradag::context::RunContext;
use migradag::engine::{
    Environment, OperationRegistry, RunOutcome, Runtime, RuntimeOptions, TaskPhase,
};
use migradag::errors::MigradagError;
use migradag::generator::Generator;
use migradag::readiness::DependencyState;
use migradag::store::InMemoryStore;
use migradag::types::{Namespace, ValidationPolicy};
use migradag_test_utils::builders::{GeneratorOptionsBuilder, unmigrated};
use migradag_test_utils::fake_operation::RecordingOperation;

/// Environment with two operations, `a` and `b`, marking documents with
/// `a_done` and `b_done`. `configure_a` may tweak the first one.
fn two_stage_env(
    store: &InMemoryStore,
    configure_a: impl FnOnce(RecordingOperation) -> RecordingOperation,
) -> (Environment, Executed) {
    let executed = executed_log();
    let mut registry = OperationRegistry::new();
    registry
        .register(
            "a",
            configure_a(RecordingOperation::new(store, Arc::clone(&executed)).with_marker("a_done")),
        )
        .unwrap();
    registry
        .register(
            "b",
            RecordingOperation::new(store, Arc::clone(&executed)).with_marker("b_done"),
        )
        .unwrap();
    (Environment::in_memory(store).with_registry(registry), executed)
}

fn two_stage_generators() -> Vec<Generator> {
    let a = GeneratorOptionsBuilder::new("a", &events_ns())
        .selector(unmigrated("a_done"))
        .operation("a")
        .build();
    let b = GeneratorOptionsBuilder::new("b", &events_ns())
        .selector(unmigrated("b_done"))
        .operation("b")
        .after("a")
        .build();
    vec![Generator::new(b), Generator::new(a)]
}

fn log(executed: &Executed) -> Vec<String> {
    executed.lock().unwrap().clone()
}

#[tokio::test]
async fn second_stage_waits_for_every_document_of_the_first() {
    init_tracing();
    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1", "e2", "e3"]);
    let (env, executed) = two_stage_env(&store, |op| op);

    let runtime = Runtime::new(env, fast_options());
    let report = with_timeout(runtime.run(&RunContext::new(), two_stage_generators()))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded, "{report}");
    assert_eq!(report.succeeded.len(), 6);
    assert_eq!(report.generators["a"], TaskPhase::Succeeded);
    assert_eq!(report.generators["b"], TaskPhase::Succeeded);

    let log = log(&executed);
    assert_eq!(log.len(), 6);
    let last_a = log.iter().rposition(|id| id.starts_with("a.")).unwrap();
    let first_b = log.iter().position(|id| id.starts_with("b.")).unwrap();
    assert!(last_a < first_b, "b started before a finished: {log:?}");

    let meta = Namespace::default_metadata();
    for id in ["a", "b", "a.e1.0", "b.e3.2"] {
        let record = store.record(&meta, id).unwrap();
        assert!(record.satisfied(), "{id} not satisfied");
    }
    assert_eq!(store.record(&meta, "a.e1.0").unwrap().group_id, "a");
    assert_eq!(store.open_cursors(), 0);
}

#[tokio::test]
async fn failed_prerequisite_leaves_dependent_blocked() {
    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1", "e2", "e3"]);
    let (env, executed) = two_stage_env(&store, |op| op.failing_on("e2"));

    let runtime = Runtime::new(env, fast_options());
    let report = with_timeout(runtime.run(&RunContext::new(), two_stage_generators()))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::CompletedButBlocked, "{report}");
    assert!(report.failed["a.e2.1"][0].contains("refusing to migrate document e2"));
    assert_eq!(report.failed["a"], vec!["1 child task(s) failed"]);
    assert_eq!(report.blocked["b"], Some(DependencyState::Blocked));
    assert_eq!(report.generators["a"], TaskPhase::Failed);
    assert_eq!(report.generators["b"], TaskPhase::Pending);

    assert!(log(&executed).iter().all(|id| id.starts_with("a.")));

    let record = store.record(&Namespace::default_metadata(), "a").unwrap();
    assert!(record.completed);
    assert!(record.has_errors);
}

#[tokio::test]
async fn missing_operation_completes_with_errors() {
    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1"]);
    let (env, _executed) = recording_env(&store);

    let generator = Generator::new(
        GeneratorOptionsBuilder::new("orphan", &events_ns())
            .operation("nope")
            .build(),
    );
    let runtime = Runtime::new(env, fast_options());
    let report = with_timeout(runtime.run(&RunContext::new(), vec![generator]))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::CompletedWithErrors, "{report}");
    assert!(report.failed["orphan.e1.0"][0].contains("no operation registered under 'nope'"));
    assert!(report.blocked.is_empty());
    assert!(!report.is_success());
}

#[tokio::test]
async fn cycle_refuses_to_run_by_default() {
    let store = InMemoryStore::new();
    let (env, executed) = recording_env(&store);

    let generators = vec![
        Generator::new(GeneratorOptionsBuilder::new("x", &events_ns()).after("y").build()),
        Generator::new(GeneratorOptionsBuilder::new("y", &events_ns()).after("x").build()),
    ];
    let runtime = Runtime::new(env, fast_options());
    let err = runtime.run(&RunContext::new(), generators).await.unwrap_err();

    match err {
        MigradagError::InvalidGraph(err) => assert_eq!(err.cycles().count(), 1),
        other => panic!("expected invalid graph, got {other:?}"),
    }
    assert!(log(&executed).is_empty());
}

#[tokio::test]
async fn warn_policy_runs_what_it_can() {
    let store = InMemoryStore::new();
    let cyclic = Namespace::new("db", "cyclic");
    seed(&store, &events_ns(), &["e1", "e2"]);
    seed(&store, &cyclic, &["c1"]);
    let (env, executed) = recording_env(&store);

    let generators = vec![
        Generator::new(GeneratorOptionsBuilder::new("x", &cyclic).after("y").build()),
        Generator::new(GeneratorOptionsBuilder::new("y", &cyclic).after("x").build()),
        Generator::new(GeneratorOptionsBuilder::new("z", &events_ns()).build()),
    ];
    let options = RuntimeOptions {
        validation: ValidationPolicy::Warn,
        ..fast_options()
    };
    let runtime = Runtime::new(env, options);
    let report = with_timeout(runtime.run(&RunContext::new(), generators))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::CompletedButBlocked, "{report}");
    assert_eq!(report.generators["z"], TaskPhase::Succeeded);
    assert_eq!(report.blocked.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    let mut ran = log(&executed);
    ran.sort();
    assert_eq!(ran, vec!["z.e1.0", "z.e2.1"]);
}

#[tokio::test]
async fn cancellation_mid_run_is_reported_as_canceled() {
    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1", "e2"]);
    let executed = executed_log();
    let mut registry = OperationRegistry::new();
    registry
        .register(
            "record",
            RecordingOperation::new(&store, Arc::clone(&executed))
                .with_delay(Duration::from_secs(30)),
        )
        .unwrap();
    let env = Environment::in_memory(&store).with_registry(registry);

    let ctx = RunContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let generator = Generator::new(GeneratorOptionsBuilder::new("slow", &events_ns()).build());
    let runtime = Runtime::new(env, fast_options());
    let report = within(Duration::from_secs(2), runtime.run(&ctx, vec![generator]))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Canceled);
    assert!(report.failed.is_empty());
    assert!(log(&executed).is_empty());
    assert!(store.record(&Namespace::default_metadata(), "slow").is_none());
}

#[tokio::test]
async fn rerun_over_migrated_data_passes_everything() {
    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1", "e2"]);

    let ctx = RunContext::new();

    let (env, _) = two_stage_env(&store, |op| op);
    let runtime = Runtime::new(env, fast_options());
    let first = with_timeout(runtime.run(&ctx, two_stage_generators()))
        .await
        .unwrap();
    assert!(first.is_success());

    let (env, executed) = two_stage_env(&store, |op| op);
    let runtime = Runtime::new(env, fast_options());
    let second = with_timeout(runtime.run(&ctx, two_stage_generators()))
        .await
        .unwrap();

    assert_eq!(second.outcome, RunOutcome::Succeeded);
    assert_eq!(second.passed, vec!["a".to_string(), "b".to_string()]);
    assert!(second.succeeded.is_empty());
    assert!(log(&executed).is_empty());
}

#[tokio::test]
async fn duplicate_generator_ids_are_rejected() {
    let store = InMemoryStore::new();
    let (env, _) = recording_env(&store);
    let generators = vec![
        Generator::new(GeneratorOptionsBuilder::new("dup", &events_ns()).build()),
        Generator::new(GeneratorOptionsBuilder::new("dup", &events_ns()).build()),
    ];

    let err = Runtime::new(env, fast_options())
        .run(&RunContext::new(), generators)
        .await
        .unwrap_err();
    assert!(matches!(err, MigradagError::ConfigError(_)));
}

#[tokio::test]
async fn plan_file_drives_a_run() {
    let toml = r#"
[config]
workers = 2
poll_interval_ms = 5
max_idle_rounds = 3

[migration.backfill]
store = "db"
collection = "events"
operation = "record"
query = { migrated = { "$exists" = false } }
limit = 2

[migration.cleanup]
store = "db"
collection = "events"
operation = "tidy"
query = { tidied = { "$exists" = false } }
after = ["backfill"]
"#;
    let plan = PlanFile::try_from(load_from_str(toml).unwrap()).unwrap();
    assert_eq!(plan.runtime_options().workers, 2);

    let store = InMemoryStore::new();
    seed(&store, &events_ns(), &["e1", "e2", "e3"]);
    let executed = executed_log();
    let mut registry = OperationRegistry::new();
    registry
        .register("record", RecordingOperation::new(&store, Arc::clone(&executed)))
        .unwrap();
    registry
        .register(
            "tidy",
            RecordingOperation::new(&store, Arc::clone(&executed)).with_marker("tidied"),
        )
        .unwrap();
    let env = Environment::in_memory(&store)
        .with_registry(registry)
        .with_metadata_ns(plan.metadata_namespace());

    let runtime = Runtime::new(env, plan.runtime_options());
    let report = with_timeout(
        runtime.run(&RunContext::new(), migradag::generators_from_plan(&plan)),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded, "{report}");
    let log = log(&executed);
    assert_eq!(log.iter().filter(|id| id.starts_with("backfill.")).count(), 2);
    assert_eq!(log.iter().filter(|id| id.starts_with("cleanup.")).count(), 3);
    assert_eq!(
        store.record(&plan.metadata_namespace(), "backfill").map(|r| r.satisfied()),
        Some(true)
    );
}
