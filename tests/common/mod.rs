#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use migradag::document::{DocValue, document};
use migradag::engine::{Environment, OperationRegistry, RuntimeOptions};
use migradag::store::InMemoryStore;
use migradag::types::Namespace;
use migradag_test_utils::fake_operation::RecordingOperation;

pub use migradag_test_utils::{init_tracing, with_timeout, within};

pub fn events_ns() -> Namespace {
    Namespace::new("db", "events")
}

/// Insert one document per id into `ns`.
pub fn seed(store: &InMemoryStore, ns: &Namespace, ids: &[&str]) {
    store.insert_many(
        ns,
        ids.iter().map(|id| document([("_id", DocValue::from(*id))])),
    );
}

/// Shared log of executed task ids.
pub type Executed = Arc<Mutex<Vec<String>>>;

pub fn executed_log() -> Executed {
    Arc::new(Mutex::new(Vec::new()))
}

/// Environment whose registry holds a `record` operation marking documents
/// with `migrated`.
pub fn recording_env(store: &InMemoryStore) -> (Environment, Executed) {
    let executed = executed_log();
    let mut registry = OperationRegistry::new();
    registry
        .register("record", RecordingOperation::new(store, Arc::clone(&executed)))
        .unwrap();
    (Environment::in_memory(store).with_registry(registry), executed)
}

/// Options tuned so tests that end blocked finish quickly.
pub fn fast_options() -> RuntimeOptions {
    RuntimeOptions {
        workers: 2,
        poll_interval: Duration::from_millis(5),
        max_idle_rounds: 3,
        ..RuntimeOptions::default()
    }
}
