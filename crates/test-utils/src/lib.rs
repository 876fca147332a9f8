//! Shared helpers for migradag's integration tests: plan and generator
//! builders, a recording migration operation, and run timeouts.

pub mod builders;
pub mod fake_operation;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Ceiling for a whole test run. Blocked runs end after `max_idle_rounds`
/// polls, so anything slower than this is a hang.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-writer subscriber once per test binary.
///
/// Filtered by `MIGRADAG_LOG` like the binary, defaulting to
/// `migradag=debug` so oracle and generator decisions show up in the output
/// of a failing test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("MIGRADAG_LOG")
            .unwrap_or_else(|_| EnvFilter::new("migradag=debug"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Await a run, failing the test if it outlives [`RUN_TIMEOUT`].
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    within(RUN_TIMEOUT, fut).await
}

/// Await `fut`, failing the test if it takes longer than `limit`. Used with
/// short limits to check that cancellation unwinds promptly.
pub async fn within<F: Future>(limit: Duration, fut: F) -> F::Output {
    match tokio::time::timeout(limit, fut).await {
        Ok(out) => out,
        Err(_) => panic!("run did not finish within {limit:?}"),
    }
}
