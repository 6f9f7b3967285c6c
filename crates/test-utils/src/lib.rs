//! Shared scaffolding for the `taskengine` integration tests.
//!
//! - [`fakes`]: recording collaborators and a scripted dispatcher.
//! - [`builders`]: config builders and a ready-wired engine fixture.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single async test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a per-test subscriber once per test binary.
///
/// Output is captured and only shown for failing tests. `RUST_LOG` overrides
/// the default, which keeps engine logs at `info` and silences dependencies:
/// `RUST_LOG=taskengine::task=debug cargo test --test end_task`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,taskengine=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_TIMEOUT:?}"))
}
