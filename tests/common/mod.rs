//! Shared test utilities for snmp-session integration tests.

// Not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

mod agent;
mod fixtures;
mod stream;

pub use agent::TestAgent;
pub use fixtures::*;
pub use stream::collect_stream;

/// Route `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snmp_session=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
