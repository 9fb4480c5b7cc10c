//! Common test utilities, fixtures, and mocks shared by the integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// Route tracing output through the test harness, once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}
