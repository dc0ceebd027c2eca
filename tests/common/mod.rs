//! Shared test utilities for jip-model integration tests.

// Allow dead code and unused imports since not all test files use all utilities
#![allow(dead_code)]
#![allow(unused_imports)]

mod fixtures;

pub use fixtures::*;

use jip_model::Context;
use jip_model::engine::MemoryEngine;

/// Install a fmt subscriber honouring `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client context over a fresh in-memory engine.
pub fn client() -> Context<MemoryEngine> {
    init_tracing();
    Context::client()
        .build(MemoryEngine::new())
        .expect("client context")
}

/// A server context over a fresh in-memory engine.
pub fn server() -> Context<MemoryEngine> {
    init_tracing();
    Context::server()
        .build(MemoryEngine::new())
        .expect("server context")
}
