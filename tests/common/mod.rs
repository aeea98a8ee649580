//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use rowflow_rs::config::ExecutionConfig;

/// Worker counts every order-independence test runs with
pub const WORKER_COUNTS: [usize; 3] = [1, 4, 16];

/// Execution config with `workers` threads and a small queue
pub fn config_with_workers(workers: usize) -> ExecutionConfig {
    ExecutionConfig {
        queue_capacity: 8,
        ..ExecutionConfig::with_workers(workers)
    }
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
