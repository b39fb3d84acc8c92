//! Helpers for tests that need a real database. Available with the `test_utils` feature.
pub mod prepare_env;

pub use prepare_env::{prepare_test_env, random_db_path, teardown};
