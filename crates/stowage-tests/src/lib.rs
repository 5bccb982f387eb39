//! Integration test infrastructure for stowage.
//!
//! This crate provides testcontainers-based infrastructure for running the
//! cache against a real S3-compatible store (MinIO).
//!
//! # Usage
//!
//! ```ignore
//! use stowage_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new().await.unwrap();
//!     // Use ctx.storage(cwd), ctx.store, ctx.s3_options(), etc.
//! }
//! ```

pub mod containers;
pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,stowage_cache=debug,stowage_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
