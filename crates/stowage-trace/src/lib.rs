//! Tracing and OpenTelemetry integration for stowage.
//!
//! Provides subscriber setup (text or JSON logs, optional OTLP export)
//! and span constructors for cache fetch/put operations.

pub mod spans;
pub mod tracer;

pub use spans::{CacheAttributes, fetch_span, put_span};
pub use tracer::{
    LogFormat, OtlpConfig, TracerError, TracingConfig, init_tracer, shutdown_tracer,
};
