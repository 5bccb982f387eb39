//! Span creation for cache operations.

use tracing::field::Empty;
use tracing::{span, Level, Span};

/// Attributes shared by fetch and put spans.
#[derive(Debug, Default)]
pub struct CacheAttributes {
    pub provider: Option<String>,
    pub key: Option<String>,
    pub object_key: Option<String>,
    pub file_count: Option<usize>,
}

impl CacheAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>, object_key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.object_key = Some(object_key.into());
        self
    }

    pub fn files(mut self, count: usize) -> Self {
        self.file_count = Some(count);
        self
    }
}

/// Create a span for a fetch. `cache.hit` and `cache.duration_ms` are
/// recorded when the operation finishes.
pub fn fetch_span(attrs: &CacheAttributes) -> Span {
    span!(
        Level::INFO,
        "cache.fetch",
        cache.provider = attrs.provider.as_deref().unwrap_or(""),
        cache.key = attrs.key.as_deref().unwrap_or(""),
        cache.object_key = attrs.object_key.as_deref().unwrap_or(""),
        cache.hit = Empty,
        cache.duration_ms = Empty,
    )
}

/// Create a span for a put. `cache.uploaded` and `cache.duration_ms` are
/// recorded when the operation finishes.
pub fn put_span(attrs: &CacheAttributes) -> Span {
    span!(
        Level::INFO,
        "cache.put",
        cache.provider = attrs.provider.as_deref().unwrap_or(""),
        cache.key = attrs.key.as_deref().unwrap_or(""),
        cache.object_key = attrs.object_key.as_deref().unwrap_or(""),
        cache.files = attrs.file_count.unwrap_or(0),
        cache.uploaded = Empty,
        cache.duration_ms = Empty,
    )
}
