//! Cache key newtype.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque content hash identifying one artifact bundle.
///
/// The value is used verbatim as (the suffix of) the remote object key, so
/// equality is byte-exact and no normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote object key: the optional prefix concatenated with the hash.
    pub fn object_key(&self, prefix: Option<&str>) -> String {
        match prefix {
            Some(p) => format!("{}{}", p, self.0),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
