use std::sync::Arc;

use thiserror::Error;

use crate::store::StoreError;

/// An error that happens while resolving a cached computation.
///
/// The error is cloneable, since every caller sharing one in-flight computation receives a copy
/// of the same outcome. None of these variants are ever written to the persistent store.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Reading from or writing to the persistent store failed.
    ///
    /// This includes store timeouts.
    #[error("cache store failed")]
    Store(#[source] Arc<StoreError>),
    /// The producer of the cached value returned an error.
    #[error("computation failed: {0:#}")]
    Computation(Arc<anyhow::Error>),
    /// A computed value could not be serialized, or a shared value could not be turned into the
    /// type a caller asked for.
    #[error("malformed: {0}")]
    Malformed(String),
    /// An unexpected error in the cache itself.
    #[error("internal error")]
    InternalError,
}

impl CacheError {
    /// Wraps an error returned by a producer.
    pub fn computation(err: impl Into<anyhow::Error>) -> Self {
        Self::Computation(Arc::new(err.into()))
    }

    /// Returns the producer error, if this is a [`Computation`](Self::Computation) error.
    pub fn as_computation(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Computation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        Self::Store(Arc::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// An entry in a cache, containing either `Ok(T)` or the error every caller of the same
/// computation observes.
pub type CacheEntry<T = ()> = Result<T, CacheError>;
