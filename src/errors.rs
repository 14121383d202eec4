//! Error types for the object pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure raised by a [`ResourceFactory`](crate::ResourceFactory) while
/// creating, activating, passivating or destroying a resource.
///
/// # Examples
///
/// ```
/// use generic_objectpool::FactoryError;
///
/// let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
/// let err = FactoryError::with_source("could not open connection", io);
/// assert_eq!(err.to_string(), "could not open connection");
/// assert!(std::error::Error::source(&err).is_some());
/// ```
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct FactoryError {
    message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl FactoryError {
    /// Create an error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error that wraps an underlying cause
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// The human readable message, without the cause chain
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Pool exhausted - no resource became available within {0:?}")]
    Exhausted(Duration),

    #[error("Resource factory failed: {0}")]
    Factory(#[from] FactoryError),

    #[error("Resource is not currently borrowed from this pool")]
    UnknownResource,

    #[error("Operation was cancelled")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_error_keeps_cause() {
        let inner = FactoryError::new("boom");
        let outer = FactoryError::with_source("Error trying to add idle objects", inner);
        let source = StdError::source(&outer).unwrap();
        assert_eq!(source.to_string(), "boom");
    }

    #[test]
    fn test_pool_error_from_factory_error() {
        let err: PoolError = FactoryError::new("refused").into();
        assert!(matches!(err, PoolError::Factory(_)));
        assert_eq!(err.to_string(), "Resource factory failed: refused");
    }
}
