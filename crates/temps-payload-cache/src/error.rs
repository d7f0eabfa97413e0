//! Error types for the payload cache

use thiserror::Error;

/// Errors that can occur while talking to the backing store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[source] redis::RedisError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for CacheError {
    /// Transport failures mean the store is unreachable; anything else is a
    /// command error reported as is.
    fn from(error: redis::RedisError) -> Self {
        if error.is_io_error()
            || error.is_connection_refusal()
            || error.is_connection_dropped()
            || error.is_timeout()
        {
            CacheError::Unavailable(error.to_string())
        } else {
            CacheError::Redis(error)
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_redis_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let error = CacheError::from(redis::RedisError::from(io));
        assert!(matches!(error, CacheError::Unavailable(_)));
    }

    #[test]
    fn test_command_errors_stay_redis_errors() {
        let error = CacheError::from(redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "Response was of incompatible type",
        )));
        assert!(matches!(error, CacheError::Redis(_)));
    }
}
