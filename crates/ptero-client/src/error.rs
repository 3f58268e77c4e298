//! Error types for the ptero client

use thiserror::Error;

pub use ptero_api::errors::{ApiError, ApiErrors};

/// Type-erased error carried by failed event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when using the ptero client
#[derive(Error, Debug)]
pub enum Error {
    /// A registered event handler failed during dispatch
    #[error("event handler '{event}' failed: {source}")]
    Event {
        /// Name of the event being dispatched
        event: String,
        /// The handler's original failure
        #[source]
        source: BoxError,
    },

    /// The panel rejected the request with a structured error set
    #[error("{0}")]
    Api(#[from] ApiErrors),

    /// The remote service misbehaved: unacceptable status, undecodable
    /// body, transport failure, or a failed pre-signed-URL fetch
    #[error("request failed: {0}")]
    Request(String),

    /// A local contract violation caught before any I/O
    #[error("validation failed: {0}")]
    Validation(String),

    /// A numeric range precondition failed
    #[error("{0}")]
    Range(String),

    /// The real-time channel failed to authenticate or lost its
    /// connection unrecoverably
    #[error("shard error: {0}")]
    Shard(String),
}

impl Error {
    /// The structured error set, when this is a panel rejection.
    pub fn api_errors(&self) -> Option<&ApiErrors> {
        match self {
            Self::Api(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use ptero_api::errors::ApiError;

    #[test]
    fn test_event_error_preserves_cause() {
        let cause: BoxError = "handler exploded".into();
        let err = Error::Event {
            event: "stats_update".into(),
            source: cause,
        };

        assert_eq!(
            err.to_string(),
            "event handler 'stats_update' failed: handler exploded"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_api_errors_accessor() {
        let set = ApiErrors::new(vec![ApiError {
            code: "NotFound".into(),
            detail: "gone".into(),
            status: 404,
        }]);
        let err = Error::from(set);

        let errors = err.api_errors().expect("api error set");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].status, 404);
        assert!(Error::Request("boom".into()).api_errors().is_none());
    }
}
