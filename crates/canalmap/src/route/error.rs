use std::time::Duration;

use thiserror::Error;

use crate::pathfinding::PathError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("route request exceeded its {}s deadline", .timeout.as_secs_f64())]
    RequestTimeout { timeout: Duration },
    #[error("route request was cancelled before it finished")]
    Cancelled,
    #[error("route service reported a failure: {message}")]
    Remote { message: String },
    #[error("route worker stopped unexpectedly: {message}")]
    Worker { message: String },
}

impl RouteError {
    pub fn user_message(&self) -> &'static str {
        match self {
            RouteError::Path(error) => error.user_message(),
            RouteError::RequestTimeout { .. } => "Finding a route took too long. Try again.",
            RouteError::Cancelled => "Route search cancelled.",
            RouteError::Remote { .. } | RouteError::Worker { .. } => {
                "The route service is unavailable right now."
            }
        }
    }

    /// Worth offering the user a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RouteError::RequestTimeout { .. }
                | RouteError::Remote { .. }
                | RouteError::Worker { .. }
        )
    }
}
