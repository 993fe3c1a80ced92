use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for a single upstream exchange.
///
/// Every variant maps to one gateway-level response in the HTTP layer; none
/// of them abort the process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Network-level failure contacting the weather service.
    #[error("upstream weather service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The outbound call exceeded the configured deadline.
    #[error("upstream request exceeded the {}ms deadline", .0.as_millis())]
    Timeout(Duration),

    /// The weather service answered with a non-success status.
    #[error("upstream returned status {status}: {detail}")]
    UpstreamStatus { status: StatusCode, detail: String },

    /// The weather service answered 2xx but the body is not valid JSON.
    #[error("upstream returned a body that is not valid JSON: {detail}")]
    MalformedBody { detail: String },
}

impl RelayError {
    /// Classify a transport-level reqwest failure.
    ///
    /// The request URL embeds the API credential as a query parameter, so it
    /// is stripped before the error is stored; its `Display` output may end
    /// up in logs and response bodies.
    pub(crate) fn from_transport(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(deadline)
        } else {
            RelayError::Unreachable(err.without_url())
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Unreachable(_) | RelayError::Timeout(_) => true,
            RelayError::UpstreamStatus { status, .. } => status.is_server_error(),
            RelayError::MalformedBody { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_server_errors_are_transient() {
        let timeout = RelayError::Timeout(Duration::from_millis(100));
        assert!(timeout.is_transient());

        let unavailable = RelayError::UpstreamStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "try later".to_string(),
        };
        assert!(unavailable.is_transient());
    }

    #[test]
    fn client_errors_and_bad_bodies_are_not_transient() {
        let not_found = RelayError::UpstreamStatus {
            status: StatusCode::NOT_FOUND,
            detail: "city not found".to_string(),
        };
        assert!(!not_found.is_transient());

        let malformed = RelayError::MalformedBody { detail: "expected value".to_string() };
        assert!(!malformed.is_transient());
    }

    #[test]
    fn timeout_message_names_the_deadline() {
        let err = RelayError::Timeout(Duration::from_millis(2500));
        assert_eq!(err.to_string(), "upstream request exceeded the 2500ms deadline");
    }
}
