use std::time::Duration;
use thiserror::Error;

/// EIP-1193 "User Rejected Request".
pub const USER_REJECTED_CODE: i64 = 4001;

const USER_REJECTION_MARKERS: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected by user",
    "action_rejected",
];

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("request rejected by user: {0}")]
    UserRejected(String),

    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("transport error: {0}")]
    Transport(#[from] alloy_transport::TransportError),

    #[error("all {attempts} attempts failed across {endpoints_tried} endpoints, last error: {last}")]
    Exhausted {
        attempts: u32,
        endpoints_tried: usize,
        #[source]
        last: Box<FailoverError>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to initialize endpoint {url}: {reason}")]
    InitializationFailed { url: String, reason: String },

    #[error("failed to parse config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl FailoverError {
    /// Whether the human declined a wallet action, as opposed to a network fault.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            FailoverError::UserRejected(_) => true,
            FailoverError::Transport(err) => {
                if err
                    .as_error_resp()
                    .is_some_and(|payload| payload.code == USER_REJECTED_CODE)
                {
                    return true;
                }
                mentions_user_rejection(&err.to_string())
            }
            FailoverError::Other(message) => mentions_user_rejection(message),
            _ => false,
        }
    }

    /// Failures that count against an endpoint and may be retried elsewhere.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailoverError::Timeout { .. } | FailoverError::Transport(_) | FailoverError::Other(_)
        ) && !self.is_user_rejection()
    }

    pub(crate) fn into_user_rejected(self) -> Self {
        match self {
            FailoverError::UserRejected(_) => self,
            other => FailoverError::UserRejected(other.to_string()),
        }
    }
}

fn mentions_user_rejection(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    USER_REJECTION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

impl From<String> for FailoverError {
    fn from(s: String) -> Self {
        FailoverError::Other(s)
    }
}

impl From<&str> for FailoverError {
    fn from(s: &str) -> Self {
        FailoverError::Other(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FailoverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::ErrorPayload;
    use alloy_transport::{TransportError, TransportErrorKind};

    #[test]
    fn test_user_rejection_by_message() {
        let err: FailoverError =
            TransportErrorKind::custom_str("MetaMask Tx Signature: User denied transaction signature.")
                .into();
        assert!(err.is_user_rejection());
        assert!(!err.is_retryable());

        let err = FailoverError::from("ACTION_REJECTED");
        assert!(err.is_user_rejection());
    }

    #[test]
    fn test_user_rejection_by_error_code() {
        let err: FailoverError = TransportError::ErrorResp(ErrorPayload {
            code: USER_REJECTED_CODE,
            message: "denied".into(),
            data: None,
        })
        .into();
        assert!(err.is_user_rejection());
        assert!(!err.is_retryable());

        let other: FailoverError = TransportError::ErrorResp(ErrorPayload {
            code: -32000,
            message: "denied".into(),
            data: None,
        })
        .into();
        assert!(!other.is_user_rejection());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err: FailoverError = TransportErrorKind::custom_str("connection refused").into();
        assert!(!err.is_user_rejection());
        assert!(err.is_retryable());

        let timeout = FailoverError::Timeout {
            endpoint: "a".into(),
            timeout: Duration::from_secs(12),
        };
        assert!(timeout.is_retryable());
        assert!(!FailoverError::InvalidConfig("x".into()).is_retryable());
    }

    #[test]
    fn test_into_user_rejected_keeps_message() {
        let err = FailoverError::from("user rejected the request").into_user_rejected();
        match err {
            FailoverError::UserRejected(message) => {
                assert_eq!(message, "user rejected the request")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exhausted_exposes_last_error() {
        let err = FailoverError::Exhausted {
            attempts: 3,
            endpoints_tried: 2,
            last: Box::new(FailoverError::from("boom")),
        };
        assert_eq!(
            err.to_string(),
            "all 3 attempts failed across 2 endpoints, last error: boom"
        );
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
