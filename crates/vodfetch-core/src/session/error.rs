//! Session error type used for retry classification.

use thiserror::Error;

/// Error returned by a remote session operation.
///
/// Variants carry what the transport actually observed (status codes, API
/// response codes, connection failures) so the retry layer can classify them
/// without looking at message text.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login rejected, or the device could not be reached while logging in.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The device is overloaded (HTTP 5xx, typically 503).
    #[error("device busy (HTTP {status})")]
    Busy { status: u32 },
    /// The device answered a command with an error code.
    #[error("device error {code}: {detail}")]
    Api { code: i64, detail: String },
    /// The login token is no longer accepted.
    #[error("session expired: {0}")]
    SessionExpired(String),
    /// Connection refused, reset, or closed mid-transfer.
    #[error("transport: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    /// Any other non-success HTTP status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The response could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Writing received bytes to the local sink failed.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// True when the sink reported that the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            SessionError::Storage(e) => e
                .get_ref()
                .map(|inner| inner.is::<crate::control::Cancelled>())
                .unwrap_or(false),
            _ => false,
        }
    }
}
