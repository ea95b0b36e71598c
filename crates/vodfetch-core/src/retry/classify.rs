//! Classify session errors into retry classes.

use crate::session::SessionError;

/// Retry class of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The device reported overload; back off longer.
    Busy,
    /// The connection or login token is gone; log in again before retrying.
    SessionBroken,
    /// Anything else (timeouts, decode errors, local storage trouble).
    Other,
}

/// Classify a session error for retry decisions.
pub fn classify(e: &SessionError) -> ErrorClass {
    match e {
        SessionError::Busy { .. } => ErrorClass::Busy,
        SessionError::SessionExpired(_) | SessionError::Transport(_) | SessionError::Auth(_) => {
            ErrorClass::SessionBroken
        }
        SessionError::Api { .. }
        | SessionError::Timeout
        | SessionError::Http(_)
        | SessionError::Decode(_)
        | SessionError::Storage(_)
        | SessionError::Other(_) => ErrorClass::Other,
    }
}
