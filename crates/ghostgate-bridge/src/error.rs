//! Gateway error types.
//!
//! Authentication failures and command misuse are shown to the user who
//! caused them. Backend and invariant failures are logged and the event or
//! command is dropped; nothing is retried.

use ghostgate_core::{BackendError, FormatError};
use thiserror::Error;

/// Errors raised while handling a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Login failed. The message is shown verbatim.
    #[error("{0}")]
    Authentication(String),

    /// A service command line could not be tokenized.
    #[error("improperly formatted command: {0}")]
    Format(#[from] FormatError),

    /// A user, channel or message reference did not resolve.
    #[error("no such target: {0}")]
    Reference(String),

    /// A backend call failed.
    #[error(transparent)]
    Backend(BackendError),

    /// Internal state contradicted itself.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A login or logout is already running for this principal.
    #[error("login or logout in progress. Please wait")]
    Busy,

    /// The command needs a backend session.
    #[error("You're not logged in. Use LOGIN first.")]
    NotLoggedIn,
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Authentication(msg) => Self::Authentication(msg),
            BackendError::NotFound(_) | BackendError::InvalidReference(_) => {
                Self::Reference(err.to_string())
            },
            other => Self::Backend(other),
        }
    }
}

impl GatewayError {
    /// Whether the error should be shown to the requesting user rather than
    /// only logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Backend(_) | Self::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_are_classified() {
        assert_eq!(
            GatewayError::from(BackendError::Authentication("bad password".into())),
            GatewayError::Authentication("bad password".into())
        );
        assert!(matches!(
            GatewayError::from(BackendError::NotFound("7".into())),
            GatewayError::Reference(_)
        ));
        assert!(matches!(
            GatewayError::from(BackendError::Call("boom".into())),
            GatewayError::Backend(_)
        ));
    }

    #[test]
    fn visibility() {
        assert!(GatewayError::Busy.is_user_visible());
        assert!(GatewayError::Authentication("x".into()).is_user_visible());
        assert!(!GatewayError::Invariant("x".into()).is_user_visible());
        assert!(!GatewayError::Backend(BackendError::Call("x".into())).is_user_visible());
    }

    #[test]
    fn fixed_messages() {
        assert_eq!(GatewayError::Busy.to_string(), "login or logout in progress. Please wait");
        assert_eq!(GatewayError::NotLoggedIn.to_string(), "You're not logged in. Use LOGIN first.");
    }
}
