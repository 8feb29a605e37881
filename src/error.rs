//! Error Taxonomy
//!
//! Every failure that crosses the bridge boundary is one of the kinds below.
//! Platform SDK errors are caught and classified; raw platform exceptions
//! never reach the calling application.

/// Bridge error kinds.
///
/// Converted to a plain string message at the command boundary, so the
/// frontend always receives a human-readable rejection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The request failed validation before any adapter was invoked.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No window, view controller, or browser was available to host the
    /// sign-in UI.
    #[error("no presentation surface available: {0}")]
    NoPresentationSurface(String),

    /// The user dismissed the native sign-in flow.
    #[error("sign-in cancelled: {0}")]
    UserCancelled(String),

    /// The underlying SDK reported an error. The original message is kept
    /// as diagnostic text, not re-interpreted.
    #[error("{0}")]
    Adapter(String),

    /// The operation is unavailable on the current platform.
    #[error("{0} is not supported on this platform")]
    NotSupported(&'static str),

    /// Another sign-in attempt is already in flight on this orchestrator.
    #[error("a sign-in attempt is already in progress")]
    Busy,
}

/// Bridge result type.
pub type Result<T> = std::result::Result<T, Error>;

// Tauri commands return Result<T, String>; the message is the whole payload.
impl From<Error> for String {
    fn from(err: Error) -> String {
        err.to_string()
    }
}

impl Error {
    /// Classify a raw platform rejection message onto the taxonomy.
    ///
    /// Native completion handlers reject with free-form strings ("User
    /// canceled the sign-in flow", "No root view controller found", ...).
    /// Anything unrecognized stays an adapter failure with the original
    /// text preserved.
    #[cfg(any(mobile, test))]
    pub(crate) fn from_platform_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();

        if lowered.contains("cancel") {
            Error::UserCancelled(message)
        } else if lowered.contains("view controller")
            || lowered.contains("no active window")
            || lowered.contains("presentation surface")
        {
            Error::NoPresentationSurface(message)
        } else {
            Error::Adapter(message)
        }
    }
}
