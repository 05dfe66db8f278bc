use std::fmt;
use std::str::Utf8Error;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error on parsing
#[derive(Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SipParserError {
    /// Message in error
    pub message: String,
}

#[allow(missing_docs)]
impl SipParserError {
    pub fn new<T>(s: T) -> Self
    where
        T: AsRef<str>,
    {
        Self {
            message: s.as_ref().to_string(),
        }
    }
}

impl std::convert::From<&str> for SipParserError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::convert::From<String> for SipParserError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::convert::From<Utf8Error> for SipParserError {
    fn from(value: Utf8Error) -> Self {
        SipParserError {
            message: format!("{:#?}", value),
        }
    }
}

impl std::convert::From<sipua_util::Error> for SipParserError {
    fn from(err: sipua_util::Error) -> Self {
        SipParserError {
            message: format!(
                "Failed to parse at line:{} column:{} kind:{:?}",
                err.line, err.col, err.kind,
            ),
        }
    }
}

impl std::convert::From<sipua_util::Error> for Error {
    fn from(err: sipua_util::Error) -> Self {
        Self::ParseError(err.into())
    }
}

impl std::convert::From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::ParseError(value.into())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(value: std::fmt::Error) -> Self {
        Self::FmtError(value)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelClosed
    }
}

/// The reason a session or registration attempt ended.
///
/// `status_code` is `0` for failures that originated locally
/// (timeouts, transport drops, user cancellation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndReason {
    /// Short machine readable cause, e.g. `"Canceled"` or `"Busy Here"`.
    pub cause: String,
    /// The status code of the final response, or `0`.
    pub status_code: u16,
    /// The reason phrase of the final response, if any.
    pub reason_phrase: String,
}

impl EndReason {
    /// A failure that originated locally rather than from a peer response.
    pub fn local(cause: &str) -> Self {
        EndReason {
            cause: cause.into(),
            status_code: 0,
            reason_phrase: String::new(),
        }
    }

    /// A failure reported by a peer's final response.
    pub fn peer(status_code: u16, reason_phrase: &str) -> Self {
        EndReason {
            cause: reason_phrase.into(),
            status_code,
            reason_phrase: reason_phrase.into(),
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status_code == 0 {
            write!(f, "{}", self.cause)
        } else {
            write!(f, "{} {}", self.status_code, self.reason_phrase)
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ParseError(#[from] SipParserError),

    #[error("Missing required '{0}' header")]
    MissingRequiredHeader(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Transaction timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    #[error("Peer answered {0} {1}")]
    Peer(u16, String),

    #[error("Request was canceled")]
    Canceled,

    #[error("Fmt Error")]
    FmtError(std::fmt::Error),
}
