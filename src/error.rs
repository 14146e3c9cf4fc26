//! Exceptions raised back to the host framework.
//!
//! Every failure in a request surfaces as one [`AidaError`], tagged with one of
//! the six [`ExceptionKind`]s the AIDA client libraries know how to handle. Errors
//! that originate from a native device library carry the [`NativeStatus`] that
//! library returned, and its text is placed in front of the message.
//!
//! Raising never does any cleanup of its own. Everything a dispatch function owns
//! is dropped on the way out through `?`, which is what makes the early returns
//! throughout the providers safe.

use std::fmt;

use thiserror::Error;
use tracing::error;

use crate::value::Payload;

/// The flat taxonomy of exceptions understood by AIDA clients
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Fatal to the backend process: the service could not start
    ServerInitialisation,
    /// Data retrieval failed for this request
    UnableToGetData,
    /// The set request failed, target hardware is unchanged
    UnableToSetData,
    /// Wrong channel, or wrong shape requested from a channel
    UnsupportedChannel,
    /// A required argument was missing or could not be interpreted
    MissingRequiredArgument,
    /// Catch-all for unexpected conditions, usually a provider defect
    AidaInternal,
}

impl ExceptionKind {
    /// The exception class name as raised to the client
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerInitialisation => "ServerInitialisationException",
            Self::UnableToGetData => "UnableToGetDataException",
            Self::UnableToSetData => "UnableToSetDataException",
            Self::UnsupportedChannel => "UnsupportedChannelException",
            Self::MissingRequiredArgument => "MissingRequiredArgumentException",
            Self::AidaInternal => "AidaInternalException",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A status code returned from a native device library
///
/// Codes follow the VMS convention, where any code with the low bit set means
/// success. The text is whatever message the library translates the code to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatus {
    pub code: u32,
    pub text: String,
}

impl NativeStatus {
    /// Normal successful completion
    pub const NORMAL: u32 = 1;

    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code & 1 == 1
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "%NONAME-E-NOMSG, Message number {:08X}", self.code)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

fn render(
    kind: &ExceptionKind,
    status: &Option<NativeStatus>,
    message: &Option<String>,
) -> String {
    let mut text = String::new();
    if let Some(status) = status
        && !status.is_success()
    {
        text.push_str(&status.to_string());
        text.push_str("; ");
    }
    text.push_str(kind.name());
    if let Some(message) = message {
        text.push_str("; ");
        text.push_str(message);
    }
    text
}

/// An exception to be raised to the caller of a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", render(.kind, .status, .message))]
pub struct AidaError {
    kind: ExceptionKind,
    message: Option<String>,
    status: Option<NativeStatus>,
}

impl AidaError {
    /// Raise an exception that did not come from a native library
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self::raise(Self {
            kind,
            message: Some(message.into()),
            status: None,
        })
    }

    /// Raise an exception caused by a failed native library call
    ///
    /// The translated status text is prepended to the message.
    pub fn with_status(kind: ExceptionKind, status: NativeStatus, message: Option<&str>) -> Self {
        Self::raise(Self {
            kind,
            message: message.map(str::to_owned),
            status: Some(status),
        })
    }

    fn raise(err: Self) -> Self {
        error!("AIDA Exception: {err}");
        err
    }

    pub fn unsupported_channel(uri: &str) -> Self {
        Self::new(ExceptionKind::UnsupportedChannel, uri)
    }

    pub fn missing_argument(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::MissingRequiredArgument, message)
    }

    pub fn unable_to_get(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::UnableToGetData, message)
    }

    pub fn unable_to_set(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::UnableToSetData, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::AidaInternal, message)
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn status(&self) -> Option<&NativeStatus> {
        self.status.as_ref()
    }
}

/// A failed request, as returned to the host framework
///
/// Alongside the raised error this carries an empty response of the shape that
/// was asked for, so that a well-formed reply can always be serialized.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct Fault {
    pub error: AidaError,
    pub empty: Payload,
}

impl Fault {
    pub fn kind(&self) -> ExceptionKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_formatting() {
        let err = AidaError::unsupported_channel("KLYS:LI31:31:TACT");
        assert_eq!(
            err.to_string(),
            "UnsupportedChannelException; KLYS:LI31:31:TACT"
        );
        assert_eq!(err.kind(), ExceptionKind::UnsupportedChannel);

        let err = AidaError::with_status(
            ExceptionKind::UnableToSetData,
            NativeStatus::new(0x0A, "%KLYS-E-BADSET, set failed"),
            Some("Error setting value"),
        );
        assert_eq!(
            err.to_string(),
            "%KLYS-E-BADSET, set failed; UnableToSetDataException; Error setting value"
        );

        let err = AidaError::with_status(
            ExceptionKind::ServerInitialisation,
            NativeStatus::new(0x2C, ""),
            None,
        );
        assert_eq!(
            err.to_string(),
            "%NONAME-E-NOMSG, Message number 0000002C; ServerInitialisationException"
        );
    }

    #[test]
    fn status_convention() {
        assert!(NativeStatus::new(NativeStatus::NORMAL, "").is_success());
        assert!(NativeStatus::new(0x0801, "").is_success());
        assert!(!NativeStatus::new(0x0800, "").is_success());
    }
}
