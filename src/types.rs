//! Shared primitive IDs and log-level enums.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main-loop sequence number.
pub type SeqNum = u64;
/// Numeric message identifier used by non-verbose entries.
pub type MessageId = u32;
/// Injection service identifier.
pub type ServiceId = u32;
/// Session-wide counter of records handed to the backend.
pub type RecordCounter = u64;

/// Maximum length of application and context identifiers.
pub const MAX_ID_LEN: usize = 4;

/// Rejected identifier text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Identifier was empty.
    #[error("identifier must not be empty")]
    Empty,
    /// Identifier exceeded [`MAX_ID_LEN`] characters.
    #[error("identifier `{0}` is longer than {MAX_ID_LEN} characters")]
    TooLong(String),
    /// Identifier contained non-ASCII or non-graphic characters.
    #[error("identifier `{0}` must be printable ASCII")]
    NotAscii(String),
}

fn validate_id(raw: &str) -> Result<String, IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    if !raw.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(IdError::NotAscii(raw.to_string()));
    }
    if raw.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(raw.to_string()));
    }
    Ok(raw.to_string())
}

/// Short application identifier, e.g. `LOG`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    pub(crate) fn from_static(raw: &'static str) -> Self {
        Self(raw.to_string())
    }

    /// Validates and wraps an application identifier.
    pub fn new(raw: &str) -> Result<Self, IdError> {
        validate_id(raw).map(Self)
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AppId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AppId> for String {
    fn from(value: AppId) -> Self {
        value.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short logging-context identifier, e.g. `TEST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextId(String);

impl ContextId {
    pub(crate) fn from_static(raw: &'static str) -> Self {
        Self(raw.to_string())
    }

    /// Validates and wraps a context identifier.
    pub fn new(raw: &str) -> Result<Self, IdError> {
        validate_id(raw).map(Self)
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContextId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<ContextId> for String {
    fn from(value: ContextId) -> Self {
        value.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Severity of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Unrecoverable failure.
    Fatal,
    /// Error condition.
    Error,
    /// Warning.
    Warn,
    /// Informational.
    Info,
    /// Debug detail.
    Debug,
    /// Most detailed tracing.
    Verbose,
}

impl LogLevel {
    /// Fixed-width tag used by local echo.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Verbose => "verbose",
        }
    }
}

/// Whether entries carry self-describing arguments or a numeric message ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    /// Typed, self-describing arguments.
    #[default]
    Verbose,
    /// Message ID plus positional arguments without type information.
    NonVerbose,
}
