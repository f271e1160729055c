//! Log entries and typed log arguments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LogLevel, MessageId, SeqNum};

/// One typed log argument, tagged with its wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LogArg {
    /// Signed 32-bit integer.
    Int(i32),
    /// Unsigned 8-bit integer.
    Uint8(u8),
    /// Unsigned 16-bit integer.
    Uint16(u16),
    /// Unsigned 32-bit integer.
    Uint32(u32),
    /// 32-bit float.
    Float32(f32),
    /// UTF-8 string.
    String(String),
}

impl LogArg {
    /// Appends the positional, untyped little-endian form used by non-verbose records.
    ///
    /// Strings are written as a `u16` length that includes a trailing NUL,
    /// followed by the bytes and the NUL. Strings longer than `u16::MAX - 1`
    /// bytes are cut at that length.
    pub fn write_raw(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::Uint8(v) => out.push(*v),
            Self::Uint16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::Uint32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::Float32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::String(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(usize::from(u16::MAX) - 1);
                let with_nul = (len + 1) as u16;
                out.extend_from_slice(&with_nul.to_le_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.push(0);
            }
        }
    }
}

impl fmt::Display for LogArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint8(v) => write!(f, "{v}"),
            Self::Uint16(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// How an entry identifies itself to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Self-describing arguments only.
    Verbose,
    /// Numeric message ID with positional arguments.
    NonVerbose {
        /// Message ID resolved by the receiver's format catalog.
        msg_id: MessageId,
    },
}

impl Encoding {
    /// Message ID, if any.
    pub fn msg_id(&self) -> Option<MessageId> {
        match self {
            Self::Verbose => None,
            Self::NonVerbose { msg_id } => Some(*msg_id),
        }
    }
}

/// One transient log entry handed to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Main-loop sequence number; `None` for out-of-loop entries.
    pub seq: Option<SeqNum>,
    /// Severity.
    pub level: LogLevel,
    /// Verbose or ID-based encoding.
    pub encoding: Encoding,
    /// Typed arguments in emission order.
    pub args: Vec<LogArg>,
}

impl LogEntry {
    /// Builds a verbose entry.
    pub fn verbose(level: LogLevel, args: Vec<LogArg>) -> Self {
        Self {
            seq: None,
            level,
            encoding: Encoding::Verbose,
            args,
        }
    }

    /// Builds an ID-based entry.
    pub fn with_id(level: LogLevel, msg_id: MessageId, args: Vec<LogArg>) -> Self {
        Self {
            seq: None,
            level,
            encoding: Encoding::NonVerbose { msg_id },
            args,
        }
    }

    /// Tags the entry with a main-loop sequence number.
    pub fn at_seq(mut self, seq: SeqNum) -> Self {
        self.seq = Some(seq);
        self
    }
}
