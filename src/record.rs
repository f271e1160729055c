//! Wire records and line-delimited frames exchanged with backends.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{
    entry::{Encoding, LogArg, LogEntry},
    types::{AppId, ContextId, LogLevel, MessageId, RecordCounter, ServiceId},
};

/// Version number for serialized [`FrameEnvelope`] payloads.
pub const FRAME_FORMAT_VERSION: u16 = 1;

/// Encoded entry body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WirePayload {
    /// Self-describing typed arguments.
    Verbose {
        /// Message ID kept from an ID-based entry sent through a verbose session.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        msg_id: Option<MessageId>,
        /// Typed arguments.
        args: Vec<LogArg>,
    },
    /// Message ID and untyped positional argument bytes.
    NonVerbose {
        /// Message ID.
        msg_id: MessageId,
        /// Little-endian argument bytes, see [`LogArg::write_raw`].
        data: Vec<u8>,
    },
}

impl WirePayload {
    /// Encodes `entry` for a session running in verbose or non-verbose mode.
    ///
    /// Only ID-based entries in a non-verbose session lose their type
    /// information; everything else is transmitted verbosely.
    pub fn encode(entry: &LogEntry, session_non_verbose: bool) -> Self {
        match entry.encoding {
            Encoding::NonVerbose { msg_id } if session_non_verbose => {
                let mut data = Vec::new();
                for arg in &entry.args {
                    arg.write_raw(&mut data);
                }
                Self::NonVerbose { msg_id, data }
            }
            encoding => Self::Verbose {
                msg_id: encoding.msg_id(),
                args: entry.args.clone(),
            },
        }
    }

    /// Message ID carried by the payload, if any.
    pub fn msg_id(&self) -> Option<MessageId> {
        match self {
            Self::Verbose { msg_id, .. } => *msg_id,
            Self::NonVerbose { msg_id, .. } => Some(*msg_id),
        }
    }
}

/// One entry as handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Owning application.
    pub app_id: AppId,
    /// Owning context.
    pub context_id: ContextId,
    /// Session-wide record counter, starting at 0.
    pub counter: RecordCounter,
    /// Wall-clock timestamp in milliseconds.
    pub ts_ms: u64,
    /// Severity.
    pub level: LogLevel,
    /// Encoded body.
    pub payload: WirePayload,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>4} {} {} {:<7}",
            self.ts_ms,
            self.counter,
            self.app_id,
            self.context_id,
            self.level.tag()
        )?;
        match &self.payload {
            WirePayload::Verbose { msg_id, args } => {
                f.write_str(" verbose")?;
                if let Some(id) = msg_id {
                    write!(f, " [{id}]")?;
                }
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            WirePayload::NonVerbose { msg_id, data } => {
                write!(f, " non-verbose [{msg_id}]")?;
                for b in data {
                    write!(f, " {b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Messages a client sends to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Application registration.
    RegisterApp {
        /// Application ID.
        app_id: AppId,
        /// Human-readable description.
        description: String,
    },
    /// Context registration.
    RegisterContext {
        /// Owning application.
        app_id: AppId,
        /// Context ID.
        context_id: ContextId,
        /// Human-readable description.
        description: String,
    },
    /// Emitted log record.
    Log {
        /// Record body.
        record: LogRecord,
    },
    /// Context removal.
    UnregisterContext {
        /// Owning application.
        app_id: AppId,
        /// Context ID.
        context_id: ContextId,
    },
    /// Application removal.
    UnregisterApp {
        /// Application ID.
        app_id: AppId,
    },
}

/// Versioned wrapper for stable line decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped frame.
    pub frame: Frame,
}

impl FrameEnvelope {
    /// Constructs an envelope using [`FRAME_FORMAT_VERSION`].
    pub fn new(frame: Frame) -> Self {
        Self {
            format_version: FRAME_FORMAT_VERSION,
            frame,
        }
    }
}

/// Messages a backend relays back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Request to run an in-process action.
    Injection {
        /// Target context.
        context_id: ContextId,
        /// Service selecting the action.
        service_id: ServiceId,
        /// Opaque request bytes.
        #[serde(default)]
        payload: Vec<u8>,
    },
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
