//! Injection callbacks and mixed hex/ASCII payload rendering.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::{
    record::ControlFrame,
    types::{ContextId, ServiceId},
};

/// Capacity of the text produced by [`print_mixed`], in characters.
pub const MIXED_TEXT_CAPACITY: usize = 1024;

/// One injection request relayed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionEvent {
    /// Context the request addresses.
    pub context_id: ContextId,
    /// Service selecting the action.
    pub service_id: ServiceId,
    /// Opaque request bytes; may be empty.
    pub payload: Vec<u8>,
}

impl InjectionEvent {
    /// Payload length as reported to the handler.
    pub fn length(&self) -> u32 {
        u32::try_from(self.payload.len()).unwrap_or(u32::MAX)
    }
}

impl From<ControlFrame> for InjectionEvent {
    fn from(frame: ControlFrame) -> Self {
        match frame {
            ControlFrame::Injection {
                context_id,
                service_id,
                payload,
            } => Self {
                context_id,
                service_id,
                payload,
            },
        }
    }
}

/// Registered injection handler. The return code is reserved; `0` means handled.
pub type InjectionCallback = Arc<dyn Fn(&InjectionEvent) -> i32 + Send + Sync>;

/// Payload rendered as printable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedText {
    /// Rendered characters.
    pub text: String,
    /// Whether the payload did not fit in the capacity.
    pub truncated: bool,
}

/// Renders `payload` with printable ASCII bytes as themselves and every other
/// byte as a `\xNN` escape, keeping at most `capacity` characters.
///
/// An escape is never split; the output stops before the first piece that
/// does not fit.
pub fn print_mixed(payload: &[u8], capacity: usize) -> MixedText {
    let mut text = String::with_capacity(capacity.min(payload.len() * 4));
    for &b in payload {
        let width = if is_printable(b) { 1 } else { 4 };
        if text.len() + width > capacity {
            return MixedText {
                text,
                truncated: true,
            };
        }
        if width == 1 {
            text.push(char::from(b));
        } else {
            text.push_str(&format!("\\x{b:02x}"));
        }
    }
    MixedText {
        text,
        truncated: false,
    }
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// What the handler reported for one injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    /// Service ID.
    pub service_id: ServiceId,
    /// Payload length.
    pub length: u32,
    /// Decoded payload; `None` for an empty payload.
    pub decoded: Option<MixedText>,
}

impl InjectionReport {
    /// Builds the report for `event`; decoding is skipped for empty payloads.
    pub fn from_event(event: &InjectionEvent) -> Self {
        let decoded =
            (!event.payload.is_empty()).then(|| print_mixed(&event.payload, MIXED_TEXT_CAPACITY));
        Self {
            service_id: event.service_id,
            length: event.length(),
            decoded,
        }
    }
}

impl fmt::Display for InjectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Injection {}, Length={}", self.service_id, self.length)?;
        if let Some(decoded) = &self.decoded {
            write!(f, "\n{}", decoded.text)?;
        }
        Ok(())
    }
}

/// Reports one injection to `out`. Always returns `0`.
pub fn handle<W: Write + ?Sized>(event: &InjectionEvent, out: &mut W) -> i32 {
    let report = InjectionReport::from_event(event);
    if report.decoded.as_ref().is_some_and(|d| d.truncated) {
        tracing::debug!(
            service_id = report.service_id,
            length = report.length,
            "injection payload truncated for display"
        );
    }
    if let Err(err) = writeln!(out, "{report}") {
        tracing::warn!(error = %err, "failed to report injection");
    }
    0
}

/// Handler that reports injections on stdout.
pub fn stdout_callback() -> InjectionCallback {
    Arc::new(|event: &InjectionEvent| {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        handle(event, &mut lock)
    })
}
