//! Paced emission of numbered log entries.

use std::io::Write;
use std::num::TryFromIntError;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::{
    entry::{LogArg, LogEntry},
    session::{
        events::SessionEvent,
        handle::{SessionError, SessionHandle},
    },
    types::{EncodingMode, LogLevel, MessageId, SeqNum},
};

/// Message IDs of the fixed non-verbose diagnostic burst.
pub const BURST_MSG_IDS: [MessageId; 5] = [10, 11, 12, 13, 14];

/// Largest main-loop count; the sequence number travels as a signed 32-bit integer.
pub const MAX_COUNT: u64 = 0x7fff_ffff;

/// What one run emits and how it is paced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitPlan {
    /// Text sent with every main-loop entry.
    pub message: String,
    /// Number of main-loop entries.
    pub count: u64,
    /// Pause after each entry; zero disables pacing.
    pub delay: Duration,
    /// Encoding used for every entry of the run.
    pub mode: EncodingMode,
    /// Pause after the loop so the backend can drain.
    pub drain: Duration,
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries accepted by the backend, burst included.
    pub emitted: u64,
    /// Entries the backend rejected.
    pub failed: u64,
}

/// The five ID-based entries used to check non-verbose decoding on the receiver.
pub fn diagnostic_burst() -> Vec<LogEntry> {
    vec![
        LogEntry::with_id(LogLevel::Info, 10, vec![]),
        LogEntry::with_id(LogLevel::Info, 11, vec![LogArg::Uint16(1011)]),
        LogEntry::with_id(
            LogLevel::Info,
            12,
            vec![LogArg::Uint32(1012), LogArg::Uint32(1013)],
        ),
        LogEntry::with_id(
            LogLevel::Info,
            13,
            vec![LogArg::Uint8(123), LogArg::Float32(1.12)],
        ),
        LogEntry::with_id(
            LogLevel::Info,
            14,
            vec![LogArg::String("DEAD BEEF".to_string())],
        ),
    ]
}

/// Main-loop entry `seq` carrying `(seq, message)`.
///
/// Non-verbose entries use `seq` as their message ID. Fails for `seq` above
/// [`MAX_COUNT`].
pub fn main_entry(
    seq: SeqNum,
    message: &str,
    mode: EncodingMode,
) -> Result<LogEntry, TryFromIntError> {
    let value = i32::try_from(seq)?;
    let args = vec![LogArg::Int(value), LogArg::String(message.to_string())];
    let entry = match mode {
        EncodingMode::Verbose => LogEntry::verbose(LogLevel::Warn, args),
        EncodingMode::NonVerbose => {
            LogEntry::with_id(LogLevel::Warn, MessageId::try_from(seq)?, args)
        }
    };
    Ok(entry.at_seq(seq))
}

/// Runs the plan against `session`, reporting progress lines to `progress`.
///
/// Records echoed by the session are written to `progress` after the entry
/// that produced them. Emit failures are logged and counted; the loop runs
/// to `count` and stops early at a sequence number above [`MAX_COUNT`].
pub async fn run<W>(session: &SessionHandle, plan: &EmitPlan, progress: &mut W) -> RunSummary
where
    W: Write + ?Sized,
{
    let mut summary = RunSummary::default();
    let mut events = session.subscribe();

    if plan.mode == EncodingMode::NonVerbose {
        for entry in diagnostic_burst() {
            let msg_id = entry.encoding.msg_id();
            submit(session, entry, &mut summary, |err| {
                tracing::warn!(?msg_id, error = %err, "diagnostic entry not sent");
            })
            .await;
            write_echoes(&mut events, progress);
        }
    }

    for seq in 0..plan.count {
        let entry = match main_entry(seq, &plan.message, plan.mode) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(seq, error = %err, "sequence number out of range, stopping");
                break;
            }
        };
        if let Err(err) = writeln!(progress, "Send {seq} {}", plan.message) {
            tracing::debug!(error = %err, "progress output failed");
        }

        submit(session, entry, &mut summary, |err| {
            tracing::warn!(seq, error = %err, "log entry not sent");
        })
        .await;
        write_echoes(&mut events, progress);

        if !plan.delay.is_zero() {
            tokio::time::sleep(plan.delay).await;
        }
    }

    if !plan.drain.is_zero() {
        tokio::time::sleep(plan.drain).await;
    }

    tracing::debug!(
        emitted = summary.emitted,
        failed = summary.failed,
        "emission finished"
    );
    summary
}

async fn submit(
    session: &SessionHandle,
    entry: LogEntry,
    summary: &mut RunSummary,
    on_error: impl FnOnce(&SessionError),
) {
    match session.emit(entry).await {
        Ok(_) => summary.emitted += 1,
        Err(err) => {
            on_error(&err);
            summary.failed += 1;
        }
    }
}

fn write_echoes<W: Write + ?Sized>(events: &mut broadcast::Receiver<SessionEvent>, out: &mut W) {
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Echoed { line }) => {
                if let Err(err) = writeln!(out, "{line}") {
                    tracing::debug!(error = %err, "echo output failed");
                }
            }
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "session events lagged, echo lines lost");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
