//! TCP client backend talking line-delimited JSON to a logging daemon.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
    injection::InjectionEvent,
    record::{ControlFrame, Frame, FrameEnvelope, LogRecord},
    types::{AppId, ContextId},
};

use super::{BackendError, BackendResult, ControlReceiver, LogBackend};

/// Default daemon listen port on localhost.
pub const DEFAULT_DAEMON_PORT: u16 = 3490;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection to a running daemon.
///
/// A daemon that cannot be reached leaves the backend disconnected; every
/// call then fails with [`BackendError::Disconnected`]. No reconnect is
/// attempted.
pub struct DaemonBackend {
    addr: SocketAddr,
    stream: Option<BufWriter<TcpStream>>,
    control_rx: Option<ControlReceiver>,
}

impl DaemonBackend {
    /// Connects to `addr` and starts the control reader thread.
    pub fn connect(addr: SocketAddr) -> Self {
        match Self::try_connect(addr) {
            Ok((stream, control_rx)) => {
                tracing::debug!(%addr, "connected to logging daemon");
                Self {
                    addr,
                    stream: Some(BufWriter::new(stream)),
                    control_rx: Some(control_rx),
                }
            }
            Err(err) => {
                tracing::warn!(%addr, error = %err, "logging daemon unreachable");
                Self {
                    addr,
                    stream: None,
                    control_rx: None,
                }
            }
        }
    }

    /// Daemon address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether a connection was established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn try_connect(addr: SocketAddr) -> std::io::Result<(TcpStream, ControlReceiver)> {
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("dlt-control".to_string())
            .spawn(move || read_control(reader, tx))?;
        Ok((stream, rx))
    }

    fn send(&mut self, frame: Frame) -> BackendResult<()> {
        let out = self.stream.as_mut().ok_or(BackendError::Disconnected)?;
        serde_json::to_writer(&mut *out, &FrameEnvelope::new(frame))?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

fn read_control(stream: TcpStream, tx: mpsc::UnboundedSender<InjectionEvent>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::debug!(error = %err, "control channel closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ControlFrame>(&line) {
            Ok(frame) => {
                if tx.send(InjectionEvent::from(frame)).is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(error = %err, "ignoring malformed control frame"),
        }
    }
}

impl LogBackend for DaemonBackend {
    fn register_app(&mut self, app_id: &AppId, description: &str) -> BackendResult<()> {
        self.send(Frame::RegisterApp {
            app_id: app_id.clone(),
            description: description.to_string(),
        })?;
        self.flush()
    }

    fn register_context(
        &mut self,
        app_id: &AppId,
        context_id: &ContextId,
        description: &str,
    ) -> BackendResult<()> {
        self.send(Frame::RegisterContext {
            app_id: app_id.clone(),
            context_id: context_id.clone(),
            description: description.to_string(),
        })?;
        self.flush()
    }

    fn write(&mut self, record: &LogRecord) -> BackendResult<()> {
        self.send(Frame::Log {
            record: record.clone(),
        })?;
        self.flush()
    }

    fn unregister_context(&mut self, app_id: &AppId, context_id: &ContextId) -> BackendResult<()> {
        self.send(Frame::UnregisterContext {
            app_id: app_id.clone(),
            context_id: context_id.clone(),
        })?;
        self.flush()
    }

    fn unregister_app(&mut self, app_id: &AppId) -> BackendResult<()> {
        self.send(Frame::UnregisterApp {
            app_id: app_id.clone(),
        })?;
        self.flush()
    }

    fn flush(&mut self) -> BackendResult<()> {
        let out = self.stream.as_mut().ok_or(BackendError::Disconnected)?;
        out.flush()?;
        Ok(())
    }

    fn release(&mut self) -> BackendResult<()> {
        let Some(mut out) = self.stream.take() else {
            return Ok(());
        };
        let flushed = out.flush();
        // Wakes the control reader so its thread exits.
        let _ = out.get_ref().shutdown(Shutdown::Both);
        flushed?;
        Ok(())
    }

    fn take_control_channel(&mut self) -> Option<ControlReceiver> {
        self.control_rx.take()
    }
}
