//! Logging backend abstraction plus file and daemon implementations.

pub mod daemon;
pub mod file;

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    injection::InjectionEvent,
    record::LogRecord,
    types::{AppId, ContextId},
};

/// Failure reported by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Underlying I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Frame could not be (de)serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// No live connection to the daemon.
    #[error("not connected to logging daemon")]
    Disconnected,
    /// Any other backend-specific failure.
    #[error("{0}")]
    Message(String),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Receiving side of a backend's injection control channel.
pub type ControlReceiver = mpsc::UnboundedReceiver<InjectionEvent>;

/// Client-side interface to a logging backend.
///
/// Calls may block on I/O; the session runs them off the async workers.
pub trait LogBackend: Send {
    /// Announces the application.
    fn register_app(&mut self, _app_id: &AppId, _description: &str) -> BackendResult<()> {
        Ok(())
    }

    /// Announces a context of the registered application.
    fn register_context(
        &mut self,
        _app_id: &AppId,
        _context_id: &ContextId,
        _description: &str,
    ) -> BackendResult<()> {
        Ok(())
    }

    /// Transmits one record.
    fn write(&mut self, record: &LogRecord) -> BackendResult<()>;

    /// Removes a context.
    fn unregister_context(&mut self, _app_id: &AppId, _context_id: &ContextId) -> BackendResult<()> {
        Ok(())
    }

    /// Removes the application.
    fn unregister_app(&mut self, _app_id: &AppId) -> BackendResult<()> {
        Ok(())
    }

    /// Pushes buffered records out.
    fn flush(&mut self) -> BackendResult<()> {
        Ok(())
    }

    /// Releases all backend resources. Called once, last.
    fn release(&mut self) -> BackendResult<()> {
        self.flush()
    }

    /// Hands out the channel on which the backend relays injection requests.
    ///
    /// Returns `None` for backends without a control channel or once taken.
    fn take_control_channel(&mut self) -> Option<ControlReceiver> {
        None
    }
}

/// Opens backends for a selected output target.
pub trait Connector: Send {
    /// Prepares file output at `path`.
    fn open_file(&mut self, path: &Path) -> BackendResult<Box<dyn LogBackend>>;
    /// Connects to the live daemon.
    fn connect_daemon(&mut self) -> BackendResult<Box<dyn LogBackend>>;
}

/// [`Connector`] producing [`file::FileBackend`] and [`daemon::DaemonBackend`].
#[derive(Debug, Clone)]
pub struct SystemConnector {
    daemon_addr: SocketAddr,
}

impl SystemConnector {
    /// Creates a connector targeting the daemon at `daemon_addr`.
    pub fn new(daemon_addr: SocketAddr) -> Self {
        Self { daemon_addr }
    }
}

impl Connector for SystemConnector {
    fn open_file(&mut self, path: &Path) -> BackendResult<Box<dyn LogBackend>> {
        Ok(Box::new(file::FileBackend::create(path)?))
    }

    fn connect_daemon(&mut self) -> BackendResult<Box<dyn LogBackend>> {
        Ok(Box::new(daemon::DaemonBackend::connect(self.daemon_addr)))
    }
}

/// Backend library version line shown in usage text.
pub fn version_string() -> String {
    format!(
        "{} Package Version: {}, frame format {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        crate::record::FRAME_FORMAT_VERSION
    )
}
