#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use dlt_example_user::{
    backend::{BackendError, BackendResult, Connector, ControlReceiver, LogBackend},
    config::SessionConfig,
    injection::InjectionEvent,
    record::LogRecord,
    session::handle::{spawn_session, OutputTarget, SessionHandle},
    types::{AppId, ContextId, RecordCounter},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenFile(PathBuf),
    ConnectDaemon,
    RegisterApp(String),
    RegisterContext(String),
    Write(LogRecord),
    UnregisterContext(String),
    UnregisterApp(String),
    Flush,
    Release,
}

#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Calls with log writes collapsed, for lifecycle ordering checks.
    pub fn lifecycle(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Write(_) | Call::Flush))
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }
}

struct RecordingBackend {
    recorder: Recorder,
    fail_writes: Vec<RecordCounter>,
    control_rx: Option<ControlReceiver>,
}

impl LogBackend for RecordingBackend {
    fn register_app(&mut self, app_id: &AppId, _description: &str) -> BackendResult<()> {
        self.recorder.push(Call::RegisterApp(app_id.to_string()));
        Ok(())
    }

    fn register_context(
        &mut self,
        _app_id: &AppId,
        context_id: &ContextId,
        _description: &str,
    ) -> BackendResult<()> {
        self.recorder.push(Call::RegisterContext(context_id.to_string()));
        Ok(())
    }

    fn write(&mut self, record: &LogRecord) -> BackendResult<()> {
        if self.fail_writes.contains(&record.counter) {
            return Err(BackendError::Disconnected);
        }
        self.recorder.push(Call::Write(record.clone()));
        Ok(())
    }

    fn unregister_context(&mut self, _app_id: &AppId, context_id: &ContextId) -> BackendResult<()> {
        self.recorder.push(Call::UnregisterContext(context_id.to_string()));
        Ok(())
    }

    fn unregister_app(&mut self, app_id: &AppId) -> BackendResult<()> {
        self.recorder.push(Call::UnregisterApp(app_id.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> BackendResult<()> {
        self.recorder.push(Call::Flush);
        Ok(())
    }

    fn release(&mut self) -> BackendResult<()> {
        self.recorder.push(Call::Release);
        Ok(())
    }

    fn take_control_channel(&mut self) -> Option<ControlReceiver> {
        self.control_rx.take()
    }
}

pub struct FakeConnector {
    recorder: Recorder,
    fail_open: bool,
    fail_writes: Vec<RecordCounter>,
    control_rx: Option<ControlReceiver>,
}

impl FakeConnector {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            fail_open: false,
            fail_writes: Vec::new(),
            control_rx: None,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_writes(mut self, counters: Vec<RecordCounter>) -> Self {
        self.fail_writes = counters;
        self
    }

    pub fn with_control(mut self) -> (Self, mpsc::UnboundedSender<InjectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.control_rx = Some(rx);
        (self, tx)
    }

    fn backend(&mut self) -> Box<dyn LogBackend> {
        Box::new(RecordingBackend {
            recorder: self.recorder.clone(),
            fail_writes: std::mem::take(&mut self.fail_writes),
            control_rx: self.control_rx.take(),
        })
    }
}

impl Connector for FakeConnector {
    fn open_file(&mut self, path: &Path) -> BackendResult<Box<dyn LogBackend>> {
        self.recorder.push(Call::OpenFile(path.to_path_buf()));
        if self.fail_open {
            return Err(BackendError::Io(std::io::Error::other("cannot open log file")));
        }
        Ok(self.backend())
    }

    fn connect_daemon(&mut self) -> BackendResult<Box<dyn LogBackend>> {
        self.recorder.push(Call::ConnectDaemon);
        Ok(self.backend())
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        drain_period: Duration::ZERO,
        ..SessionConfig::default()
    }
}

/// Session with daemon target, application and context registered.
pub async fn registered_session(connector: FakeConnector) -> SessionHandle {
    let cfg = test_config();
    let session = spawn_session(Box::new(connector), &cfg);
    session
        .select_output_target(OutputTarget::Daemon)
        .await
        .expect("select target");
    session
        .register_application(cfg.app_id.clone(), cfg.app_description.clone())
        .await
        .expect("register app");
    session
        .register_context(cfg.context_id.clone(), cfg.context_description.clone())
        .await
        .expect("register context");
    session
}
