use std::path::PathBuf;
use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock, broadcast, mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    backend::{BackendError, BackendResult, Connector, ControlReceiver, LogBackend},
    config::SessionConfig,
    entry::LogEntry,
    injection::{InjectionCallback, InjectionEvent},
    record::{LogRecord, WirePayload, now_ms},
    types::{AppId, ContextId, RecordCounter, ServiceId},
};

use super::events::SessionEvent;

/// Failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The selected output target could not be prepared.
    #[error("output target initialization failed: {0}")]
    BackendInit(#[source] BackendError),
    /// The backend rejected an operation.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    /// Operation called out of order or more often than allowed.
    #[error("contract violation: {0}")]
    Contract(&'static str),
    /// Teardown already ran.
    #[error("session already torn down")]
    AlreadyTornDown,
    /// The session task is gone.
    #[error("session task stopped")]
    ChannelClosed,
    /// A blocking backend call panicked or was cancelled.
    #[error("backend task failed: {0}")]
    Join(String),
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Live logging daemon.
    Daemon,
    /// Local file.
    File(PathBuf),
}

impl OutputTarget {
    /// File target when `path` is given, daemon otherwise.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Daemon, Self::File)
    }
}

/// Which teardown steps were performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Context was unregistered.
    pub context_unregistered: bool,
    /// Application was unregistered.
    pub app_unregistered: bool,
    /// Backend resources were released.
    pub backend_released: bool,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Selected output target.
    pub target: Option<OutputTarget>,
    /// Registered application.
    pub app_id: Option<AppId>,
    /// Registered context.
    pub context_id: Option<ContextId>,
    /// Non-verbose mode active.
    pub non_verbose: bool,
    /// Local echo active.
    pub local_echo: bool,
    /// Records handed to the backend so far, failed ones included.
    pub records: RecordCounter,
    /// Teardown has run.
    pub torn_down: bool,
}

type SharedBackend = Arc<Mutex<Box<dyn LogBackend>>>;
type CallbackRegistry = Arc<RwLock<HashMap<(ContextId, ServiceId), InjectionCallback>>>;
type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Cloneable handle to the session task.
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    SelectTarget {
        target: OutputTarget,
        resp: Reply<()>,
    },
    RegisterApp {
        app_id: AppId,
        description: String,
        resp: Reply<()>,
    },
    RegisterContext {
        context_id: ContextId,
        description: String,
        resp: Reply<()>,
    },
    RegisterInjection {
        service_id: ServiceId,
        callback: InjectionCallback,
        resp: Reply<()>,
    },
    SetNonVerbose {
        resp: Reply<()>,
    },
    EnableLocalEcho {
        resp: Reply<()>,
    },
    Emit {
        entry: LogEntry,
        resp: Reply<RecordCounter>,
    },
    Flush {
        resp: Reply<()>,
    },
    Status {
        resp: oneshot::Sender<SessionStatus>,
    },
    Teardown {
        resp: Reply<TeardownReport>,
    },
}

struct SessionState {
    connector: Option<Box<dyn Connector>>,
    target: Option<OutputTarget>,
    backend: Option<SharedBackend>,
    app: Option<AppId>,
    context: Option<ContextId>,
    non_verbose: bool,
    local_echo: bool,
    next_counter: RecordCounter,
    registry: CallbackRegistry,
    dispatcher: Option<JoinHandle<()>>,
    torn_down: bool,
}

/// Spawns the session task on the current tokio runtime.
///
/// Nothing touches the backend until [`SessionHandle::select_output_target`].
pub fn spawn_session(connector: Box<dyn Connector>, config: &SessionConfig) -> SessionHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<SessionEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut state = SessionState {
            connector: Some(connector),
            target: None,
            backend: None,
            app: None,
            context: None,
            non_verbose: false,
            local_echo: false,
            next_counter: 0,
            registry: Arc::new(RwLock::new(HashMap::new())),
            dispatcher: None,
            torn_down: false,
        };

        while let Some(cmd) = cmd_rx.recv().await {
            handle_command(cmd, &mut state, &events_tx_loop).await;
        }

        if !state.torn_down {
            tracing::warn!("session dropped without teardown");
            let _ = teardown(&mut state, &events_tx_loop).await;
        }
    });

    SessionHandle { cmd_tx, events_tx }
}

impl SessionHandle {
    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Fixes the output target. At most once, before any registration.
    pub async fn select_output_target(&self, target: OutputTarget) -> Result<(), SessionError> {
        self.request(|resp| Command::SelectTarget { target, resp })
            .await
    }

    /// Registers the application. Exactly once, after target selection.
    pub async fn register_application(
        &self,
        app_id: AppId,
        description: impl Into<String>,
    ) -> Result<(), SessionError> {
        let description = description.into();
        self.request(|resp| Command::RegisterApp {
            app_id,
            description,
            resp,
        })
        .await
    }

    /// Registers the context. Exactly once, after the application.
    pub async fn register_context(
        &self,
        context_id: ContextId,
        description: impl Into<String>,
    ) -> Result<(), SessionError> {
        let description = description.into();
        self.request(|resp| Command::RegisterContext {
            context_id,
            description,
            resp,
        })
        .await
    }

    /// Attaches `callback` to `service_id` on the registered context.
    ///
    /// The callback runs on a blocking worker whenever the backend relays an
    /// injection for that service, concurrently with emission.
    pub async fn register_injection_callback(
        &self,
        service_id: ServiceId,
        callback: InjectionCallback,
    ) -> Result<(), SessionError> {
        self.request(|resp| Command::RegisterInjection {
            service_id,
            callback,
            resp,
        })
        .await
    }

    /// Switches ID-based entries to untyped transmission. Only before the first entry.
    pub async fn set_non_verbose_mode(&self) -> Result<(), SessionError> {
        self.request(|resp| Command::SetNonVerbose { resp }).await
    }

    /// Publishes every accepted record as [`SessionEvent::Echoed`]. Only before the first entry.
    pub async fn enable_local_echo(&self) -> Result<(), SessionError> {
        self.request(|resp| Command::EnableLocalEcho { resp }).await
    }

    /// Hands one entry to the backend and returns its record counter.
    pub async fn emit(&self, entry: LogEntry) -> Result<RecordCounter, SessionError> {
        self.request(|resp| Command::Emit { entry, resp }).await
    }

    /// Flushes the backend.
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.request(|resp| Command::Flush { resp }).await
    }

    /// Current session state.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status { resp: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Unregisters context and application and releases the backend.
    ///
    /// Steps that never happened are skipped. A second call fails with
    /// [`SessionError::AlreadyTornDown`].
    pub async fn teardown(&self) -> Result<TeardownReport, SessionError> {
        self.request(|resp| Command::Teardown { resp }).await
    }
}

async fn handle_command(
    cmd: Command,
    state: &mut SessionState,
    events_tx: &broadcast::Sender<SessionEvent>,
) {
    if state.torn_down {
        reject_torn_down(cmd, state);
        return;
    }

    match cmd {
        Command::SelectTarget { target, resp } => {
            let res = select_target(state, target.clone(), events_tx).await;
            if res.is_ok() {
                let _ = events_tx.send(SessionEvent::TargetSelected { target });
            }
            let _ = resp.send(res);
        }
        Command::RegisterApp {
            app_id,
            description,
            resp,
        } => {
            let res = register_app(state, app_id, description).await;
            if res.is_ok() {
                let _ = events_tx.send(SessionEvent::AppRegistered);
            }
            let _ = resp.send(res);
        }
        Command::RegisterContext {
            context_id,
            description,
            resp,
        } => {
            let res = register_context(state, context_id, description).await;
            if res.is_ok() {
                let _ = events_tx.send(SessionEvent::ContextRegistered);
            }
            let _ = resp.send(res);
        }
        Command::RegisterInjection {
            service_id,
            callback,
            resp,
        } => {
            let res = register_injection(state, service_id, callback).await;
            if res.is_ok() {
                let _ = events_tx.send(SessionEvent::InjectionCallbackRegistered { service_id });
            }
            let _ = resp.send(res);
        }
        Command::SetNonVerbose { resp } => {
            let res = ensure_nothing_emitted(state).map(|()| state.non_verbose = true);
            let _ = resp.send(res);
        }
        Command::EnableLocalEcho { resp } => {
            let res = ensure_nothing_emitted(state).map(|()| state.local_echo = true);
            let _ = resp.send(res);
        }
        Command::Emit { entry, resp } => {
            let res = emit(state, entry, events_tx).await;
            match &res {
                Ok(counter) => {
                    let _ = events_tx.send(SessionEvent::Emitted { counter: *counter });
                }
                Err(err) => {
                    tracing::debug!(error = %err, "emit failed");
                    if !matches!(err, SessionError::Contract(_)) {
                        let _ = events_tx.send(SessionEvent::EmitFailed {
                            counter: state.next_counter.saturating_sub(1),
                        });
                    }
                }
            }
            let _ = resp.send(res);
        }
        Command::Flush { resp } => {
            let res = match state.backend.as_ref() {
                Some(backend) => call_backend(backend, |b| b.flush()).await,
                None => Ok(()),
            };
            let _ = resp.send(res);
        }
        Command::Status { resp } => {
            let _ = resp.send(status(state));
        }
        Command::Teardown { resp } => {
            let report = teardown(state, events_tx).await;
            let _ = resp.send(Ok(report));
        }
    }
}

fn reject_torn_down(cmd: Command, state: &SessionState) {
    match cmd {
        Command::SelectTarget { resp, .. }
        | Command::RegisterApp { resp, .. }
        | Command::RegisterContext { resp, .. }
        | Command::RegisterInjection { resp, .. }
        | Command::SetNonVerbose { resp }
        | Command::EnableLocalEcho { resp }
        | Command::Flush { resp } => {
            let _ = resp.send(Err(SessionError::AlreadyTornDown));
        }
        Command::Emit { resp, .. } => {
            let _ = resp.send(Err(SessionError::AlreadyTornDown));
        }
        Command::Teardown { resp } => {
            let _ = resp.send(Err(SessionError::AlreadyTornDown));
        }
        Command::Status { resp } => {
            let _ = resp.send(status(state));
        }
    }
}

async fn select_target(
    state: &mut SessionState,
    target: OutputTarget,
    events_tx: &broadcast::Sender<SessionEvent>,
) -> Result<(), SessionError> {
    if state.target.is_some() {
        return Err(SessionError::Contract("output target already selected"));
    }
    if state.app.is_some() {
        return Err(SessionError::Contract("output target must be selected before registration"));
    }
    let mut connector = state
        .connector
        .take()
        .ok_or(SessionError::Contract("output target already selected"))?;

    let open_target = target.clone();
    let opened = tokio::task::spawn_blocking(move || match &open_target {
        OutputTarget::Daemon => connector.connect_daemon(),
        OutputTarget::File(path) => connector.open_file(path),
    })
    .await
    .map_err(|e| SessionError::Join(e.to_string()))?;

    let mut backend = opened.map_err(SessionError::BackendInit)?;
    if let Some(control_rx) = backend.take_control_channel() {
        state.dispatcher = Some(spawn_injection_dispatcher(
            control_rx,
            Arc::clone(&state.registry),
            events_tx.clone(),
        ));
    }

    tracing::info!(output = ?target, "output target selected");
    state.backend = Some(Arc::new(Mutex::new(backend)));
    state.target = Some(target);
    Ok(())
}

async fn register_app(
    state: &mut SessionState,
    app_id: AppId,
    description: String,
) -> Result<(), SessionError> {
    let Some(backend) = state.backend.as_ref() else {
        return Err(SessionError::Contract("application registered before output target"));
    };
    if state.app.is_some() {
        return Err(SessionError::Contract("application already registered"));
    }

    let id = app_id.clone();
    let res = call_backend(backend, move |b| b.register_app(&id, &description)).await;
    note_registration_failure(res, "application");
    state.app = Some(app_id);
    Ok(())
}

async fn register_context(
    state: &mut SessionState,
    context_id: ContextId,
    description: String,
) -> Result<(), SessionError> {
    let (Some(backend), Some(app_id)) = (state.backend.as_ref(), state.app.clone()) else {
        return Err(SessionError::Contract("context registered before application"));
    };
    if state.context.is_some() {
        return Err(SessionError::Contract("context already registered"));
    }

    let id = context_id.clone();
    let res = call_backend(backend, move |b| b.register_context(&app_id, &id, &description)).await;
    note_registration_failure(res, "context");
    state.context = Some(context_id);
    Ok(())
}

// The client keeps its registration even when the backend cannot be told;
// records then fail individually.
fn note_registration_failure(res: Result<(), SessionError>, what: &'static str) {
    if let Err(err) = res {
        tracing::warn!(error = %err, "{what} registration not acknowledged by backend");
    }
}

async fn register_injection(
    state: &mut SessionState,
    service_id: ServiceId,
    callback: InjectionCallback,
) -> Result<(), SessionError> {
    let Some(context_id) = state.context.clone() else {
        return Err(SessionError::Contract("injection callback registered before context"));
    };
    let mut registry = state.registry.write().await;
    let key = (context_id, service_id);
    if registry.contains_key(&key) {
        return Err(SessionError::Contract("service already has an injection callback"));
    }
    registry.insert(key, callback);
    Ok(())
}

fn ensure_nothing_emitted(state: &SessionState) -> Result<(), SessionError> {
    if state.next_counter > 0 {
        return Err(SessionError::Contract("mode toggles must precede the first entry"));
    }
    Ok(())
}

async fn emit(
    state: &mut SessionState,
    entry: LogEntry,
    events_tx: &broadcast::Sender<SessionEvent>,
) -> Result<RecordCounter, SessionError> {
    let (Some(backend), Some(app_id), Some(context_id)) = (
        state.backend.as_ref(),
        state.app.clone(),
        state.context.clone(),
    ) else {
        return Err(SessionError::Contract("entry emitted before context registration"));
    };

    let counter = state.next_counter;
    state.next_counter += 1;

    let record = LogRecord {
        app_id,
        context_id,
        counter,
        ts_ms: now_ms(),
        level: entry.level,
        payload: WirePayload::encode(&entry, state.non_verbose),
    };

    let echo = state.local_echo.then(|| record.to_string());
    call_backend(backend, move |b| b.write(&record)).await?;
    if let Some(line) = echo {
        let _ = events_tx.send(SessionEvent::Echoed { line });
    }
    Ok(counter)
}

fn status(state: &SessionState) -> SessionStatus {
    SessionStatus {
        target: state.target.clone(),
        app_id: state.app.clone(),
        context_id: state.context.clone(),
        non_verbose: state.non_verbose,
        local_echo: state.local_echo,
        records: state.next_counter,
        torn_down: state.torn_down,
    }
}

async fn teardown(
    state: &mut SessionState,
    events_tx: &broadcast::Sender<SessionEvent>,
) -> TeardownReport {
    let mut report = TeardownReport::default();
    state.torn_down = true;

    if let Some(dispatcher) = state.dispatcher.take() {
        dispatcher.abort();
    }
    state.registry.write().await.clear();

    let Some(backend) = state.backend.take() else {
        let _ = events_tx.send(SessionEvent::TornDown);
        return report;
    };

    if let (Some(app_id), Some(context_id)) = (state.app.clone(), state.context.take()) {
        let res = call_backend(&backend, move |b| b.unregister_context(&app_id, &context_id)).await;
        if let Err(err) = res {
            tracing::warn!(error = %err, "context unregistration failed");
        }
        report.context_unregistered = true;
    }

    if let Some(app_id) = state.app.take() {
        let res = call_backend(&backend, move |b| b.unregister_app(&app_id)).await;
        if let Err(err) = res {
            tracing::warn!(error = %err, "application unregistration failed");
        }
        report.app_unregistered = true;
    }

    if let Err(err) = call_backend(&backend, |b| b.release()).await {
        tracing::warn!(error = %err, "backend release failed");
    }
    report.backend_released = true;

    tracing::info!(records = state.next_counter, "session torn down");
    let _ = events_tx.send(SessionEvent::TornDown);
    report
}

async fn call_backend<T, F>(backend: &SharedBackend, f: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn LogBackend) -> BackendResult<T> + Send + 'static,
{
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || {
        let mut guard = backend.blocking_lock();
        f(&mut **guard)
    })
    .await
    .map_err(|e| SessionError::Join(e.to_string()))?
    .map_err(SessionError::from)
}

fn spawn_injection_dispatcher(
    mut control_rx: ControlReceiver,
    registry: CallbackRegistry,
    events_tx: broadcast::Sender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = control_rx.recv().await {
            dispatch_injection(event, &registry, &events_tx).await;
        }
    })
}

async fn dispatch_injection(
    event: InjectionEvent,
    registry: &CallbackRegistry,
    events_tx: &broadcast::Sender<SessionEvent>,
) {
    let callback = registry
        .read()
        .await
        .get(&(event.context_id.clone(), event.service_id))
        .cloned();

    let Some(callback) = callback else {
        tracing::debug!(
            context = %event.context_id,
            service_id = event.service_id,
            "injection for unregistered service dropped"
        );
        let _ = events_tx.send(SessionEvent::InjectionUnhandled {
            service_id: event.service_id,
        });
        return;
    };

    let service_id = event.service_id;
    match tokio::task::spawn_blocking(move || callback(&event)).await {
        Ok(code) => {
            tracing::debug!(service_id, code, "injection handled");
            let _ = events_tx.send(SessionEvent::InjectionHandled { service_id, code });
        }
        Err(err) => tracing::warn!(service_id, error = %err, "injection callback panicked"),
    }
}
