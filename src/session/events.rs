//! Session event stream payloads.

use crate::types::{RecordCounter, ServiceId};

use super::handle::OutputTarget;

/// Events emitted from the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output target was fixed.
    TargetSelected {
        /// Chosen target.
        target: OutputTarget,
    },
    /// Application was registered.
    AppRegistered,
    /// Context was registered.
    ContextRegistered,
    /// An injection handler was attached.
    InjectionCallbackRegistered {
        /// Service the handler answers.
        service_id: ServiceId,
    },
    /// A record reached the backend.
    Emitted {
        /// Session-wide record counter.
        counter: RecordCounter,
    },
    /// Local echo of a record the backend accepted.
    Echoed {
        /// Human-readable record line.
        line: String,
    },
    /// A record could not be handed to the backend.
    EmitFailed {
        /// Session-wide record counter.
        counter: RecordCounter,
    },
    /// An injection handler returned.
    InjectionHandled {
        /// Service that was invoked.
        service_id: ServiceId,
        /// Handler return code.
        code: i32,
    },
    /// Injection arrived for a service with no handler.
    InjectionUnhandled {
        /// Requested service.
        service_id: ServiceId,
    },
    /// Teardown completed.
    TornDown,
}
