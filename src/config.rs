//! Session identity and runtime tuning.

use std::net::SocketAddr;
use std::time::Duration;

use crate::{
    backend::daemon::DEFAULT_DAEMON_PORT,
    types::{AppId, ContextId, IdError, ServiceId},
};

/// Environment variable overriding the daemon address.
pub const DAEMON_ADDR_ENV: &str = "DLT_DAEMON_ADDR";

/// Service ID the demo registers its injection handler on.
pub const DEFAULT_INJECTION_SERVICE_ID: ServiceId = 0xFFF;

/// Identity and tuning for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Application ID.
    pub app_id: AppId,
    /// Application description.
    pub app_description: String,
    /// Context ID.
    pub context_id: ContextId,
    /// Context description.
    pub context_description: String,
    /// Service the injection handler is registered on.
    pub injection_service_id: ServiceId,
    /// Daemon address used when no output file is selected.
    pub daemon_addr: SocketAddr,
    /// Bound of the session command queue.
    pub command_queue_bound: usize,
    /// Capacity of the session event broadcast.
    pub event_capacity: usize,
    /// Wait after the last entry so the backend can drain before teardown.
    pub drain_period: Duration,
}

impl SessionConfig {
    /// Builds a config with custom identifiers and default tuning.
    pub fn with_ids(app_id: &str, context_id: &str) -> Result<Self, IdError> {
        Ok(Self {
            app_id: AppId::new(app_id)?,
            context_id: ContextId::new(context_id)?,
            ..Self::default()
        })
    }

    /// Default config with the daemon address taken from [`DAEMON_ADDR_ENV`] when set.
    ///
    /// An unparsable value is logged and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(DAEMON_ADDR_ENV) {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => cfg.daemon_addr = addr,
                Err(err) => {
                    tracing::warn!(value = %raw, error = %err, "ignoring {DAEMON_ADDR_ENV}");
                }
            }
        }
        cfg
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: AppId::from_static("LOG"),
            app_description: "Test Application for Logging".to_string(),
            context_id: ContextId::from_static("TEST"),
            context_description: "Test Context for Logging".to_string(),
            injection_service_id: DEFAULT_INJECTION_SERVICE_ID,
            daemon_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_DAEMON_PORT)),
            command_queue_bound: 256,
            event_capacity: 1024,
            drain_period: Duration::from_secs(1),
        }
    }
}
