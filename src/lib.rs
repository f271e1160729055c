//! Demonstration client for a diagnostic logging backend.
//!
//! Registers one application and one context, emits a configurable number of
//! verbose or non-verbose entries to a daemon or a local file, and answers
//! injection requests relayed by the backend.
//!
//! # Examples
//!
//! Emitting three verbose entries to a file:
//! ```no_run
//! use std::time::Duration;
//!
//! use dlt_example_user::{
//!     backend::SystemConnector,
//!     config::SessionConfig,
//!     emitter::{self, EmitPlan},
//!     session::handle::{spawn_session, OutputTarget},
//!     types::EncodingMode,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cfg = SessionConfig::default();
//! let session = spawn_session(Box::new(SystemConnector::new(cfg.daemon_addr)), &cfg);
//! session
//!     .select_output_target(OutputTarget::File("demo.log".into()))
//!     .await
//!     .expect("file output");
//! session.register_application(cfg.app_id.clone(), "demo").await.expect("app");
//! session.register_context(cfg.context_id.clone(), "demo").await.expect("context");
//!
//! let plan = EmitPlan {
//!     message: "hello".to_string(),
//!     count: 3,
//!     delay: Duration::ZERO,
//!     mode: EncodingMode::Verbose,
//!     drain: Duration::ZERO,
//! };
//! let summary = emitter::run(&session, &plan, &mut std::io::stdout()).await;
//! assert_eq!(summary.emitted, 3);
//! session.teardown().await.expect("teardown");
//! # }
//! ```
#![deny(missing_docs)]

/// Backend trait plus file and daemon implementations.
pub mod backend;
/// Command-line surface.
pub mod cli;
/// Session identity and tuning.
pub mod config;
/// Run sequencing and exit codes.
pub mod driver;
/// Paced emission loop and the diagnostic burst.
pub mod emitter;
/// Log entries and typed arguments.
pub mod entry;
/// Injection callbacks and payload rendering.
pub mod injection;
/// `tracing` subscriber setup.
pub mod logging;
/// Wire records and frames.
pub mod record;
/// Session task, handle and events.
pub mod session;
/// Shared primitive types and enums.
pub mod types;
