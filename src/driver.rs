//! Sequences one demo run: parse, set up, emit, tear down.

use std::ffi::OsString;
use std::io::Write;

use crate::{
    backend::{Connector, SystemConnector},
    cli::{self, Options},
    config::SessionConfig,
    emitter::{self, EmitPlan},
    injection::{self, InjectionCallback},
    session::handle::{SessionError, SessionHandle, spawn_session},
    types::EncodingMode,
};

/// Process exit code for a successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for usage and initialization failures.
pub const EXIT_FAILURE: i32 = -1;

/// Everything a run needs besides its arguments.
pub struct Driver {
    /// Session identity and tuning.
    pub config: SessionConfig,
    /// Opens the selected backend.
    pub connector: Box<dyn Connector>,
    /// Handler registered on [`SessionConfig::injection_service_id`].
    pub injection: InjectionCallback,
}

impl Driver {
    /// Driver using the real file and daemon backends and a stdout injection handler.
    pub fn system(config: SessionConfig) -> Self {
        let connector = Box::new(SystemConnector::new(config.daemon_addr));
        Self {
            config,
            connector,
            injection: injection::stdout_callback(),
        }
    }

    /// Runs the demo for `args` (program name first) and returns the exit code.
    ///
    /// Progress lines go to `out`; usage and fatal errors go to `err`. The
    /// session is torn down on every path.
    pub async fn run<I, T, O, E>(self, args: I, out: &mut O, err: &mut E) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        O: Write + ?Sized,
        E: Write + ?Sized,
    {
        let Driver {
            config,
            connector,
            injection,
        } = self;
        let session = spawn_session(connector, &config);

        let code = match cli::parse_args(args) {
            Ok(options) => match drive(&session, &config, options, injection, out).await {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "run aborted");
                    let _ = writeln!(err, "{e}");
                    EXIT_FAILURE
                }
            },
            Err(usage) => {
                let _ = writeln!(err, "{usage}");
                let _ = write!(err, "{}", cli::usage_text());
                EXIT_FAILURE
            }
        };

        if let Err(e) = session.teardown().await {
            tracing::warn!(error = %e, "teardown failed");
        }
        code
    }
}

async fn drive<O>(
    session: &SessionHandle,
    config: &SessionConfig,
    options: Options,
    injection: InjectionCallback,
    out: &mut O,
) -> Result<(), SessionError>
where
    O: Write + ?Sized,
{
    session.select_output_target(options.output.clone()).await?;
    session
        .register_application(config.app_id.clone(), config.app_description.clone())
        .await?;
    session
        .register_context(config.context_id.clone(), config.context_description.clone())
        .await?;
    session
        .register_injection_callback(config.injection_service_id, injection)
        .await?;

    if options.mode == EncodingMode::NonVerbose {
        session.set_non_verbose_mode().await?;
    }
    if options.local_echo {
        session.enable_local_echo().await?;
    }

    let plan = EmitPlan {
        message: options.message,
        count: options.count,
        delay: options.delay,
        mode: options.mode,
        drain: config.drain_period,
    };
    let summary = emitter::run(session, &plan, out).await;
    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, emitted = summary.emitted, "some entries were not sent");
    }
    Ok(())
}
