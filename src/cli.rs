use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::{emitter::MAX_COUNT, session::handle::OutputTarget, types::EncodingMode};

/// Default pause between messages, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 500;
/// Default number of messages.
pub const DEFAULT_COUNT: u64 = 10;

/// Command line of the demo, getopt style.
///
/// Repeating an option is allowed; the last occurrence wins.
#[derive(Parser, Debug)]
#[command(name = "dlt-example-user")]
#[command(disable_help_flag = true, disable_version_flag = true, args_override_self = true)]
pub struct Cli {
    /// Verbose mode
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Switch to non-verbose mode
    #[arg(short = 'g')]
    pub non_verbose: bool,

    /// Enable local printing of log messages
    #[arg(short = 'a')]
    pub local_print: bool,

    /// Milliseconds to wait between sending messages
    #[arg(short = 'd', value_name = "delay", default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Use local log file instead of sending to daemon
    #[arg(short = 'f', value_name = "filename")]
    pub file: Option<PathBuf>,

    /// Number of messages to be generated
    #[arg(
        short = 'n',
        value_name = "count",
        default_value_t = DEFAULT_COUNT,
        value_parser = clap::value_parser!(u64).range(..=MAX_COUNT)
    )]
    pub count: u64,

    /// Message text; the last one given is used
    #[arg(value_name = "message")]
    pub messages: Vec<String>,
}

/// Bad or missing command-line input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// No positional message was given.
    #[error("ERROR: No message selected")]
    MissingMessage,
    /// Unknown option, missing option argument or malformed value.
    #[error("{0}")]
    Invalid(String),
}

/// Validated run options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Encoding for the whole run.
    pub mode: EncodingMode,
    /// Print records locally as well.
    pub local_echo: bool,
    /// Pause between messages.
    pub delay: Duration,
    /// Daemon or file.
    pub output: OutputTarget,
    /// Number of main-loop messages.
    pub count: u64,
    /// Message text.
    pub message: String,
}

impl Cli {
    /// Validates parsed flags into [`Options`].
    pub fn into_options(self) -> Result<Options, UsageError> {
        let message = self.messages.into_iter().last().ok_or(UsageError::MissingMessage)?;
        let mode = if self.non_verbose {
            EncodingMode::NonVerbose
        } else {
            EncodingMode::Verbose
        };
        Ok(Options {
            mode,
            local_echo: self.local_print,
            delay: Duration::from_millis(self.delay_ms),
            output: OutputTarget::from_path(self.file),
            count: self.count,
            message,
        })
    }
}

/// Parses `args` (program name first) into run options.
pub fn parse_args<I, T>(args: I) -> Result<Options, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|err| {
        let text = err.to_string();
        let first = text.lines().next().unwrap_or_default().trim().to_string();
        UsageError::Invalid(first)
    })?;
    cli.into_options()
}

/// Usage text, including the backend version line.
pub fn usage_text() -> String {
    format!(
        "Usage: dlt-example-user [options] message\n\
         Generate DLT messages and store them to file or send them to daemon.\n\
         {}\n\
         Options:\n\
         \x20 -v            Verbose mode\n\
         \x20 -d delay      Milliseconds to wait between sending messages (Default: {DEFAULT_DELAY_MS})\n\
         \x20 -f filename   Use local log file instead of sending to daemon\n\
         \x20 -n count      Number of messages to be generated (Default: {DEFAULT_COUNT})\n\
         \x20 -g            Switch to non-verbose mode (Default: verbose mode)\n\
         \x20 -a            Enable local printing of DLT messages (Default: disabled)\n",
        crate::backend::version_string()
    )
}
