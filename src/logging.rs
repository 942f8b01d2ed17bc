//! Diagnostic logging for the CLI.
//!
//! Events go to stderr so report output on stdout stays machine readable.
//! `QUALCHECK_LOG` takes an `EnvFilter` directive and overrides `--log-level`.

use std::fmt;
use std::io::IsTerminal;
use std::sync::OnceLock;

use clap::ValueEnum;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "QUALCHECK_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(level: LogLevel, format: LogFormat) {
    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
        let builder = subscriber_fmt()
            .with_env_filter(filter(level))
            .with_writer(std::io::stderr)
            .with_target(true);

        // A subscriber installed by an embedding program wins.
        let _ = match format {
            LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
            LogFormat::Compact => tracing::subscriber::set_global_default(
                builder.with_ansi(use_ansi).compact().finish(),
            ),
        };
    });
}
