//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays reserved for the staging path, the
//! prompt and the JSON report. `PRIVEDIT_LOG` takes an `EnvFilter`
//! directive and overrides the `-v`/`-q` flags.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PRIVEDIT_LOG";

/// Filter directive for a verbosity level (`-q` negative, `-v` positive).
pub fn level_for(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-2 => "off",
        -1 => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbosity: i8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        tracing::debug!("tracing already initialised, skipping: {err}");
    }
}
