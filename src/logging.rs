//! Logging setup using `tracing` + `tracing-subscriber`
//!
//! Priority for determining the log level:
//! 1. the level passed by the caller
//! 2. the `DAGPIPE_LOG` environment variable (EnvFilter syntax, e.g. "dagpipe=debug")
//! 3. default to `info`

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when no level is given
pub const LOG_ENV: &str = "DAGPIPE_LOG";

/// Install the global fmt subscriber writing to stderr
///
/// Returns `Ok(false)` if a subscriber was already installed.
pub fn init_logging(level: Option<Level>) -> Result<bool> {
    let filter = resolve_filter(level, std::env::var(LOG_ENV).ok().as_deref())?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok();

    Ok(installed)
}

fn resolve_filter(level: Option<Level>, env: Option<&str>) -> Result<EnvFilter> {
    match (level, env) {
        (Some(level), _) => Ok(EnvFilter::default().add_directive(LevelFilter::from_level(level).into())),
        (None, Some(directives)) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", LOG_ENV, directives, e)),
        _ => Ok(EnvFilter::new("info")),
    }
}
