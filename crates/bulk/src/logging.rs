//! Tracing setup for bulk transfer sessions
//!
//! Submission, completion and backend events are logged through `tracing`;
//! this installs the subscriber that prints them. Usually reached through
//! [`SessionConfig::init_logging`](crate::SessionConfig::init_logging).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a tracing subscriber filtered by `RUST_LOG` or `default_level`
///
/// Fails with [`Error::Config`](crate::Error::Config) if the filter does not
/// parse or a global subscriber is already installed.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Logging already initialised: {}", e)))?;

    Ok(())
}
