//! echod: a timestamped TCP echo server.
//!
//! Reads one message per TCP connection, prefixes it with the current
//! time, sends the reply, and closes the connection.
//!
//! Features:
//! - Single-threaded readiness-based event loop (epoll/kqueue via mio)
//! - Per-connection state machine with deterministic close
//! - Configuration via CLI arguments or TOML file

use echod::config::Config;
use echod::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        max_connections = config.max_connections,
        max_message_size = config.max_message_size,
        "Starting echod server"
    );

    runtime::run(config)?;
    Ok(())
}
