//! Single-threaded readiness-based runtime.
//!
//! The event loop blocks on an epoll-style registry (mio), accepts
//! connections from the listener, and drives each connection's state
//! machine to completion: one message in, one timestamped reply out,
//! then close.
//!
//! Shared pieces:
//! - `Registry`: readiness registration and blocking wait
//! - `Connection` / `ConnectionTable`: per-connection state machine
//! - `EventLoop`: the dispatcher owning all of the above

mod connection;
mod error;
mod event_loop;
mod registry;

pub use connection::{ConnState, Connection, ConnectionTable};
pub use error::ServerError;
pub use event_loop::EventLoop;
pub use registry::{ReadyEvent, Registry};

use crate::config::Config;
use std::net::SocketAddr;
use tracing::info;

/// Run the server until a fatal error occurs.
pub fn run(config: Config) -> Result<(), ServerError> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| ServerError::Addr(config.listen.clone(), e))?;

    let mut event_loop = EventLoop::bind(addr, &config)?;
    info!(addr = %event_loop.local_addr(), "Server listening");
    event_loop.run()
}
