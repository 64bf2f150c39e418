//! Fatal server errors.
//!
//! Setup failures (socket, bind, listen, registry) and wait failures stop
//! the server; per-connection faults stay `io::Error`s confined to the
//! event that produced them.

use std::io;
use std::net::{AddrParseError, SocketAddr};

/// Errors that stop the server.
#[derive(Debug)]
pub enum ServerError {
    /// The configured listen address did not parse.
    Addr(String, AddrParseError),
    /// Listener socket creation failed.
    Socket(io::Error),
    /// Binding the listen address failed.
    Bind(SocketAddr, io::Error),
    /// Putting the socket into listening state failed.
    Listen(io::Error),
    /// The OS refused to create the readiness registry.
    Registry(io::Error),
    /// Registering the listener with the registry failed.
    Register(io::Error),
    /// Waiting for readiness failed.
    Wait(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Addr(addr, e) => write!(f, "Invalid listen address '{addr}': {e}"),
            ServerError::Socket(e) => write!(f, "Failed to create listener socket: {e}"),
            ServerError::Bind(addr, e) => write!(f, "Failed to bind {addr}: {e}"),
            ServerError::Listen(e) => write!(f, "Failed to listen: {e}"),
            ServerError::Registry(e) => write!(f, "Failed to create readiness registry: {e}"),
            ServerError::Register(e) => write!(f, "Failed to register listener: {e}"),
            ServerError::Wait(e) => write!(f, "Failed to wait for readiness: {e}"),
        }
    }
}

impl std::error::Error for ServerError {}
