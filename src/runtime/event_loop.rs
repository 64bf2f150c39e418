//! Readiness event loop.
//!
//! Single-threaded dispatcher: blocks on the registry, accepts from the
//! listener, and advances connection state machines. Accept and
//! per-connection failures are confined to the event that produced them;
//! only setup and wait failures stop the server.

use crate::config::Config;
use crate::protocol;
use crate::runtime::{ConnState, Connection, ConnectionTable, ReadyEvent, Registry, ServerError};
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Token};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// The server: listener, registry, and connection table in one owned
/// structure.
pub struct EventLoop {
    registry: Registry,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: ConnectionTable,
    ready: Vec<ReadyEvent>,
    max_message_size: usize,
}

impl EventLoop {
    /// Bind the listener and set up the registry.
    pub fn bind(addr: SocketAddr, config: &Config) -> Result<Self, ServerError> {
        let listener = create_listener(addr, config.backlog)?;
        let local_addr = listener.local_addr().map_err(ServerError::Socket)?;
        let mut listener = TcpListener::from_std(listener);

        let registry = Registry::new(config.max_events).map_err(ServerError::Registry)?;
        registry
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(ServerError::Register)?;

        Ok(Self {
            registry,
            listener,
            local_addr,
            connections: ConnectionTable::new(config.max_connections),
            ready: Vec::with_capacity(config.max_events),
            max_message_size: config.max_message_size,
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Process readiness batches until a fatal error.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.turn()?;
        }
    }

    /// One wait-and-dispatch cycle.
    fn turn(&mut self) -> Result<(), ServerError> {
        let mut ready = std::mem::take(&mut self.ready);
        match self.registry.wait(&mut ready) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                self.ready = ready;
                return Ok(());
            }
            Err(e) => return Err(ServerError::Wait(e)),
        }

        for event in &ready {
            if event.token == LISTENER_TOKEN {
                self.accept_connections();
            } else {
                self.handle_connection_event(event);
            }
        }

        self.ready = ready;
        Ok(())
    }

    /// Drain the accept backlog.
    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Event-level failure: the listener stays registered
                    // and the loop keeps serving.
                    error!(error = %e, "Accept error");
                    break;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        let conn = Connection::new(stream, peer, self.max_message_size);
        let conn_id = match self.connections.insert(conn) {
            Some(id) => id,
            None => {
                warn!(peer = %peer, "Connection limit reached, rejecting connection");
                return;
            }
        };

        let registered = match self.connections.get_mut(conn_id) {
            Some(conn) => {
                self.registry
                    .register(&mut conn.stream, Token(conn_id), Interest::READABLE)
            }
            None => return,
        };
        if let Err(e) = registered {
            warn!(peer = %peer, error = %e, "Failed to register connection, dropping");
            self.connections.remove(conn_id);
            return;
        }

        info!(conn_id, peer = %peer, "Accepted connection");
    }

    fn handle_connection_event(&mut self, event: &ReadyEvent) {
        let conn_id = event.token.0;
        if !self.connections.contains(conn_id) {
            // Closed earlier in this batch.
            return;
        }

        if event.readable {
            if let Err(e) = self.handle_readable(conn_id) {
                debug!(conn_id, error = %e, "Connection error");
                self.close_connection(conn_id);
                return;
            }
        }

        // Re-check: the readable path may have closed the connection.
        if !self.connections.contains(conn_id) {
            return;
        }

        if event.writable {
            if let Err(e) = self.handle_writable(conn_id) {
                debug!(conn_id, error = %e, "Connection error");
                self.close_connection(conn_id);
            }
        }
    }

    /// Drain the socket and, if a message arrived, start the reply.
    fn handle_readable(&mut self, conn_id: usize) -> io::Result<()> {
        let conn = match self.connections.get_mut(conn_id) {
            Some(conn) => conn,
            None => return Ok(()),
        };

        if !matches!(conn.state, ConnState::AwaitingRequest) {
            // One message per connection; residual data is ignored.
            return Ok(());
        }

        let mut filled = 0;
        let mut peer_closed = false;
        loop {
            if filled > self.max_message_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("message exceeds {} bytes", self.max_message_size),
                ));
            }
            match conn.stream.read(&mut conn.recv_buf[filled..]) {
                Ok(0) => {
                    peer_closed = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            if peer_closed {
                debug!(conn_id, "Peer closed without sending");
                self.close_connection(conn_id);
            }
            // Spurious wakeup otherwise; keep waiting for the message.
            return Ok(());
        }

        debug!(
            conn_id,
            bytes = filled,
            payload = %String::from_utf8_lossy(&conn.recv_buf[..filled]),
            "Received message"
        );

        let reply = protocol::build_reply(&conn.recv_buf[..filled]);
        conn.start_responding(reply);
        self.registry
            .reregister(&mut conn.stream, Token(conn_id), Interest::WRITABLE)?;

        Ok(())
    }

    /// Write the reply until complete or `WouldBlock`; close on completion.
    fn handle_writable(&mut self, conn_id: usize) -> io::Result<()> {
        let conn = match self.connections.get_mut(conn_id) {
            Some(conn) => conn,
            None => return Ok(()),
        };

        let mut written = match conn.state {
            ConnState::Responding { written } => written,
            // Writable before the message arrived; nothing to send yet.
            ConnState::AwaitingRequest => return Ok(()),
        };

        while written < conn.reply.len() {
            match conn.stream.write(&conn.reply[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    conn.state = ConnState::Responding { written };
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        debug!(conn_id, bytes = written, "Reply sent");
        self.close_connection(conn_id);
        Ok(())
    }

    fn close_connection(&mut self, conn_id: usize) {
        if let Some(mut conn) = self.connections.remove(conn_id) {
            let _ = self.registry.deregister(&mut conn.stream);
            debug!(conn_id, peer = %conn.peer, "Connection closed");
        }
    }
}

/// Create the listening socket: address-reuse, non-blocking, bound,
/// listening with the configured backlog.
fn create_listener(addr: SocketAddr, backlog: u32) -> Result<std::net::TcpListener, ServerError> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )
    .map_err(ServerError::Socket)?;

    // SO_REUSEADDR failure is non-fatal.
    if let Err(e) = socket.set_reuse_address(true) {
        warn!(error = %e, "Failed to set SO_REUSEADDR");
    }
    socket.set_nonblocking(true).map_err(ServerError::Socket)?;
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Bind(addr, e))?;
    socket.listen(backlog as i32).map_err(ServerError::Listen)?;

    Ok(socket.into())
}
