//! Connection state machine and table.
//!
//! A connection lives through exactly one echo cycle: wait for a message,
//! write the timestamped reply, close. The table maps registry tokens to
//! connections with O(1) insert, lookup, and remove.

use bytes::BytesMut;
use mio::net::TcpStream;
use slab::Slab;
use std::net::SocketAddr;

/// Current state of a connection.
#[derive(Debug, Clone, Copy)]
pub enum ConnState {
    /// Waiting for the message to arrive.
    AwaitingRequest,
    /// Writing the reply.
    Responding {
        /// Bytes of the reply already written.
        written: usize,
    },
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    /// The non-blocking socket.
    pub stream: TcpStream,
    /// Peer address, kept for logging.
    pub peer: SocketAddr,
    /// Current state.
    pub state: ConnState,
    /// Receive buffer: one byte beyond the message cap, so an over-cap
    /// message is detected rather than silently truncated.
    pub recv_buf: Vec<u8>,
    /// Reply bytes, populated on the transition to `Responding`.
    pub reply: BytesMut,
}

impl Connection {
    /// Create a new connection in the initial state.
    pub fn new(stream: TcpStream, peer: SocketAddr, max_message_size: usize) -> Self {
        Self {
            stream,
            peer,
            state: ConnState::AwaitingRequest,
            recv_buf: vec![0u8; max_message_size + 1],
            reply: BytesMut::new(),
        }
    }

    /// Transition to writing the given reply.
    pub fn start_responding(&mut self, reply: BytesMut) {
        self.reply = reply;
        self.state = ConnState::Responding { written: 0 };
    }
}

/// Table of active connections using slab allocation.
///
/// Provides O(1) insert, lookup, and remove operations.
pub struct ConnectionTable {
    connections: Slab<Connection>,
    max_connections: usize,
}

impl ConnectionTable {
    /// Create a new table with specified maximum capacity.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Slab::with_capacity(max_connections),
            max_connections,
        }
    }

    /// Insert a new connection into the table.
    ///
    /// Returns `None` if the table is at capacity.
    pub fn insert(&mut self, conn: Connection) -> Option<usize> {
        if self.connections.len() >= self.max_connections {
            return None;
        }
        Some(self.connections.insert(conn))
    }

    /// Get a mutable reference to a connection.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Remove a connection from the table.
    pub fn remove(&mut self, id: usize) -> Option<Connection> {
        if self.connections.contains(id) {
            Some(self.connections.remove(id))
        } else {
            None
        }
    }

    /// Check if a connection exists.
    pub fn contains(&self, id: usize) -> bool {
        self.connections.contains(id)
    }

    /// Number of active connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Maximum number of connections allowed.
    pub fn capacity(&self) -> usize {
        self.max_connections
    }
}
