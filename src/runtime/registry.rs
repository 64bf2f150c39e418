//! Readiness registry: a thin wrapper over the OS notification facility.
//!
//! Wraps `mio::Poll` (epoll on Linux, kqueue on macOS). mio's backends
//! deliver edge-triggered readiness, so every consumer must drain fully
//! on each event: the listener accepts until `WouldBlock`, connections
//! read and write until `WouldBlock`.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use std::io;

/// One entry from a readiness batch.
#[derive(Debug, Clone, Copy)]
pub struct ReadyEvent {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
}

/// Process-wide readiness registry.
///
/// Owns the poll instance and its event buffer. `wait` hands batches out
/// as plain `ReadyEvent` values so the caller can mutate the registry
/// while dispatching.
pub struct Registry {
    poll: Poll,
    events: Events,
}

impl Registry {
    /// Create a registry returning up to `max_events` entries per wait.
    pub fn new(max_events: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(max_events),
        })
    }

    /// Register a source for the given interest.
    pub fn register<S: Source>(
        &self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().register(source, token, interest)
    }

    /// Change the interest of an already registered source.
    pub fn reregister<S: Source>(
        &self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().reregister(source, token, interest)
    }

    /// Remove a source from the registry.
    pub fn deregister<S: Source>(&self, source: &mut S) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Block until at least one registered source is ready, filling
    /// `ready` with the batch. Ordering within a batch is whatever the
    /// OS returned.
    pub fn wait(&mut self, ready: &mut Vec<ReadyEvent>) -> io::Result<()> {
        self.poll.poll(&mut self.events, None)?;
        ready.clear();
        ready.extend(self.events.iter().map(|event| ReadyEvent {
            token: event.token(),
            readable: event.is_readable(),
            writable: event.is_writable(),
        }));
        Ok(())
    }
}
