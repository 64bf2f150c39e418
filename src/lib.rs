//! echod: a timestamped TCP echo server.
//!
//! Accepts TCP connections, reads one message per connection, and replies
//! with the current time followed by the received bytes, then closes the
//! connection. Built on a single-threaded readiness-based event loop
//! (epoll on Linux, kqueue on macOS, via mio).

pub mod config;
pub mod protocol;
pub mod runtime;
