//! End-to-end tests driving a real event loop with std TCP clients.
//!
//! Each test boots the server on an OS-assigned loopback port in a
//! background thread, then talks to it over plain `std::net` sockets.

use echod::config::Config;
use echod::protocol::{SEPARATOR, TIMESTAMP_LEN};
use echod::runtime::EventLoop;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

fn start_server() -> SocketAddr {
    start_server_with(Config::default())
}

fn start_server_with(config: Config) -> SocketAddr {
    let mut event_loop =
        EventLoop::bind("127.0.0.1:0".parse().unwrap(), &config).expect("Failed to bind");
    let addr = event_loop.local_addr();

    // The loop runs until the process ends; the thread is detached.
    thread::spawn(move || {
        let _ = event_loop.run();
    });

    addr
}

fn connect(addr: SocketAddr) -> TcpStream {
    let client = TcpStream::connect(addr).expect("Failed to connect");
    client.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
    client
}

/// Read a full reply for a payload of the given length.
fn read_reply(client: &mut TcpStream, payload_len: usize) -> Vec<u8> {
    let mut reply = vec![0u8; TIMESTAMP_LEN + SEPARATOR.len() + payload_len];
    client.read_exact(&mut reply).expect("Failed to read reply");
    reply
}

fn assert_echo(reply: &[u8], payload: &[u8]) {
    assert_eq!(reply.len(), TIMESTAMP_LEN + SEPARATOR.len() + payload.len());

    let stamp = std::str::from_utf8(&reply[..TIMESTAMP_LEN]).expect("Timestamp is not UTF-8");
    assert!(
        chrono::NaiveDateTime::parse_from_str(stamp, "%a %b %e %H:%M:%S %Y").is_ok(),
        "Unparseable timestamp: {stamp:?}"
    );

    assert_eq!(&reply[TIMESTAMP_LEN..TIMESTAMP_LEN + SEPARATOR.len()], SEPARATOR);
    assert_eq!(&reply[TIMESTAMP_LEN + SEPARATOR.len()..], payload);
}

#[test]
fn test_echo_round_trip() {
    let addr = start_server();
    let mut client = connect(addr);

    client.write_all(b"ping").expect("Failed to write");
    let reply = read_reply(&mut client, 4);
    assert_echo(&reply, b"ping");

    // The server closes after one echo; the connection is unusable for
    // further requests.
    let mut buf = [0u8; 16];
    let n = client.read(&mut buf).expect("Failed to read EOF");
    assert_eq!(n, 0, "Expected EOF after the reply");
}

#[test]
fn test_boundary_payload_at_full_capacity() {
    let addr = start_server();
    let mut client = connect(addr);

    let payload: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
    client.write_all(&payload).expect("Failed to write");

    let reply = read_reply(&mut client, payload.len());
    assert_echo(&reply, &payload);
}

#[test]
fn test_concurrent_clients_get_their_own_echo() {
    let addr = start_server();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let mut client = connect(addr);
                let payload = format!("client-{i}-payload");
                client.write_all(payload.as_bytes()).expect("Failed to write");
                let reply = read_reply(&mut client, payload.len());
                assert_echo(&reply, payload.as_bytes());
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Client thread panicked");
    }
}

#[test]
fn test_peer_close_before_send_leaves_server_healthy() {
    let addr = start_server();

    let client = connect(addr);
    drop(client);

    // The server must shrug that off and keep serving.
    let mut client = connect(addr);
    client.write_all(b"still alive").expect("Failed to write");
    let reply = read_reply(&mut client, 11);
    assert_echo(&reply, b"still alive");
}

#[test]
fn test_zero_bytes_then_close() {
    let addr = start_server();

    let mut client = connect(addr);
    client.shutdown(Shutdown::Write).expect("Failed to shutdown");

    // No data was sent, so no reply: just EOF (or a reset).
    let mut buf = [0u8; 16];
    match client.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("Unexpected {n}-byte reply to an empty message"),
        Err(_) => {}
    }

    // Other connections are unaffected.
    let mut client = connect(addr);
    client.write_all(b"after").expect("Failed to write");
    let reply = read_reply(&mut client, 5);
    assert_echo(&reply, b"after");
}

#[test]
fn test_repeated_payload_differs_only_in_timestamp() {
    let addr = start_server();
    let payload = b"deja vu";

    let mut first = connect(addr);
    first.write_all(payload).expect("Failed to write");
    let first_reply = read_reply(&mut first, payload.len());

    thread::sleep(Duration::from_millis(50));

    let mut second = connect(addr);
    second.write_all(payload).expect("Failed to write");
    let second_reply = read_reply(&mut second, payload.len());

    assert_echo(&first_reply, payload);
    assert_echo(&second_reply, payload);
    assert_eq!(
        &first_reply[TIMESTAMP_LEN..],
        &second_reply[TIMESTAMP_LEN..],
        "Echoed suffix must be byte-identical"
    );
}

#[test]
fn test_oversized_payload_closes_without_reply() {
    let addr = start_server();
    let mut client = connect(addr);

    let payload = vec![b'x'; 4096];
    client.write_all(&payload).expect("Failed to write");

    let mut buf = [0u8; 64];
    match client.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("Unexpected {n}-byte reply to an oversized message"),
        // A reset is acceptable: the server closed with unread input.
        Err(_) => {}
    }
}

#[test]
fn test_custom_message_cap() {
    let config = Config {
        max_message_size: 16,
        ..Config::default()
    };
    let addr = start_server_with(config);

    let mut client = connect(addr);
    client.write_all(b"0123456789abcdef").expect("Failed to write");
    let reply = read_reply(&mut client, 16);
    assert_echo(&reply, b"0123456789abcdef");
}
