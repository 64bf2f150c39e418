//! Echo reply construction.
//!
//! The wire format has no framing: whatever bytes arrive on a connection
//! form one message, and the reply is a fixed-width local-time stamp,
//! a literal `": "`, then the message bytes verbatim.

use bytes::{BufMut, BytesMut};
use chrono::{Local, NaiveDateTime};

/// Width of the timestamp prefix, matching ctime(3) output
/// (`Wed Jun 30 21:49:08 1993`).
pub const TIMESTAMP_LEN: usize = 24;

/// Separator between the timestamp and the echoed message.
pub const SEPARATOR: &[u8] = b": ";

/// ctime-style layout: weekday, month, space-padded day, time, year.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Format `when` as a ctime-style stamp of exactly `TIMESTAMP_LEN` bytes.
pub fn format_timestamp(when: NaiveDateTime) -> String {
    let mut stamp = when.format(TIMESTAMP_FORMAT).to_string();
    stamp.truncate(TIMESTAMP_LEN);
    stamp
}

/// Build the reply for one received message: timestamp, `": "`, message.
///
/// The reply buffer is sized exactly, so message bytes are never truncated.
pub fn build_reply(message: &[u8]) -> BytesMut {
    build_reply_at(Local::now().naive_local(), message)
}

/// Build a reply with an explicit clock reading.
pub fn build_reply_at(when: NaiveDateTime, message: &[u8]) -> BytesMut {
    let stamp = format_timestamp(when);
    let mut reply = BytesMut::with_capacity(TIMESTAMP_LEN + SEPARATOR.len() + message.len());
    reply.put_slice(stamp.as_bytes());
    reply.put_slice(SEPARATOR);
    reply.put_slice(message);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = format_timestamp(at(1993, 6, 30, 21, 49, 8));
        assert_eq!(stamp, "Wed Jun 30 21:49:08 1993");
        assert_eq!(stamp.len(), TIMESTAMP_LEN);
    }

    #[test]
    fn test_timestamp_single_digit_day_is_space_padded() {
        let stamp = format_timestamp(at(2000, 1, 1, 0, 0, 0));
        assert_eq!(stamp, "Sat Jan  1 00:00:00 2000");
        assert_eq!(stamp.len(), TIMESTAMP_LEN);
    }

    #[test]
    fn test_reply_layout() {
        let reply = build_reply_at(at(1993, 6, 30, 21, 49, 8), b"ping");
        assert_eq!(&reply[..], b"Wed Jun 30 21:49:08 1993: ping");
        assert_eq!(&reply[TIMESTAMP_LEN..TIMESTAMP_LEN + 2], SEPARATOR);
    }

    #[test]
    fn test_reply_preserves_binary_payload() {
        let payload: Vec<u8> = (0..=255).collect();
        let reply = build_reply_at(at(2024, 3, 9, 12, 0, 0), &payload);
        assert_eq!(reply.len(), TIMESTAMP_LEN + SEPARATOR.len() + payload.len());
        assert_eq!(&reply[TIMESTAMP_LEN + SEPARATOR.len()..], &payload[..]);
    }

    #[test]
    fn test_reply_fits_full_message() {
        let payload = vec![b'x'; 1024];
        let reply = build_reply_at(at(2024, 3, 9, 12, 0, 0), &payload);
        assert_eq!(reply.len(), TIMESTAMP_LEN + SEPARATOR.len() + 1024);
        assert_eq!(&reply[TIMESTAMP_LEN + SEPARATOR.len()..], &payload[..]);
    }

    #[test]
    fn test_live_reply_timestamp_is_current_width() {
        let reply = build_reply(b"now");
        assert_eq!(reply.len(), TIMESTAMP_LEN + SEPARATOR.len() + 3);
        assert_eq!(&reply[TIMESTAMP_LEN..TIMESTAMP_LEN + 2], SEPARATOR);
    }
}
