//! Wire codec for the control interface.
//!
//! Two concerns live here: splitting a raw datagram into its priority tag and
//! payload, and the daemon's escaped string-literal encoding used for SSIDs
//! that contain non-printable bytes (`\\` and `\xHH`).

/// Priority assigned to messages that carry no `<P>` tag.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Highest priority digit the daemon emits.
pub const MAX_PRIORITY: u8 = 4;

/// Where a datagram belongs once its tag has been inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing<'a> {
    /// A reply to the outstanding command. Payload is untouched.
    Solicited(&'a [u8]),
    /// An asynchronous notification with its tag stripped.
    Unsolicited { priority: u8, payload: &'a [u8] },
}

impl Routing<'_> {
    /// Priority of the message (`DEFAULT_PRIORITY` for solicited replies).
    pub fn priority(&self) -> u8 {
        match self {
            Routing::Solicited(_) => DEFAULT_PRIORITY,
            Routing::Unsolicited { priority, .. } => *priority,
        }
    }
}

/// Classify a datagram by its `<P>` prefix.
///
/// Only `<0>` through `<4>` mark an unsolicited message; anything else,
/// including `<5>` or a bare `<`, is a solicited reply with its bytes intact.
pub fn route(datagram: &[u8]) -> Routing<'_> {
    match datagram {
        [b'<', digit @ b'0'..=b'4', b'>', payload @ ..] => Routing::Unsolicited {
            priority: digit - b'0',
            payload,
        },
        _ => Routing::Solicited(datagram),
    }
}

/// Decode the daemon's string-literal encoding back into raw bytes.
///
/// `\\` becomes a single backslash and `\xHH` becomes the byte `0xHH`. Every
/// other byte is copied as-is. A `\x` escape that is truncated or not followed
/// by two hex digits is copied verbatim.
pub fn decode_byte_literal(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut rest = input;

    loop {
        match rest {
            [] => break,
            [b'\\', b'\\', tail @ ..] => {
                out.push(b'\\');
                rest = tail;
            }
            [b'\\', b'x', hi, lo, tail @ ..] => match (hex_value(*hi), hex_value(*lo)) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    rest = tail;
                }
                _ => {
                    out.push(b'\\');
                    rest = &rest[1..];
                }
            },
            [byte, tail @ ..] => {
                out.push(*byte);
                rest = tail;
            }
        }
    }

    out
}

/// Encode raw bytes the way the daemon prints SSIDs.
///
/// Printable ASCII other than the backslash is kept; the backslash is doubled
/// and everything else becomes `\xHH`.
pub fn encode_byte_literal(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input {
        match byte {
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Strip one trailing newline from a reply, if present.
pub fn trim_reply(reply: &[u8]) -> &[u8] {
    reply.strip_suffix(b"\n").unwrap_or(reply)
}
