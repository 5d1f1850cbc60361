//! Control-interface connection over an `AF_UNIX` datagram socket.
//!
//! One socket carries two kinds of traffic: replies to the commands we send
//! (solicited) and `<P>`-tagged notifications the daemon pushes at any time
//! (unsolicited). Two background tasks keep them apart.
//!
//! ## Architecture
//!
//! ```text
//!  caller ──execute()──▶ Connection ──send──▶ ┌─────────────┐
//!    ▲                     │   ▲               │   daemon    │
//!    │                     │   │ solicited     └──────┬──────┘
//!    │                     │   │ queue                │ datagrams
//!    │                     │ ┌─┴──────────────┐       │
//!    │                     │ │   Receiver     │◀──────┘
//!    │                     │ │ (peek + route) │
//!    │                     │ └─┬──────────────┘
//!    │                     │   │ unsolicited queue
//!    │                     │ ┌─▼──────────────┐
//!    └──── EventStream ◀───┴─│  EventDecoder  │
//!                            └────────────────┘
//! ```
//!
//! Commands are serialized: the executor holds the solicited queue for the
//! whole write-then-wait exchange, so a reply can only ever reach the command
//! that is waiting for it. All tasks share one cancellation token.

mod commands;
mod connection;
mod events;
mod receiver;

pub use connection::Connection;
pub use events::{EventStream, decode_event};

/// A datagram (or read failure) handed from the receiver to a consumer.
#[derive(Debug)]
pub(crate) enum Message {
    Datagram { priority: u8, data: Vec<u8> },
    Error(std::io::Error),
}
