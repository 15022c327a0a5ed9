// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery wire protocol: compact binary framing for control packets.
//!
//! Every discovery datagram starts with a common header carrying the sender's
//! process identity, a message type, and flags. Typed payloads (subscription,
//! advertisement) follow the header.
//!
//! ```text
//! offset  size  field
//!   0      2    version              (u16)
//!   2      8    uuid_len = L         (u64)
//!  10      L    process_uuid bytes
//! 10+L     1    msg_type             (u8)
//! 11+L     2    flags                (u16)
//! ```
//!
//! Byte order is host-native on the emitter and matched by the receiver. The
//! layout is frozen for interoperability with existing peers; do not reorder
//! or re-endian fields without bumping [`PROTOCOL_VERSION`].
//!
//! # Failure contract
//!
//! `pack` returns the number of bytes written, with `0` meaning failure
//! (incomplete message or undersized buffer). `unpack` returns `None` on any
//! malformed input. Both log a diagnostic and never panic; callers discard
//! the packet.

mod cursor;
mod header;
mod packet;
mod publisher;

pub use header::{DiscoveryHeader, MsgType};
pub use packet::{AdvertisePacket, SubscriptionPacket};
pub use publisher::Publisher;

pub(crate) use cursor::{Cursor, CursorMut};

use thiserror::Error;

/// Discovery protocol version stamped into every header.
pub const PROTOCOL_VERSION: u16 = 10;

/// Internal codec error. Surfaces to callers only as a logged diagnostic plus
/// the `0`/`None` failure value.
#[derive(Debug, Error)]
pub(crate) enum WireError {
    #[error("buffer too small at offset {offset} (need {needed} more bytes)")]
    BufferTooSmall { offset: usize, needed: usize },

    #[error("unexpected end of buffer at offset {offset} (need {needed} more bytes)")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("invalid UTF-8 in string field at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

pub(crate) type WireResult<T> = Result<T, WireError>;
