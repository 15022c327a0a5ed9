// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed discovery packets built atop the common header.
//!
//! Unpacking is split in two: the receive loop first unpacks the header alone
//! so it can dispatch on `msg_type`, then hands the remaining bytes to the
//! matching packet's `unpack_body`.

use super::{Cursor, CursorMut, DiscoveryHeader, Publisher};
use tracing::{error, warn};

/// Subscription request for a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPacket {
    pub header: DiscoveryHeader,
    pub topic: String,
}

impl SubscriptionPacket {
    pub fn new(header: DiscoveryHeader, topic: impl Into<String>) -> Self {
        Self {
            header,
            topic: topic.into(),
        }
    }

    /// Packed size of the full packet (header + payload) in bytes.
    pub fn msg_length(&self) -> usize {
        self.header.header_length() + 8 + self.topic.len()
    }

    /// Serialize header and payload into `buffer`. Returns bytes written,
    /// `0` on failure.
    pub fn pack(&self, buffer: &mut [u8]) -> usize {
        let header_len = self.header.pack(buffer);
        if header_len == 0 {
            return 0;
        }

        if self.topic.is_empty() {
            error!("refusing to pack a subscription packet with an empty topic");
            return 0;
        }

        let mut cursor = CursorMut::new(&mut buffer[header_len..]);
        match cursor.write_str(&self.topic) {
            Ok(()) => header_len + cursor.offset(),
            Err(err) => {
                error!(%err, "failed to pack subscription payload");
                0
            }
        }
    }

    /// Deserialize the payload that follows an already-unpacked header.
    /// Returns the packet and payload bytes consumed, or `None` on malformed
    /// input.
    pub fn unpack_body(header: DiscoveryHeader, buffer: &[u8]) -> Option<(Self, usize)> {
        let mut cursor = Cursor::new(buffer);
        match cursor.read_str() {
            Ok(topic) => Some((Self { header, topic }, cursor.offset())),
            Err(err) => {
                warn!(%err, "failed to unpack subscription payload");
                None
            }
        }
    }
}

/// Advertisement of a publisher endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisePacket {
    pub header: DiscoveryHeader,
    pub publisher: Publisher,
}

impl AdvertisePacket {
    pub fn new(header: DiscoveryHeader, publisher: Publisher) -> Self {
        Self { header, publisher }
    }

    /// Packed size of the full packet (header + payload) in bytes.
    pub fn msg_length(&self) -> usize {
        self.header.header_length() + self.publisher.msg_length()
    }

    /// Serialize header and publisher record into `buffer`. Returns bytes
    /// written, `0` on failure.
    pub fn pack(&self, buffer: &mut [u8]) -> usize {
        let header_len = self.header.pack(buffer);
        if header_len == 0 {
            return 0;
        }

        let payload_len = self.publisher.pack(&mut buffer[header_len..]);
        if payload_len == 0 {
            return 0;
        }

        header_len + payload_len
    }

    /// Deserialize the payload that follows an already-unpacked header.
    pub fn unpack_body(header: DiscoveryHeader, buffer: &[u8]) -> Option<(Self, usize)> {
        let (publisher, consumed) = Publisher::unpack(buffer)?;
        Some((Self { header, publisher }, consumed))
    }
}
