// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher record: describes one advertised endpoint.

use super::{Cursor, CursorMut, WireResult};
use tracing::{error, warn};

/// An advertised publisher endpoint, as carried in [`AdvertisePacket`]
/// payloads.
///
/// Every string field is packed with the same `u64 len + bytes` idiom the
/// header uses for the process UUID.
///
/// [`AdvertisePacket`]: super::AdvertisePacket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publisher {
    /// Fully-qualified topic name (`@/<partition>@<topic>`).
    pub topic: String,
    /// Data delivery address of the publisher.
    pub addr: String,
    /// Control channel address. May be empty for publishers without one.
    pub ctrl_addr: String,
    /// UUID of the publishing process.
    pub process_uuid: String,
    /// UUID of the publishing node within that process.
    pub node_uuid: String,
    /// Name of the message type flowing on the topic.
    pub type_name: String,
}

impl Publisher {
    pub fn new(
        topic: impl Into<String>,
        addr: impl Into<String>,
        process_uuid: impl Into<String>,
        node_uuid: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            addr: addr.into(),
            ctrl_addr: String::new(),
            process_uuid: process_uuid.into(),
            node_uuid: node_uuid.into(),
            type_name: type_name.into(),
        }
    }

    /// Packed size of this record in bytes.
    pub fn msg_length(&self) -> usize {
        [
            &self.topic,
            &self.addr,
            &self.ctrl_addr,
            &self.process_uuid,
            &self.node_uuid,
            &self.type_name,
        ]
        .iter()
        .map(|field| 8 + field.len())
        .sum()
    }

    /// The control address is the only field that may legitimately be empty.
    fn packable(&self) -> bool {
        !self.topic.is_empty()
            && !self.addr.is_empty()
            && !self.process_uuid.is_empty()
            && !self.node_uuid.is_empty()
            && !self.type_name.is_empty()
    }

    /// Serialize into `buffer`. Returns bytes written, `0` on failure.
    pub fn pack(&self, buffer: &mut [u8]) -> usize {
        if !self.packable() {
            error!(topic = %self.topic, "refusing to pack incomplete publisher record");
            return 0;
        }

        let mut cursor = CursorMut::new(buffer);
        let result = cursor
            .write_str(&self.topic)
            .and_then(|()| cursor.write_str(&self.addr))
            .and_then(|()| cursor.write_str(&self.ctrl_addr))
            .and_then(|()| cursor.write_str(&self.process_uuid))
            .and_then(|()| cursor.write_str(&self.node_uuid))
            .and_then(|()| cursor.write_str(&self.type_name));

        match result {
            Ok(()) => cursor.offset(),
            Err(err) => {
                error!(%err, "failed to pack publisher record");
                0
            }
        }
    }

    /// Deserialize from `buffer`. Returns the record and bytes consumed, or
    /// `None` on malformed input.
    pub fn unpack(buffer: &[u8]) -> Option<(Self, usize)> {
        let mut cursor = Cursor::new(buffer);

        let result: WireResult<Self> = (|| {
            Ok(Self {
                topic: cursor.read_str()?,
                addr: cursor.read_str()?,
                ctrl_addr: cursor.read_str()?,
                process_uuid: cursor.read_str()?,
                node_uuid: cursor.read_str()?,
                type_name: cursor.read_str()?,
            })
        })();

        match result {
            Ok(publisher) => Some((publisher, cursor.offset())),
            Err(err) => {
                warn!(%err, "failed to unpack publisher record");
                None
            }
        }
    }
}
