// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Common discovery packet header.

use super::{Cursor, CursorMut, WireResult};
use tracing::{error, warn};

/// Discovery control message types.
///
/// The numeric assignments are part of the wire contract; `Uninitialized = 0`
/// is the sentinel for a header that was never filled in and is rejected on
/// the pack path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Uninitialized = 0,
    Advertise = 1,
    Subscribe = 2,
    Unadvertise = 3,
    Heartbeat = 4,
    Bye = 5,
    NewConnection = 6,
    EndConnection = 7,
}

impl MsgType {
    /// Decode a wire byte. Unknown values are a decode failure, not a panic.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Advertise),
            2 => Some(Self::Subscribe),
            3 => Some(Self::Unadvertise),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::Bye),
            6 => Some(Self::NewConnection),
            7 => Some(Self::EndConnection),
            _ => None,
        }
    }
}

/// Common header prepended to every discovery packet.
///
/// Wire layout (host-native byte order):
///
/// ```text
/// version(2) | uuid_len(8) | process_uuid(uuid_len) | msg_type(1) | flags(2)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryHeader {
    /// Discovery protocol version. `0` means unset.
    pub version: u16,
    /// UUID of the originating process. Arbitrary length, never NUL-terminated.
    pub process_uuid: String,
    /// Control message type.
    pub msg_type: MsgType,
    /// Reserved bitfield, currently always `0` on the send path.
    pub flags: u16,
}

impl DiscoveryHeader {
    pub fn new(version: u16, process_uuid: impl Into<String>, msg_type: MsgType) -> Self {
        Self {
            version,
            process_uuid: process_uuid.into(),
            msg_type,
            flags: 0,
        }
    }

    /// Packed size of this header in bytes.
    pub fn header_length(&self) -> usize {
        2 + 8 + self.process_uuid.len() + 1 + 2
    }

    /// A header is packable iff every field has been set.
    fn packable(&self) -> bool {
        self.version != 0 && !self.process_uuid.is_empty() && self.msg_type != MsgType::Uninitialized
    }

    /// Serialize into `buffer`. Returns the number of bytes written, `0` on
    /// failure (incomplete header or undersized buffer).
    pub fn pack(&self, buffer: &mut [u8]) -> usize {
        if !self.packable() {
            error!(
                version = self.version,
                uuid_len = self.process_uuid.len(),
                msg_type = ?self.msg_type,
                "refusing to pack incomplete discovery header"
            );
            return 0;
        }

        let mut cursor = CursorMut::new(buffer);
        let result = cursor
            .write_u16_ne(self.version)
            .and_then(|()| cursor.write_str(&self.process_uuid))
            .and_then(|()| cursor.write_u8(self.msg_type as u8))
            .and_then(|()| cursor.write_u16_ne(self.flags));

        match result {
            Ok(()) => cursor.offset(),
            Err(err) => {
                error!(%err, "failed to pack discovery header");
                0
            }
        }
    }

    /// Deserialize from `buffer`. Returns the header and the number of bytes
    /// consumed, or `None` if the buffer is truncated or malformed.
    pub fn unpack(buffer: &[u8]) -> Option<(Self, usize)> {
        let mut cursor = Cursor::new(buffer);

        let result: WireResult<_> = (|| {
            let version = cursor.read_u16_ne()?;
            let process_uuid = cursor.read_str()?;
            let raw_type = cursor.read_u8()?;
            let flags = cursor.read_u16_ne()?;
            Ok((version, process_uuid, raw_type, flags))
        })();

        let (version, process_uuid, raw_type, flags) = match result {
            Ok(fields) => fields,
            Err(err) => {
                warn!(%err, "failed to unpack discovery header");
                return None;
            }
        };

        let Some(msg_type) = MsgType::from_u8(raw_type) else {
            warn!(raw_type, "unknown discovery message type");
            return None;
        };

        Some((
            Self {
                version,
                process_uuid,
                msg_type,
                flags,
            },
            cursor.offset(),
        ))
    }
}

impl Default for DiscoveryHeader {
    fn default() -> Self {
        Self {
            version: 0,
            process_uuid: String::new(),
            msg_type: MsgType::Uninitialized,
            flags: 0,
        }
    }
}
