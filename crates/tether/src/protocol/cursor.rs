// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked read/write cursors for discovery packet buffers.
//!
//! The discovery wire is host-native byte order, so all accessors use
//! `to_ne_bytes`/`from_ne_bytes`.

use super::{WireError, WireResult};

macro_rules! impl_write_ne {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> WireResult<()> {
            if self.offset + $size > self.buffer.len() {
                return Err(WireError::BufferTooSmall {
                    offset: self.offset,
                    needed: $size,
                });
            }
            let bytes = value.to_ne_bytes();
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

macro_rules! impl_read_ne {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> WireResult<$type> {
            if self.offset + $size > self.buffer.len() {
                return Err(WireError::UnexpectedEnd {
                    offset: self.offset,
                    needed: $size,
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_ne_bytes(bytes))
        }
    };
}

/// Mutable cursor for packing (bounds-checked, zero-copy).
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write_ne!(write_u8, u8, 1);
    impl_write_ne!(write_u16_ne, u16, 2);
    impl_write_ne!(write_u64_ne, u64, 8);

    pub fn write_bytes(&mut self, data: &[u8]) -> WireResult<()> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(WireError::BufferTooSmall {
                offset: self.offset,
                needed: data.len(),
            });
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Pack a string as `u64` length followed by raw UTF-8 bytes.
    pub fn write_str(&mut self, value: &str) -> WireResult<()> {
        self.write_u64_ne(value.len() as u64)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Immutable cursor for unpacking (bounds-checked, zero-copy).
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_ne!(read_u8, u8, 1);
    impl_read_ne!(read_u16_ne, u16, 2);
    impl_read_ne!(read_u64_ne, u64, 8);

    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if self.offset.checked_add(len).map_or(true, |end| end > self.buffer.len()) {
            return Err(WireError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Unpack a `u64` length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> WireResult<String> {
        let len = self.read_u64_ne()?;
        let len = usize::try_from(len).map_err(|_| WireError::UnexpectedEnd {
            offset: self.offset,
            needed: usize::MAX,
        })?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 {
            offset: self.offset - len,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}
