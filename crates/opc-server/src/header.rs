// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC frame header.
//!
//! ```text
//! +---------+---------+----------+----------+----------------------+
//! | channel | command | len high | len low  | payload (len bytes)  |
//! +---------+---------+----------+----------+----------------------+
//!    1B        1B        1B         1B
//! ```

use crate::error::{OpcError, Result};

/// Header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload a header can declare.
pub const MAX_DATA_LEN: usize = u16::MAX as usize;

/// Decoded 4-byte frame header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    pub channel: u8,
    pub command: u8,
    pub len_high: u8,
    pub len_low: u8,
}

impl FrameHeader {
    /// Build a header declaring `data_len` payload bytes.
    pub const fn new(channel: u8, command: u8, data_len: u16) -> Self {
        Self {
            channel,
            command,
            len_high: (data_len >> 8) as u8,
            len_low: (data_len & 0xFF) as u8,
        }
    }

    /// Decode a complete header.
    pub const fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            channel: bytes[0],
            command: bytes[1],
            len_high: bytes[2],
            len_low: bytes[3],
        }
    }

    /// Decode from the first four bytes of `bytes`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are given.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [channel, command, len_high, len_low, ..] => Some(Self {
                channel,
                command,
                len_high,
                len_low,
            }),
            _ => None,
        }
    }

    /// Wire representation.
    pub const fn encode(&self) -> [u8; HEADER_SIZE] {
        [self.channel, self.command, self.len_high, self.len_low]
    }

    /// Declared payload length (big-endian).
    pub const fn data_len(&self) -> u16 {
        u16::from_be_bytes([self.len_high, self.len_low])
    }

    /// Header plus declared payload, in bytes.
    pub const fn frame_len(&self) -> usize {
        HEADER_SIZE + self.data_len() as usize
    }
}

/// Serialize a complete frame (header + payload).
pub fn encode_frame(channel: u8, command: u8, data: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(data.len()).map_err(|_| OpcError::PayloadTooLong(data.len()))?;
    let mut out = Vec::with_capacity(HEADER_SIZE + data.len());
    out.extend_from_slice(&FrameHeader::new(channel, command, len).encode());
    out.extend_from_slice(data);
    Ok(out)
}
