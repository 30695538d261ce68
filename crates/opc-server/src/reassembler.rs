// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-client frame reassembly.
//!
//! A TCP read boundary says nothing about frame boundaries: one read may end
//! in the middle of a header, in the middle of a payload, or carry several
//! frames back to back. [`FrameAssembly`] keeps the partial frame between
//! polls and dispatches every frame the moment its last byte arrives.
//!
//! ## State
//!
//! ```text
//! buffer: [ h0 h1 h2 h3 | p0 p1 ... p(n-1) ]
//!           ^--------------------^ buffer_length
//!
//! header == None      => buffer_length < 4, header bytes still arriving
//! header == Some(h)   => 4 <= buffer_length <= h.frame_len()
//! ```
//!
//! The header is only decoded once all four bytes are buffered, however many
//! reads that takes.

use crate::error::{OpcError, Result};
use crate::handler::Frame;
use crate::header::{FrameHeader, HEADER_SIZE};
use crate::transport::StreamConnection;

/// Reassembly state for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameAssembly {
    /// Bytes buffered toward the current frame (header + payload so far).
    buffer_length: usize,
    /// Bytes reported readable and not yet consumed in this poll.
    bytes_available: usize,
    /// Decoded header of the frame in progress.
    header: Option<FrameHeader>,
}

impl FrameAssembly {
    pub const fn new() -> Self {
        Self {
            buffer_length: 0,
            bytes_available: 0,
            header: None,
        }
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    pub fn bytes_available(&self) -> usize {
        self.bytes_available
    }

    /// Header of the frame in progress, once all four bytes are in.
    pub fn header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    /// No partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.buffer_length == 0 && self.header.is_none()
    }

    /// Drop any partial frame and pending count.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn clear_available(&mut self) {
        self.bytes_available = 0;
    }

    fn finish_frame(&mut self) {
        self.buffer_length = 0;
        self.header = None;
    }

    /// Consume `available` bytes from `conn` into `buf`, calling `on_frame`
    /// for every frame completed along the way.
    ///
    /// `buf` must be at least [`HEADER_SIZE`] bytes and is the same buffer on
    /// every call for this client. Returns the number of frames dispatched.
    ///
    /// # Errors
    ///
    /// [`OpcError::FrameTooLarge`] if a header declares more than `buf` can
    /// hold. The partial frame is dropped before returning; the stream is out
    /// of sync from that point and the caller should close the connection.
    pub fn read_frames<C, F>(
        &mut self,
        available: usize,
        buf: &mut [u8],
        conn: &mut C,
        mut on_frame: F,
    ) -> Result<usize>
    where
        C: StreamConnection + ?Sized,
        F: FnMut(&Frame<'_>),
    {
        self.bytes_available = available;
        let mut frames = 0;

        while self.bytes_available > 0 {
            let header = match self.header {
                Some(header) => header,
                None => {
                    let start = self.buffer_length;
                    if !self.fill(&mut buf[start..HEADER_SIZE], conn) {
                        break;
                    }
                    if self.buffer_length < HEADER_SIZE {
                        // Partial header, wait for the rest
                        continue;
                    }

                    let header = FrameHeader::from_bytes([buf[0], buf[1], buf[2], buf[3]]);
                    log::trace!(
                        "New frame: channel={} command={} len={} ({} bytes pending)",
                        header.channel,
                        header.command,
                        header.data_len(),
                        self.bytes_available
                    );
                    if header.frame_len() > buf.len() {
                        self.reset();
                        return Err(OpcError::FrameTooLarge {
                            declared: header.frame_len(),
                            capacity: buf.len(),
                        });
                    }
                    self.header = Some(header);
                    header
                }
            };

            let frame_len = header.frame_len();
            let start = self.buffer_length;
            if start < frame_len {
                // Header ended the chunk, payload comes in a later poll
                if self.bytes_available == 0 {
                    break;
                }
                if !self.fill(&mut buf[start..frame_len], conn) {
                    break;
                }
            }

            if self.buffer_length == frame_len {
                on_frame(&Frame::new(header, &buf[HEADER_SIZE..frame_len]));
                frames += 1;
                self.finish_frame();
            }
        }

        Ok(frames)
    }

    /// Read `min(dst.len(), bytes_available)` bytes into `dst`.
    ///
    /// Returns false if the stream yielded nothing; the stale pending count
    /// is dropped so the caller's loop ends.
    fn fill<C>(&mut self, dst: &mut [u8], conn: &mut C) -> bool
    where
        C: StreamConnection + ?Sized,
    {
        let want = dst.len().min(self.bytes_available);
        let n = conn.read(&mut dst[..want]).min(want);
        if n == 0 {
            log::debug!(
                "Stream yielded no data with {} bytes reported",
                self.bytes_available
            );
            self.bytes_available = 0;
            return false;
        }
        self.buffer_length += n;
        self.bytes_available -= n;
        true
    }
}
