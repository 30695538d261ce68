// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Client slot: one pool entry and the connection it currently holds.
//
// Slots are created once with the server and reused for every client that
// lands in them. The receive buffer is not stored here; the server hands each
// slot its fixed region of the shared arena on every poll.

use std::net::SocketAddr;

use crate::error::Result;
use crate::handler::OpcHandler;
use crate::reassembler::FrameAssembly;
use crate::transport::StreamConnection;

/// Last known lifecycle state of a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Disconnected,
    Connected,
}

/// Read-only snapshot of a slot, handed to handlers and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// Position in the pool.
    pub index: usize,
    pub state: SlotState,
    /// Address of the current (or most recent) client.
    pub remote_addr: Option<SocketAddr>,
    /// Bytes buffered toward the frame in progress.
    pub buffer_length: usize,
    /// Bytes reported readable and not yet consumed.
    pub bytes_available: usize,
}

/// One entry of the client pool.
#[derive(Debug)]
pub struct ClientSlot<C> {
    index: usize,
    connection: Option<C>,
    state: SlotState,
    remote_addr: Option<SocketAddr>,
    assembly: FrameAssembly,
}

impl<C: StreamConnection> ClientSlot<C> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            connection: None,
            state: SlotState::Disconnected,
            remote_addr: None,
            assembly: FrameAssembly::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn assembly(&self) -> &FrameAssembly {
        &self.assembly
    }

    /// Whether a connection is installed (alive or not).
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn info(&self) -> SlotInfo {
        SlotInfo {
            index: self.index,
            state: self.state,
            remote_addr: self.remote_addr,
            buffer_length: self.assembly.buffer_length(),
            bytes_available: self.assembly.bytes_available(),
        }
    }

    /// Whether the installed connection is still alive.
    pub(crate) fn is_alive(&mut self) -> bool {
        self.connection.as_mut().is_some_and(|conn| conn.is_alive())
    }

    pub(crate) fn mark_connected(&mut self) {
        self.state = SlotState::Connected;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.state = SlotState::Disconnected;
    }

    /// Close and drop the connection, clearing all reassembly state.
    /// The remote address is kept for reporting.
    pub(crate) fn release(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        self.assembly.reset();
    }

    /// Put a new connection into this slot.
    pub(crate) fn install(&mut self, conn: C) {
        self.release();
        self.remote_addr = conn.remote_addr();
        self.connection = Some(conn);
        self.state = SlotState::Connected;
    }

    /// Read whatever the connection has and dispatch completed frames.
    pub(crate) fn service<H>(&mut self, buf: &mut [u8], handler: &mut H) -> Result<usize>
    where
        H: OpcHandler + ?Sized,
    {
        let Some(conn) = self.connection.as_mut() else {
            return Ok(0);
        };
        let available = conn.available_bytes();
        if available == 0 {
            self.assembly.clear_available();
            return Ok(0);
        }
        self.assembly
            .read_frames(available, buf, conn, |frame| handler.on_frame(frame))
    }
}
