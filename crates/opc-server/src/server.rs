// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Connection manager: fixed client pool, admission and eviction.
//
// One `process()` call:
//   1. services every slot (reads + dispatches frames, notices dead clients)
//   2. admits at most one new connection into the first free slot
//
// All receive buffers live in one arena allocated up front; slot i always
// owns bytes [i * buffer_size, (i + 1) * buffer_size).

use std::ops::AddAssign;

use crate::config::OpcServerConfig;
use crate::error::{OpcError, Result};
use crate::handler::OpcHandler;
use crate::header::HEADER_SIZE;
use crate::slot::{ClientSlot, SlotInfo, SlotState};
use crate::transport::{StreamConnection, StreamListener};
use crate::BYTES_PER_PIXEL;

/// What happened during one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Frames handed to the handler.
    pub frames: usize,
    /// Connections installed into a slot.
    pub admitted: usize,
    /// Connections closed because the pool was full.
    pub refused: usize,
    /// Slots that lost their client.
    pub evicted: usize,
    /// Datagrams dropped for having the wrong size.
    pub discarded: usize,
    /// Clients dropped for protocol violations.
    pub errors: usize,
}

impl PollStats {
    /// Nothing happened.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for PollStats {
    fn add_assign(&mut self, rhs: Self) {
        self.frames += rhs.frames;
        self.admitted += rhs.admitted;
        self.refused += rhs.refused;
        self.evicted += rhs.evicted;
        self.discarded += rhs.discarded;
        self.errors += rhs.errors;
    }
}

/// Poll-driven OPC receiver, stream or datagram.
pub trait OpcService {
    /// Start the underlying listener.
    fn begin(&mut self) -> Result<()>;

    /// Run exactly one non-blocking poll cycle.
    fn process(&mut self) -> PollStats;

    /// Configured buffer size (header + largest payload).
    fn buffer_size(&self) -> usize;

    /// Clients currently holding a slot (0 for datagram servers).
    fn client_count(&self) -> usize {
        0
    }

    /// Buffer size expressed in RGB pixels.
    fn buffer_size_in_pixels(&self) -> usize {
        self.buffer_size().saturating_sub(HEADER_SIZE) / BYTES_PER_PIXEL
    }
}

/// Stream OPC server with a fixed pool of client slots.
pub struct OpcServer<L: StreamListener, H> {
    listener: L,
    handler: H,
    slots: Vec<ClientSlot<L::Connection>>,
    arena: Box<[u8]>,
    buffer_size: usize,
    client_count: usize,
}

impl<L: StreamListener, H: OpcHandler> OpcServer<L, H> {
    /// Create a server with `max_clients` slots of `buffer_size` bytes each.
    pub fn new(listener: L, max_clients: usize, buffer_size: usize, handler: H) -> Result<Self> {
        let config = OpcServerConfig {
            max_clients,
            buffer_size,
            ..Default::default()
        };
        Self::from_config(listener, &config, handler)
    }

    /// Create a server sized from `config`.
    pub fn from_config(listener: L, config: &OpcServerConfig, handler: H) -> Result<Self> {
        config.validate()?;
        let arena = vec![0u8; config.buffer_size * config.max_clients].into_boxed_slice();
        let slots = (0..config.max_clients).map(ClientSlot::new).collect();
        Ok(Self {
            listener,
            handler,
            slots,
            arena,
            buffer_size: config.buffer_size,
            client_count: 0,
        })
    }

    /// Start the listener.
    pub fn begin(&mut self) -> Result<()> {
        self.listener.begin().map_err(OpcError::Bind)?;
        log::info!(
            "OPC server started: {} slots x {} bytes",
            self.slots.len(),
            self.buffer_size
        );
        Ok(())
    }

    /// Run one poll cycle: service every slot, then admit at most one client.
    pub fn process(&mut self) -> PollStats {
        let mut stats = PollStats::default();
        let mut active = 0;

        let buffers = self.arena.chunks_exact_mut(self.buffer_size);
        for (slot, buf) in self.slots.iter_mut().zip(buffers) {
            if slot.is_alive() {
                slot.mark_connected();
                match slot.service(buf, &mut self.handler) {
                    Ok(frames) => {
                        stats.frames += frames;
                        active += 1;
                    }
                    Err(e) => {
                        log::warn!(
                            "Slot {} ({:?}): {}, closing connection",
                            slot.index(),
                            slot.remote_addr(),
                            e
                        );
                        stats.errors += 1;
                        Self::evict(slot, &mut self.handler, &mut stats);
                    }
                }
            } else if slot.state() == SlotState::Connected {
                Self::evict(slot, &mut self.handler, &mut stats);
            }
        }
        self.client_count = active;

        self.admit(&mut stats);
        stats
    }

    fn evict(slot: &mut ClientSlot<L::Connection>, handler: &mut H, stats: &mut PollStats) {
        slot.mark_disconnected();
        // Snapshot before release so the handler sees the dropped partial frame
        let info = slot.info();
        slot.release();
        stats.evicted += 1;
        log::info!(
            "Client {:?} left slot {} ({} bytes of partial frame dropped)",
            info.remote_addr,
            info.index,
            info.buffer_length
        );
        handler.on_client_disconnected(&info);
    }

    fn admit(&mut self, stats: &mut PollStats) {
        let Some(mut conn) = self.listener.poll_new_connection() else {
            return;
        };
        let remote = conn.remote_addr();
        self.handler.on_client_connected(remote);

        if self.client_count >= self.slots.len() {
            log::info!("Too many clients, connection from {:?} refused", remote);
            conn.close();
            stats.refused += 1;
            return;
        }

        for slot in self.slots.iter_mut() {
            if slot.is_alive() {
                continue;
            }
            if slot.state() != SlotState::Disconnected {
                // Previous occupant died since the service pass
                slot.mark_disconnected();
                stats.evicted += 1;
                self.handler.on_client_disconnected(&slot.info());
            }
            slot.install(conn);
            stats.admitted += 1;
            log::info!("Client {:?} admitted to slot {}", remote, slot.index());
            return;
        }

        log::warn!("No free slot for {:?}, connection refused", remote);
        conn.close();
        stats.refused += 1;
    }

    /// Clients found alive during the last poll.
    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// Number of slots in the pool.
    pub fn client_capacity(&self) -> usize {
        self.slots.len()
    }

    /// Per-slot buffer size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Per-slot buffer size in RGB pixels.
    pub fn buffer_size_in_pixels(&self) -> usize {
        self.buffer_size.saturating_sub(HEADER_SIZE) / BYTES_PER_PIXEL
    }

    /// Unread bytes pending across all slots.
    pub fn bytes_available(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.assembly().bytes_available())
            .sum()
    }

    /// Snapshot of every slot, in pool order.
    pub fn slots(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.slots.iter().map(ClientSlot::info)
    }

    pub fn slot(&self, index: usize) -> Option<&ClientSlot<L::Connection>> {
        self.slots.get(index)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access, e.g. to swap callbacks at runtime.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }
}

impl<L: StreamListener, H: OpcHandler> OpcService for OpcServer<L, H> {
    fn begin(&mut self) -> Result<()> {
        OpcServer::begin(self)
    }

    fn process(&mut self) -> PollStats {
        OpcServer::process(self)
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn client_count(&self) -> usize {
        self.client_count
    }
}
