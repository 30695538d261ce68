// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transports.
//!
//! Loopback listener and connections backed by shared byte queues. The
//! server side sees them through the normal transport traits, the test or
//! embedding side pushes bytes through a [`MemoryPeer`] or a
//! [`MemoryDatagramListener`] handle.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{DatagramListener, StreamConnection, StreamListener};

/// State shared between a [`MemoryPeer`] and its [`MemoryConnection`].
#[derive(Debug, Default)]
struct Pipe {
    data: VecDeque<u8>,
    peer_open: bool,
    server_closed: bool,
    /// Largest number of bytes a single `read` yields, if limited.
    read_limit: Option<usize>,
}

#[derive(Debug, Default)]
struct ListenerState {
    started: bool,
    refuse_bind: bool,
    pending: VecDeque<MemoryConnection>,
    next_port: u16,
}

/// In-memory stream listener. Clones share the same accept queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryListener {
    state: Arc<Mutex<ListenerState>>,
}

impl MemoryListener {
    /// Create a listener whose `begin` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a listener whose `begin` fails, as if the port were taken.
    pub fn unbindable() -> Self {
        let listener = Self::default();
        listener.state.lock().refuse_bind = true;
        listener
    }

    /// Whether `begin` has succeeded.
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Queue a new inbound connection and return the client end.
    pub fn connect(&self) -> MemoryPeer {
        let mut state = self.state.lock();
        state.next_port = state.next_port.wrapping_add(1);
        let addr = SocketAddr::from(([127, 0, 0, 1], 40_000u16.wrapping_add(state.next_port)));

        let pipe = Arc::new(Mutex::new(Pipe {
            peer_open: true,
            ..Default::default()
        }));
        state.pending.push_back(MemoryConnection {
            pipe: Arc::clone(&pipe),
            addr,
        });
        MemoryPeer { pipe, addr }
    }

    /// Connections queued but not yet polled.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl StreamListener for MemoryListener {
    type Connection = MemoryConnection;

    fn begin(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.refuse_bind {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "memory listener refused to bind",
            ));
        }
        state.started = true;
        Ok(())
    }

    fn poll_new_connection(&mut self) -> Option<MemoryConnection> {
        let mut state = self.state.lock();
        if !state.started {
            return None;
        }
        state.pending.pop_front()
    }
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    pipe: Arc<Mutex<Pipe>>,
    addr: SocketAddr,
}

impl StreamConnection for MemoryConnection {
    fn is_alive(&mut self) -> bool {
        let pipe = self.pipe.lock();
        !pipe.server_closed && (pipe.peer_open || !pipe.data.is_empty())
    }

    fn available_bytes(&mut self) -> usize {
        let pipe = self.pipe.lock();
        if pipe.server_closed {
            0
        } else {
            pipe.data.len()
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut pipe = self.pipe.lock();
        let limit = pipe.read_limit.unwrap_or(usize::MAX);
        let n = buf.len().min(pipe.data.len()).min(limit);
        for (dst, src) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn close(&mut self) {
        let mut pipe = self.pipe.lock();
        pipe.server_closed = true;
        pipe.data.clear();
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

/// Client end of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    pipe: Arc<Mutex<Pipe>>,
    addr: SocketAddr,
}

impl MemoryPeer {
    /// Append bytes to the stream.
    pub fn send(&self, bytes: &[u8]) {
        let mut pipe = self.pipe.lock();
        if pipe.peer_open && !pipe.server_closed {
            pipe.data.extend(bytes);
        }
    }

    /// Hang up. Bytes already sent remain readable.
    pub fn disconnect(&self) {
        self.pipe.lock().peer_open = false;
    }

    /// Whether the server closed this connection.
    pub fn is_closed_by_server(&self) -> bool {
        self.pipe.lock().server_closed
    }

    /// Bytes sent but not yet consumed by the server.
    pub fn unread(&self) -> usize {
        self.pipe.lock().data.len()
    }

    /// Cap the bytes a single server-side `read` returns.
    pub fn set_read_limit(&self, limit: Option<usize>) {
        self.pipe.lock().read_limit = limit;
    }

    /// Address the server sees for this peer.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[derive(Debug, Default)]
struct DatagramState {
    port: Option<u16>,
    refuse_bind: bool,
    queue: VecDeque<(Vec<u8>, SocketAddr)>,
    /// Reported size differs from the bytes `read` yields, if set.
    short_read: Option<usize>,
}

/// In-memory datagram listener. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatagramListener {
    state: Arc<Mutex<DatagramState>>,
    current: Option<(Vec<u8>, SocketAddr)>,
}

impl MemoryDatagramListener {
    /// Create a listener whose `begin` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a listener whose `begin` fails.
    pub fn unbindable() -> Self {
        let listener = Self::default();
        listener.state.lock().refuse_bind = true;
        listener
    }

    /// Queue a datagram from `from`.
    pub fn send_from(&self, from: SocketAddr, bytes: &[u8]) {
        self.state.lock().queue.push_back((bytes.to_vec(), from));
    }

    /// Queue a datagram from a fixed loopback sender.
    pub fn send(&self, bytes: &[u8]) {
        self.send_from(SocketAddr::from(([127, 0, 0, 1], 50_000)), bytes);
    }

    /// Make every subsequent `read` return at most `limit` bytes.
    pub fn set_short_read(&self, limit: Option<usize>) {
        self.state.lock().short_read = limit;
    }

    /// Port passed to `begin`, if started.
    pub fn port(&self) -> Option<u16> {
        self.state.lock().port
    }

    /// Datagrams queued but not yet polled.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl DatagramListener for MemoryDatagramListener {
    fn begin(&mut self, port: u16) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.refuse_bind {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "memory datagram listener refused to bind",
            ));
        }
        state.port = Some(port);
        Ok(())
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        let mut state = self.state.lock();
        if state.port.is_none() {
            return None;
        }
        self.current = state.queue.pop_front();
        self.current.as_ref().map(|(bytes, _)| bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let limit = self.state.lock().short_read.unwrap_or(usize::MAX);
        match self.current.take() {
            Some((bytes, _)) => {
                let n = buf.len().min(bytes.len()).min(limit);
                buf[..n].copy_from_slice(&bytes[..n]);
                n
            }
            None => 0,
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.current.as_ref().map(|(_, addr)| *addr)
    }
}
