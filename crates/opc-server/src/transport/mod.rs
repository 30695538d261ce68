// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for the OPC server.
//!
//! The server never touches sockets directly. It polls a listener for new
//! connections and asks each connection how many bytes it can hand over
//! right now. Implementations:
//!
//! - [`TcpStreamListener`] / [`TcpConnection`] - std nonblocking TCP
//! - [`UdpDatagramListener`] - socket2 UDP with address reuse
//! - [`memory`] - in-process loopback for tests and embedding
//!
//! ## Contract
//!
//! - **Non-blocking** - every method returns immediately
//! - **Honest counts** - `read` never yields more than `available_bytes` reported,
//!   and may yield less
//! - **No errors on the hot path** - a broken connection simply stops being alive

use std::io;
use std::net::SocketAddr;

pub mod memory;
pub mod tcp;
pub mod udp;

pub use tcp::{TcpConnection, TcpStreamListener};
pub use udp::UdpDatagramListener;

/// Accepts stream-oriented client connections.
pub trait StreamListener {
    /// Connection type produced by this listener.
    type Connection: StreamConnection;

    /// Start listening. Called once before the first poll.
    fn begin(&mut self) -> io::Result<()>;

    /// Return one pending connection, if any.
    fn poll_new_connection(&mut self) -> Option<Self::Connection>;
}

/// One accepted client connection.
pub trait StreamConnection {
    /// Whether the peer is still connected. A connection whose peer hung up
    /// stays alive until its remaining bytes have been read.
    fn is_alive(&mut self) -> bool;

    /// Bytes that can be read right now without blocking.
    fn available_bytes(&mut self) -> usize;

    /// Read up to `buf.len()` bytes. Returns the number of bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Close the connection. Idempotent.
    fn close(&mut self);

    /// Peer address, if the transport has one.
    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Receives whole datagrams.
pub trait DatagramListener {
    /// Bind to `port` and start receiving.
    fn begin(&mut self, port: u16) -> io::Result<()>;

    /// Size of the next pending datagram, or `None` if nothing is queued.
    ///
    /// Each call moves on to the next datagram; an unread previous one is dropped.
    fn pending_packet_size(&mut self) -> Option<usize>;

    /// Copy the current datagram into `buf`. Returns the number of bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Sender of the current datagram.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Sender port of the current datagram (0 if unknown).
    fn remote_port(&self) -> u16 {
        self.remote_addr().map_or(0, |addr| addr.port())
    }
}
