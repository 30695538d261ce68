// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// UDP datagram listener.

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use super::DatagramListener;

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65_535;

/// UDP listener using `socket2` for the bind, then std for I/O.
pub struct UdpDatagramListener {
    bind_address: IpAddr,
    socket: Option<UdpSocket>,
    /// Current datagram (received but not yet consumed).
    packet: Vec<u8>,
    packet_len: usize,
    peer: Option<SocketAddr>,
}

impl UdpDatagramListener {
    /// Create a listener on `bind_address`. The port is given to `begin`.
    pub fn new(bind_address: IpAddr) -> Self {
        Self {
            bind_address,
            socket: None,
            packet: vec![0u8; MAX_DATAGRAM],
            packet_len: 0,
            peer: None,
        }
    }

    /// Bound address (resolves port 0 after `begin`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl DatagramListener for UdpDatagramListener {
    fn begin(&mut self, port: u16) -> io::Result<()> {
        let addr = SocketAddr::new(self.bind_address, port);
        let domain = match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        };
        let socket = socket2::Socket::new(
            domain,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        // Non-blocking so the server loop can poll
        socket.set_nonblocking(true)?;
        self.socket = Some(socket.into());
        Ok(())
    }

    fn pending_packet_size(&mut self) -> Option<usize> {
        self.packet_len = 0;
        self.peer = None;
        let socket = self.socket.as_ref()?;
        match socket.recv_from(&mut self.packet) {
            Ok((n, peer)) => {
                self.packet_len = n;
                self.peer = Some(peer);
                Some(n)
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::debug!("UDP receive error: {}", e);
                None
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.packet_len);
        buf[..n].copy_from_slice(&self.packet[..n]);
        self.packet_len = 0;
        n
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}
