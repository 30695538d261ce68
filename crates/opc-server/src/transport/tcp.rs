// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// TCP transport over std nonblocking sockets.
//
// std has no FIONREAD, so a connection drains whatever the kernel holds into
// a staging queue and reports the queue length as its available byte count.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use super::{StreamConnection, StreamListener};

/// Upper bound on bytes staged per connection; the rest stays in the kernel.
const MAX_STAGED: usize = 64 * 1024;

/// Read chunk when draining the socket.
const READ_CHUNK: usize = 4096;

/// TCP listener that hands out nonblocking [`TcpConnection`]s.
pub struct TcpStreamListener {
    addr: SocketAddr,
    listener: Option<TcpListener>,
}

impl TcpStreamListener {
    /// Create a listener for `addr`. Nothing is bound until [`StreamListener::begin`].
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
        }
    }

    /// Bound address (resolves port 0 after `begin`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl StreamListener for TcpStreamListener {
    type Connection = TcpConnection;

    fn begin(&mut self) -> io::Result<()> {
        let listener = TcpListener::bind(self.addr)?;
        // Non-blocking so the server loop can poll
        listener.set_nonblocking(true)?;
        self.listener = Some(listener);
        Ok(())
    }

    fn poll_new_connection(&mut self) -> Option<TcpConnection> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, peer)) => match TcpConnection::new(stream, Some(peer)) {
                Ok(conn) => Some(conn),
                Err(e) => {
                    log::warn!("Dropping connection from {}: {}", peer, e);
                    None
                }
            },
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("Accept error: {}", e);
                None
            }
        }
    }
}

/// One accepted TCP client.
pub struct TcpConnection {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    staged: VecDeque<u8>,
    eof: bool,
    closed: bool,
}

impl TcpConnection {
    /// Wrap an accepted stream, switching it to nonblocking mode.
    pub fn new(stream: TcpStream, peer: Option<SocketAddr>) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let _ = stream.set_nodelay(true);
        Ok(Self {
            stream,
            peer,
            staged: VecDeque::new(),
            eof: false,
            closed: false,
        })
    }

    /// Move everything the kernel has into the staging queue.
    fn fill(&mut self) {
        if self.closed || self.eof {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK];
        while self.staged.len() < MAX_STAGED {
            let want = READ_CHUNK.min(MAX_STAGED - self.staged.len());
            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.staged.extend(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Read error from {:?}: {}", self.peer, e);
                    self.eof = true;
                    break;
                }
            }
        }
    }
}

impl StreamConnection for TcpConnection {
    fn is_alive(&mut self) -> bool {
        self.fill();
        !self.closed && !(self.eof && self.staged.is_empty())
    }

    fn available_bytes(&mut self) -> usize {
        self.fill();
        self.staged.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.staged.len());
        for (dst, src) in buf.iter_mut().zip(self.staged.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn close(&mut self) {
        if !self.closed {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.closed = true;
            self.staged.clear();
        }
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}
