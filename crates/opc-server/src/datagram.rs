// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Datagram receiver: one whole frame per packet.
//
// No slots and no reassembly. A packet is taken only if it is exactly
// `buffer_size` bytes long; anything else is dropped.

use crate::config::OpcServerConfig;
use crate::error::{OpcError, Result};
use crate::handler::{Frame, OpcHandler};
use crate::header::{FrameHeader, HEADER_SIZE};
use crate::server::{OpcService, PollStats};
use crate::transport::DatagramListener;

/// OPC server for datagram transports.
pub struct OpcDatagramServer<D, H> {
    listener: D,
    handler: H,
    port: u16,
    /// Receive buffer, sized once.
    scratch: Box<[u8]>,
}

impl<D: DatagramListener, H: OpcHandler> OpcDatagramServer<D, H> {
    /// Create a server accepting `buffer_size`-byte datagrams on `port`.
    pub fn new(listener: D, port: u16, buffer_size: usize, handler: H) -> Result<Self> {
        let config = OpcServerConfig {
            port,
            buffer_size,
            ..Default::default()
        };
        Self::from_config(listener, &config, handler)
    }

    pub fn from_config(listener: D, config: &OpcServerConfig, handler: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            listener,
            handler,
            port: config.port,
            scratch: vec![0u8; config.buffer_size].into_boxed_slice(),
        })
    }

    /// Bind the listener.
    pub fn begin(&mut self) -> Result<()> {
        self.listener.begin(self.port).map_err(OpcError::Bind)?;
        log::info!(
            "OPC datagram server started on port {} ({} byte frames)",
            self.port,
            self.scratch.len()
        );
        Ok(())
    }

    /// Take at most one datagram and dispatch it if it has the right size.
    pub fn process(&mut self) -> PollStats {
        let mut stats = PollStats::default();
        let Some(size) = self.listener.pending_packet_size() else {
            return stats;
        };

        let expected = self.scratch.len();
        if size != expected {
            log::debug!(
                "Discarding {} byte datagram from {:?}:{}, expected {}",
                size,
                self.listener.remote_addr().map(|a| a.ip()),
                self.listener.remote_port(),
                expected
            );
            stats.discarded += 1;
            return stats;
        }

        let n = self.listener.read(&mut self.scratch);
        if n != expected {
            log::debug!("Short datagram read: {} of {} bytes", n, expected);
            stats.discarded += 1;
            return stats;
        }

        let header = FrameHeader::from_bytes([
            self.scratch[0],
            self.scratch[1],
            self.scratch[2],
            self.scratch[3],
        ]);
        if header.data_len() as usize != expected - HEADER_SIZE {
            log::trace!(
                "Datagram header declares {} bytes, delivering {}",
                header.data_len(),
                expected - HEADER_SIZE
            );
        }

        self.handler
            .on_frame(&Frame::new(header, &self.scratch[HEADER_SIZE..]));
        stats.frames += 1;
        stats
    }

    pub fn buffer_size(&self) -> usize {
        self.scratch.len()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn listener(&self) -> &D {
        &self.listener
    }
}

impl<D: DatagramListener, H: OpcHandler> OpcService for OpcDatagramServer<D, H> {
    fn begin(&mut self) -> Result<()> {
        OpcDatagramServer::begin(self)
    }

    fn process(&mut self) -> PollStats {
        OpcDatagramServer::process(self)
    }

    fn buffer_size(&self) -> usize {
        self.scratch.len()
    }
}
