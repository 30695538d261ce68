// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Open Pixel Control (OPC) frame server.
//!
//! Receives OPC frames from a fixed pool of network clients and hands every
//! completed frame to an application handler. Frames may be split across any
//! number of transport reads, or several frames may arrive in one read; the
//! per-slot reassembler copes with both.
//!
//! # Architecture
//!
//! ```text
//!   OPC clients                 OpcServer (this crate)               Application
//!                          +-------------------------------+
//!   client A ---TCP------->| slot 0 [buf] -- reassembler --|--> on_frame()
//!   client B ---TCP------->| slot 1 [buf] -- reassembler --|--> on_frame()
//!   client C ---TCP------->| (pool full: refused)          |--> on_client_connected()
//!                          +-------------------------------+
//!
//!   sender ----UDP-------->  OpcDatagramServer [scratch] -------> on_frame()
//! ```
//!
//! # Wire format
//!
//! | Byte | Field       |
//! |------|-------------|
//! | 0    | channel     |
//! | 1    | command     |
//! | 2    | length high |
//! | 3    | length low  |
//! | 4..  | payload     |
//!
//! # Driving the server
//!
//! Nothing here blocks or spawns threads. The caller owns the loop and calls
//! [`OpcService::process`] as often as it likes:
//!
//! ```ignore
//! let config = OpcServerConfig::default();
//! let listener = TcpStreamListener::new(config.listen_addr());
//! let mut server = OpcServer::from_config(listener, &config, MyHandler)?;
//! server.begin()?;
//! loop {
//!     server.process();
//! }
//! ```

pub mod config;
pub mod datagram;
pub mod error;
pub mod handler;
pub mod header;
pub mod reassembler;
pub mod server;
pub mod slot;
pub mod transport;

// Re-exports for convenience.
pub use config::{ConfigError, OpcServerConfig, TransportKind};
pub use datagram::OpcDatagramServer;
pub use error::{OpcError, Result};
pub use handler::{Callbacks, Frame, NullHandler, OpcHandler};
pub use header::{encode_frame, FrameHeader, HEADER_SIZE, MAX_DATA_LEN};
pub use reassembler::FrameAssembly;
pub use server::{OpcServer, OpcService, PollStats};
pub use slot::{ClientSlot, SlotInfo, SlotState};
pub use transport::{
    DatagramListener, StreamConnection, StreamListener, TcpConnection, TcpStreamListener,
    UdpDatagramListener,
};

/// Payload bytes per pixel (RGB).
pub const BYTES_PER_PIXEL: usize = 3;

/// Customary OPC TCP/UDP port.
pub const DEFAULT_PORT: u16 = 7890;

#[cfg(test)]
mod tests;
