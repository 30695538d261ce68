// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Application-facing callbacks.
//
// Every hook has a no-op default, so a handler only implements what it needs.
// Hooks run synchronously inside `process()`.

use std::fmt;
use std::net::SocketAddr;

use crate::header::FrameHeader;
use crate::slot::SlotInfo;

/// A completed frame, borrowed from the receive buffer.
///
/// The payload is only valid for the duration of [`OpcHandler::on_frame`];
/// the buffer is reused as soon as the handler returns.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    header: FrameHeader,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(header: FrameHeader, data: &'a [u8]) -> Self {
        Self { header, data }
    }

    pub fn channel(&self) -> u8 {
        self.header.channel
    }

    pub fn command(&self) -> u8 {
        self.header.command
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Header as received on the wire.
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("channel", &self.header.channel)
            .field("command", &self.header.command)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Receives frames and connection events from a server.
pub trait OpcHandler {
    /// A frame was fully received.
    fn on_frame(&mut self, _frame: &Frame<'_>) {}

    /// A connection arrived. Fires before admission, so also for refused clients.
    fn on_client_connected(&mut self, _remote: Option<SocketAddr>) {}

    /// A slot lost its client.
    fn on_client_disconnected(&mut self, _slot: &SlotInfo) {}
}

impl<H: OpcHandler + ?Sized> OpcHandler for &mut H {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        (**self).on_frame(frame)
    }

    fn on_client_connected(&mut self, remote: Option<SocketAddr>) {
        (**self).on_client_connected(remote)
    }

    fn on_client_disconnected(&mut self, slot: &SlotInfo) {
        (**self).on_client_disconnected(slot)
    }
}

impl<H: OpcHandler + ?Sized> OpcHandler for Box<H> {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        (**self).on_frame(frame)
    }

    fn on_client_connected(&mut self, remote: Option<SocketAddr>) {
        (**self).on_client_connected(remote)
    }

    fn on_client_disconnected(&mut self, slot: &SlotInfo) {
        (**self).on_client_disconnected(slot)
    }
}

/// Handler that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl OpcHandler for NullHandler {}

type FrameFn = Box<dyn FnMut(&Frame<'_>)>;
type ConnectFn = Box<dyn FnMut(Option<SocketAddr>)>;
type DisconnectFn = Box<dyn FnMut(&SlotInfo)>;

/// Handler built from closures. Unset callbacks are no-ops.
///
/// ```ignore
/// let handler = Callbacks::new()
///     .with_frame(|frame| println!("{} bytes on channel {}", frame.len(), frame.channel()))
///     .with_disconnect(|slot| println!("slot {} closed", slot.index));
/// ```
#[derive(Default)]
pub struct Callbacks {
    frame: Option<FrameFn>,
    connected: Option<ConnectFn>,
    disconnected: Option<DisconnectFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, f: impl FnMut(&Frame<'_>) + 'static) -> Self {
        self.set_frame_callback(f);
        self
    }

    pub fn with_connect(mut self, f: impl FnMut(Option<SocketAddr>) + 'static) -> Self {
        self.set_connect_callback(f);
        self
    }

    pub fn with_disconnect(mut self, f: impl FnMut(&SlotInfo) + 'static) -> Self {
        self.set_disconnect_callback(f);
        self
    }

    /// Replace the frame callback.
    pub fn set_frame_callback(&mut self, f: impl FnMut(&Frame<'_>) + 'static) {
        self.frame = Some(Box::new(f));
    }

    /// Replace the connect callback.
    pub fn set_connect_callback(&mut self, f: impl FnMut(Option<SocketAddr>) + 'static) {
        self.connected = Some(Box::new(f));
    }

    /// Replace the disconnect callback.
    pub fn set_disconnect_callback(&mut self, f: impl FnMut(&SlotInfo) + 'static) {
        self.disconnected = Some(Box::new(f));
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("frame", &self.frame.is_some())
            .field("connected", &self.connected.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .finish()
    }
}

impl OpcHandler for Callbacks {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        if let Some(f) = self.frame.as_mut() {
            f(frame);
        }
    }

    fn on_client_connected(&mut self, remote: Option<SocketAddr>) {
        if let Some(f) = self.connected.as_mut() {
            f(remote);
        }
    }

    fn on_client_disconnected(&mut self, slot: &SlotInfo) {
        if let Some(f) = self.disconnected.as_mut() {
            f(slot);
        }
    }
}
