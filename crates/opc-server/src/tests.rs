// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Scenario tests for opc-server.
//
// Drives the stream and datagram servers through the in-memory transport:
// reassembly across chunk boundaries, multi-frame reads, admission and
// eviction, protocol violations, accessors and the datagram path.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::datagram::OpcDatagramServer;
use crate::error::OpcError;
use crate::handler::{Callbacks, Frame, NullHandler, OpcHandler};
use crate::header::{encode_frame, HEADER_SIZE};
use crate::reassembler::FrameAssembly;
use crate::server::{OpcServer, OpcService, PollStats};
use crate::slot::{SlotInfo, SlotState};
use crate::transport::memory::{MemoryDatagramListener, MemoryListener, MemoryPeer};
use crate::transport::{StreamConnection, StreamListener};

type Decoded = (u8, u8, Vec<u8>);

#[derive(Debug, Default)]
struct Recorder {
    frames: Vec<Decoded>,
    connected: Vec<Option<SocketAddr>>,
    disconnected: Vec<SlotInfo>,
}

impl OpcHandler for Recorder {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        assert_eq!(frame.len(), frame.data().len());
        self.frames
            .push((frame.channel(), frame.command(), frame.data().to_vec()));
    }

    fn on_client_connected(&mut self, remote: Option<SocketAddr>) {
        self.connected.push(remote);
    }

    fn on_client_disconnected(&mut self, slot: &SlotInfo) {
        self.disconnected.push(*slot);
    }
}

fn stream_server(
    max_clients: usize,
    buffer_size: usize,
) -> (OpcServer<MemoryListener, Recorder>, MemoryListener) {
    let listener = MemoryListener::new();
    let handler = Recorder::default();
    let mut server = OpcServer::new(listener.clone(), max_clients, buffer_size, handler).unwrap();
    server.begin().unwrap();
    (server, listener)
}

/// Connect a client and poll once so it lands in a slot.
fn admitted(
    server: &mut OpcServer<MemoryListener, Recorder>,
    listener: &MemoryListener,
) -> MemoryPeer {
    let peer = listener.connect();
    let stats = server.process();
    assert_eq!(stats.admitted, 1);
    peer
}

fn frame(channel: u8, command: u8, data: &[u8]) -> Vec<u8> {
    encode_frame(channel, command, data).unwrap()
}

// -----------------------------------------------------------------------
// 1. Startup: listener bind failure surfaces from begin()
// -----------------------------------------------------------------------
#[test]
fn test_begin_bind_failure() {
    let mut server = OpcServer::new(MemoryListener::unbindable(), 2, 10, NullHandler).unwrap();
    assert!(matches!(server.begin(), Err(OpcError::Bind(_))));

    let mut server =
        OpcDatagramServer::new(MemoryDatagramListener::unbindable(), 7890, 10, NullHandler)
            .unwrap();
    assert!(matches!(server.begin(), Err(OpcError::Bind(_))));
}

// -----------------------------------------------------------------------
// 2. Construction rejects unusable sizes
// -----------------------------------------------------------------------
#[test]
fn test_construction_validates_sizes() {
    assert!(matches!(
        OpcServer::new(MemoryListener::new(), 0, 10, NullHandler),
        Err(OpcError::Config(_))
    ));
    assert!(matches!(
        OpcServer::new(MemoryListener::new(), 2, 3, NullHandler),
        Err(OpcError::Config(_))
    ));
    assert!(matches!(
        OpcDatagramServer::new(MemoryDatagramListener::new(), 7890, 2, NullHandler),
        Err(OpcError::Config(_))
    ));
}

// -----------------------------------------------------------------------
// 3. Frame completes on its last declared byte; trailing byte starts a header
// -----------------------------------------------------------------------
#[test]
fn test_frame_then_trailing_byte() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);

    peer.send(&[1, 2, 0, 3, 0xAA, 0xBB, 0xCC]);
    let stats = server.process();
    assert_eq!(stats.frames, 1);
    assert_eq!(server.handler().frames, vec![(1, 2, vec![0xAA, 0xBB, 0xCC])]);

    peer.send(&[0xDD]);
    let stats = server.process();
    assert_eq!(stats.frames, 0);
    assert_eq!(server.handler().frames.len(), 1);

    let slot = server.slot(0).unwrap();
    assert_eq!(slot.assembly().buffer_length(), 1);
    assert!(slot.assembly().header().is_none());
}

// -----------------------------------------------------------------------
// 4. Payload split across two chunks fires only after the second chunk
// -----------------------------------------------------------------------
#[test]
fn test_payload_split_across_chunks() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);

    peer.send(&[1, 2, 0, 4, 0xAA, 0xBB, 0xCC]);
    assert_eq!(server.process().frames, 0);
    assert!(server.handler().frames.is_empty());
    assert_eq!(server.slot(0).unwrap().assembly().buffer_length(), 7);

    peer.send(&[0xDD]);
    assert_eq!(server.process().frames, 1);
    assert_eq!(
        server.handler().frames,
        vec![(1, 2, vec![0xAA, 0xBB, 0xCC, 0xDD])]
    );
}

// -----------------------------------------------------------------------
// 5. Two concatenated frames dispatch in order within one poll
// -----------------------------------------------------------------------
#[test]
fn test_two_frames_one_poll() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);

    peer.send(&[1, 2, 0, 3, 0xAA, 0xBB, 0xCC, 4, 5, 0, 1, 0xEE]);
    let stats = server.process();
    assert_eq!(stats.frames, 2);
    assert_eq!(
        server.handler().frames,
        vec![(1, 2, vec![0xAA, 0xBB, 0xCC]), (4, 5, vec![0xEE])]
    );
}

// -----------------------------------------------------------------------
// 6. N back-to-back frames yield exactly N callbacks in one poll
// -----------------------------------------------------------------------
#[test]
fn test_many_frames_one_poll() {
    let (mut server, listener) = stream_server(1, 64);
    let peer = admitted(&mut server, &listener);

    let mut expected = Vec::new();
    let mut stream = Vec::new();
    for i in 0..40u8 {
        let data: Vec<u8> = (0..(i % 13)).map(|b| b.wrapping_mul(i)).collect();
        stream.extend(frame(i % 4, i, &data));
        expected.push((i % 4, i, data));
    }
    peer.send(&stream);

    let stats = server.process();
    assert_eq!(stats.frames, 40);
    assert_eq!(server.handler().frames, expected);
    assert_eq!(peer.unread(), 0);
}

// -----------------------------------------------------------------------
// 7. Decoded frames do not depend on where chunk boundaries fall
// -----------------------------------------------------------------------
#[test]
fn test_chunk_boundary_invariance() {
    let mut rng = fastrand::Rng::with_seed(0x0C_0FFEE);

    let mut expected = Vec::new();
    let mut stream = Vec::new();
    for _ in 0..60 {
        let mut data = vec![0u8; rng.usize(0..=30)];
        rng.fill(&mut data);
        let (channel, command) = (rng.u8(..), rng.u8(..));
        stream.extend(frame(channel, command, &data));
        expected.push((channel, command, data));
    }

    for _round in 0..25 {
        let (mut server, listener) = stream_server(1, 4 + 30);
        let peer = admitted(&mut server, &listener);

        let mut rest = stream.as_slice();
        while !rest.is_empty() {
            let take = rng.usize(1..=rest.len().min(48));
            let (chunk, tail) = rest.split_at(take);
            peer.send(chunk);
            server.process();
            rest = tail;
        }

        assert_eq!(server.handler().frames, expected);
        assert!(server.slot(0).unwrap().assembly().is_idle());
    }
}

// -----------------------------------------------------------------------
// 8. Byte-at-a-time delivery, including header bytes
// -----------------------------------------------------------------------
#[test]
fn test_byte_at_a_time() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);

    let bytes = [7, 0, 0, 2, 0x11, 0x22, 8, 1, 0, 0];
    let mut fired_after = Vec::new();
    for (i, b) in bytes.iter().enumerate() {
        peer.send(&[*b]);
        if server.process().frames > 0 {
            fired_after.push(i);
        }
    }

    assert_eq!(fired_after, vec![5, 9]);
    assert_eq!(
        server.handler().frames,
        vec![(7, 0, vec![0x11, 0x22]), (8, 1, vec![])]
    );
}

// -----------------------------------------------------------------------
// 9. Slot state after a frame equals a freshly connected slot
// -----------------------------------------------------------------------
#[test]
fn test_state_resets_after_frame() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);
    assert_eq!(*server.slot(0).unwrap().assembly(), FrameAssembly::default());

    peer.send(&frame(3, 0, &[1, 2, 3, 4, 5, 6]));
    server.process();
    assert_eq!(*server.slot(0).unwrap().assembly(), FrameAssembly::default());
}

// -----------------------------------------------------------------------
// 10. Admission overflow: capacity slots active, excess refused, no corruption
// -----------------------------------------------------------------------
#[test]
fn test_admission_overflow() {
    let (mut server, listener) = stream_server(2, 10);
    let a = listener.connect();
    let b = listener.connect();
    let c = listener.connect();

    // One admission per poll
    assert_eq!(server.process().admitted, 1);
    assert_eq!(listener.pending(), 2);
    assert_eq!(server.process().admitted, 1);

    // Partial frames in flight on both admitted clients
    a.send(&[1, 0, 0, 3, 0xA1]);
    b.send(&[2, 0]);

    let stats = server.process();
    assert_eq!(stats.refused, 1);
    assert_eq!(stats.admitted, 0);
    assert_eq!(server.client_count(), 2);
    assert!(c.is_closed_by_server());
    assert!(!a.is_closed_by_server());
    assert!(!b.is_closed_by_server());

    // Connect callback fired for every arrival, refused one included
    assert_eq!(
        server.handler().connected,
        vec![Some(a.addr()), Some(b.addr()), Some(c.addr())]
    );
    assert!(server.handler().disconnected.is_empty());

    let slots: Vec<SlotInfo> = server.slots().collect();
    assert_eq!(slots[0].remote_addr, Some(a.addr()));
    assert_eq!(slots[0].buffer_length, 5);
    assert_eq!(slots[1].remote_addr, Some(b.addr()));
    assert_eq!(slots[1].buffer_length, 2);

    // Existing clients finish their frames undisturbed
    a.send(&[0xA2, 0xA3]);
    b.send(&[0, 1, 0xB1]);
    assert_eq!(server.process().frames, 2);
    assert_eq!(
        server.handler().frames,
        vec![(1, 0, vec![0xA1, 0xA2, 0xA3]), (2, 0, vec![0xB1])]
    );
}

// -----------------------------------------------------------------------
// 11. New client is counted from the next poll
// -----------------------------------------------------------------------
#[test]
fn test_client_count_lags_admission() {
    let (mut server, listener) = stream_server(3, 10);
    let _a = admitted(&mut server, &listener);
    assert_eq!(server.client_count(), 0);

    server.process();
    assert_eq!(server.client_count(), 1);
    assert_eq!(server.slot(0).unwrap().state(), SlotState::Connected);
    assert_eq!(server.slot(1).unwrap().state(), SlotState::Disconnected);
}

// -----------------------------------------------------------------------
// 12. Disconnect callback fires once per transition
// -----------------------------------------------------------------------
#[test]
fn test_disconnect_fires_once() {
    let (mut server, listener) = stream_server(2, 10);
    let peer = admitted(&mut server, &listener);
    server.process();
    assert_eq!(server.client_count(), 1);

    peer.disconnect();
    let stats = server.process();
    assert_eq!(stats.evicted, 1);
    assert_eq!(server.client_count(), 0);

    for _ in 0..5 {
        assert_eq!(server.process().evicted, 0);
    }

    let gone = &server.handler().disconnected;
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].index, 0);
    assert_eq!(gone[0].state, SlotState::Disconnected);
    assert_eq!(gone[0].remote_addr, Some(peer.addr()));
    assert_eq!(gone[0].bytes_available, 0);
    assert_eq!(server.slot(0).unwrap().state(), SlotState::Disconnected);
}

// -----------------------------------------------------------------------
// 13. Bytes sent before hanging up are still delivered
// -----------------------------------------------------------------------
#[test]
fn test_data_before_disconnect_delivered() {
    let (mut server, listener) = stream_server(1, 10);
    let peer = admitted(&mut server, &listener);

    peer.send(&frame(5, 6, &[1, 2]));
    peer.disconnect();

    let stats = server.process();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.evicted, 0);

    let stats = server.process();
    assert_eq!(stats.evicted, 1);
    assert_eq!(server.handler().frames, vec![(5, 6, vec![1, 2])]);
}

// -----------------------------------------------------------------------
// 14. A reused slot starts clean; no partial frame leaks between clients
// -----------------------------------------------------------------------
#[test]
fn test_slot_reuse_starts_clean() {
    let (mut server, listener) = stream_server(1, 10);
    let first = admitted(&mut server, &listener);

    first.send(&[9, 9, 0, 5, 1, 2]);
    first.disconnect();
    server.process();
    assert_eq!(server.slot(0).unwrap().assembly().buffer_length(), 6);

    let second = listener.connect();
    let stats = server.process();
    assert_eq!(stats.evicted, 1);
    assert_eq!(stats.admitted, 1);

    // Handler learns how much of the partial frame was dropped
    let gone = &server.handler().disconnected;
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].remote_addr, Some(first.addr()));
    assert_eq!(gone[0].buffer_length, 6);
    assert_eq!(gone[0].state, SlotState::Disconnected);

    assert!(server.slot(0).unwrap().assembly().is_idle());
    assert_eq!(server.slot(0).unwrap().remote_addr(), Some(second.addr()));

    second.send(&frame(1, 1, &[7]));
    server.process();
    assert_eq!(server.handler().frames, vec![(1, 1, vec![7])]);
}

// -----------------------------------------------------------------------
// 15. A freed slot is taken over on the next arrival, first free slot wins
// -----------------------------------------------------------------------
#[test]
fn test_first_free_slot_wins() {
    let (mut server, listener) = stream_server(3, 10);
    let a = admitted(&mut server, &listener);
    let _b = admitted(&mut server, &listener);
    let _c = admitted(&mut server, &listener);

    a.disconnect();
    let d = listener.connect();
    let stats = server.process();
    assert_eq!(stats.evicted, 1);
    assert_eq!(stats.admitted, 1);
    assert_eq!(server.slot(0).unwrap().remote_addr(), Some(d.addr()));
}

// -----------------------------------------------------------------------
// 16. Client dying between the service pass and admission
// -----------------------------------------------------------------------

/// Connection that reports alive for a fixed number of checks.
struct Fading {
    alive_checks: usize,
    addr: SocketAddr,
}

impl StreamConnection for Fading {
    fn is_alive(&mut self) -> bool {
        if self.alive_checks == 0 {
            return false;
        }
        self.alive_checks -= 1;
        true
    }

    fn available_bytes(&mut self) -> usize {
        0
    }

    fn read(&mut self, _buf: &mut [u8]) -> usize {
        0
    }

    fn close(&mut self) {
        self.alive_checks = 0;
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

#[derive(Default)]
struct FadingListener {
    queue: Rc<RefCell<VecDeque<Fading>>>,
}

impl StreamListener for FadingListener {
    type Connection = Fading;

    fn begin(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn poll_new_connection(&mut self) -> Option<Fading> {
        self.queue.borrow_mut().pop_front()
    }
}

#[test]
fn test_admission_evicts_slot_that_died_after_service() {
    let listener = FadingListener::default();
    let queue = Rc::clone(&listener.queue);
    let mut server = OpcServer::new(listener, 2, 10, Recorder::default()).unwrap();
    server.begin().unwrap();

    let old_addr = SocketAddr::from(([10, 0, 0, 1], 1000));
    let new_addr = SocketAddr::from(([10, 0, 0, 2], 2000));

    // Alive for exactly one check: the next service pass
    queue.borrow_mut().push_back(Fading {
        alive_checks: 1,
        addr: old_addr,
    });
    assert_eq!(server.process().admitted, 1);

    queue.borrow_mut().push_back(Fading {
        alive_checks: usize::MAX,
        addr: new_addr,
    });
    let stats = server.process();
    assert_eq!(stats.evicted, 1);
    assert_eq!(stats.admitted, 1);
    assert_eq!(server.client_count(), 1);

    let gone = &server.handler().disconnected;
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].index, 0);
    assert_eq!(gone[0].remote_addr, Some(old_addr));
    assert_eq!(gone[0].state, SlotState::Disconnected);

    let slot = server.slot(0).unwrap();
    assert_eq!(slot.remote_addr(), Some(new_addr));
    assert_eq!(slot.state(), SlotState::Connected);

    // The new occupant is not reported as a second disconnect
    server.process();
    assert_eq!(server.handler().disconnected.len(), 1);
}

// -----------------------------------------------------------------------
// 17. Oversized frame: client dropped, other slots unaffected
// -----------------------------------------------------------------------
#[test]
fn test_oversized_frame_drops_client() {
    let (mut server, listener) = stream_server(2, 10);
    let bad = admitted(&mut server, &listener);
    let good = admitted(&mut server, &listener);

    good.send(&[4, 4, 0, 2, 0x01]);
    bad.send(&[0, 0, 0, 100, 1, 2, 3]);

    let stats = server.process();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.evicted, 1);
    assert!(bad.is_closed_by_server());
    assert!(!good.is_closed_by_server());
    assert_eq!(server.handler().disconnected.len(), 1);
    assert_eq!(server.handler().disconnected[0].index, 0);

    // No second disconnect for the same transition
    server.process();
    assert_eq!(server.handler().disconnected.len(), 1);

    good.send(&[0x02]);
    server.process();
    assert_eq!(server.handler().frames, vec![(4, 4, vec![0x01, 0x02])]);
}

// -----------------------------------------------------------------------
// 18. Streams that deliver less than they report
// -----------------------------------------------------------------------
#[test]
fn test_short_reads() {
    let (mut server, listener) = stream_server(1, 16);
    let peer = admitted(&mut server, &listener);
    peer.set_read_limit(Some(1));

    peer.send(&frame(1, 0, &[1, 2, 3]));
    peer.send(&frame(2, 0, &[4]));
    assert_eq!(server.process().frames, 2);
    assert_eq!(server.bytes_available(), 0);
}

// -----------------------------------------------------------------------
// 19. Accessors
// -----------------------------------------------------------------------
#[test]
fn test_accessors() {
    let (mut server, listener) = stream_server(4, 4 + 3 * 170);
    assert_eq!(server.client_capacity(), 4);
    assert_eq!(server.buffer_size(), 514);
    assert_eq!(server.buffer_size_in_pixels(), 170);
    assert_eq!(server.bytes_available(), 0);
    assert_eq!(server.slots().count(), 4);
    assert!(server.slots().all(|s| s.state == SlotState::Disconnected));

    let peer = admitted(&mut server, &listener);
    peer.send(&[0, 0, 0, 9, 1, 2, 3]);
    server.process();
    assert_eq!(server.bytes_available(), 0);
    assert_eq!(server.slots().next().unwrap().buffer_length, 7);
    assert!(listener.is_started());

    // Header-only buffer holds no pixels, inherent and trait views agree
    let (server, _listener) = stream_server(1, HEADER_SIZE);
    assert_eq!(server.buffer_size_in_pixels(), 0);
    assert_eq!(OpcService::buffer_size_in_pixels(&server), 0);
}

// -----------------------------------------------------------------------
// 20. Callbacks can be swapped between polls
// -----------------------------------------------------------------------
#[test]
fn test_swap_callbacks_at_runtime() {
    let listener = MemoryListener::new();
    let mut server = OpcServer::new(listener.clone(), 1, 10, Callbacks::new()).unwrap();
    server.begin().unwrap();

    let peer = listener.connect();
    server.process();

    // Default callbacks drop frames silently
    peer.send(&frame(1, 0, &[1]));
    assert_eq!(server.process().frames, 1);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    server
        .handler_mut()
        .set_frame_callback(move |f| sink.borrow_mut().push(f.data().to_vec()));

    peer.send(&frame(1, 0, &[2, 3]));
    server.process();
    assert_eq!(*seen.borrow(), vec![vec![2, 3]]);
}

// -----------------------------------------------------------------------
// 21. Idle polls do nothing
// -----------------------------------------------------------------------
#[test]
fn test_idle_poll() {
    let (mut server, _listener) = stream_server(2, 10);
    for _ in 0..3 {
        assert!(server.process().is_idle());
    }
    assert!(server.handler().connected.is_empty());
}

// -----------------------------------------------------------------------
// 22. Datagram: wrong size never reaches the handler
// -----------------------------------------------------------------------
#[test]
fn test_datagram_size_mismatch() {
    let listener = MemoryDatagramListener::new();
    let mut server =
        OpcDatagramServer::new(listener.clone(), 7890, 10, Recorder::default()).unwrap();
    server.begin().unwrap();
    assert_eq!(listener.port(), Some(7890));

    listener.send(&[1, 2, 0, 5, 1, 2, 3, 4, 5]);
    listener.send(&[1, 2, 0, 7, 1, 2, 3, 4, 5, 6, 7]);
    listener.send(&[]);

    for _ in 0..3 {
        assert_eq!(server.process().discarded, 1);
    }
    assert!(server.handler().frames.is_empty());
}

// -----------------------------------------------------------------------
// 23. Datagram: exact size dispatches once with buffer_size - 4 payload bytes
// -----------------------------------------------------------------------
#[test]
fn test_datagram_exact_size() {
    let listener = MemoryDatagramListener::new();
    let mut server =
        OpcDatagramServer::new(listener.clone(), 7890, 10, Recorder::default()).unwrap();
    server.begin().unwrap();

    listener.send(&[3, 0, 0, 6, 1, 2, 3, 4, 5, 6]);
    let stats = server.process();
    assert_eq!(stats.frames, 1);
    assert_eq!(server.handler().frames, vec![(3, 0, vec![1, 2, 3, 4, 5, 6])]);

    // Nothing carried over
    assert!(server.process().is_idle());
    assert_eq!(server.handler().frames.len(), 1);
}

// -----------------------------------------------------------------------
// 24. Datagram: one packet per poll, short reads discarded
// -----------------------------------------------------------------------
#[test]
fn test_datagram_one_per_poll_and_short_read() {
    let listener = MemoryDatagramListener::new();
    let mut server =
        OpcDatagramServer::new(listener.clone(), 7890, 6, Recorder::default()).unwrap();
    server.begin().unwrap();

    listener.send(&[1, 0, 0, 2, 0xA, 0xB]);
    listener.send(&[2, 0, 0, 2, 0xC, 0xD]);
    assert_eq!(server.process().frames, 1);
    assert_eq!(listener.queued(), 1);
    assert_eq!(server.process().frames, 1);

    listener.set_short_read(Some(5));
    listener.send(&[3, 0, 0, 2, 0xE, 0xF]);
    assert_eq!(server.process().discarded, 1);

    assert_eq!(
        server.handler().frames,
        vec![(1, 0, vec![0xA, 0xB]), (2, 0, vec![0xC, 0xD])]
    );
    assert_eq!(server.buffer_size(), 6);
}

// -----------------------------------------------------------------------
// 25. Both servers behind the common poll interface
// -----------------------------------------------------------------------
#[test]
fn test_services_share_poll_interface() {
    let stream_listener = MemoryListener::new();
    let datagram_listener = MemoryDatagramListener::new();

    let mut services: Vec<Box<dyn OpcService>> = vec![
        Box::new(OpcServer::new(stream_listener.clone(), 2, 10, NullHandler).unwrap()),
        Box::new(OpcDatagramServer::new(datagram_listener.clone(), 7890, 10, NullHandler).unwrap()),
    ];
    for service in services.iter_mut() {
        service.begin().unwrap();
        assert_eq!(service.buffer_size(), 10);
        assert_eq!(service.buffer_size_in_pixels(), 2);
    }

    let peer = stream_listener.connect();
    datagram_listener.send(&[0; 10]);

    let mut total = PollStats::default();
    for _ in 0..2 {
        for service in services.iter_mut() {
            total += service.process();
        }
    }
    peer.send(&frame(0, 0, &[1]));
    total.frames += services[0].process().frames;

    assert_eq!(total.admitted, 1);
    assert_eq!(total.frames, 2);
    assert_eq!(services[0].client_count(), 1);
    assert_eq!(services[1].client_count(), 0);
}
