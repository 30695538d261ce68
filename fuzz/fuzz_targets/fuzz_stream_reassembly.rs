// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use opc_server::transport::memory::MemoryListener;
use opc_server::{Frame, OpcHandler, OpcServer};

#[derive(Default)]
struct Collect {
    capacity: usize,
    frames: Vec<(u8, u8, Vec<u8>)>,
}

impl OpcHandler for Collect {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        assert!(frame.len() + 4 <= self.capacity);
        self.frames
            .push((frame.channel(), frame.command(), frame.data().to_vec()));
    }
}

/// Feed `stream` in chunks of at most `max_chunk` bytes, one poll per chunk.
fn run(stream: &[u8], buffer_size: usize, max_chunk: usize) -> Vec<(u8, u8, Vec<u8>)> {
    let listener = MemoryListener::new();
    let handler = Collect {
        capacity: buffer_size,
        frames: Vec::new(),
    };
    let Ok(mut server) = OpcServer::new(listener.clone(), 1, buffer_size, handler) else {
        return Vec::new();
    };
    if server.begin().is_err() {
        return Vec::new();
    }
    let peer = listener.connect();
    server.process();

    for chunk in stream.chunks(max_chunk) {
        peer.send(chunk);
        server.process();
    }
    server.process();
    std::mem::take(&mut server.handler_mut().frames)
}

fuzz_target!(|data: &[u8]| {
    // [pixels][max_chunk][stream...]
    if data.len() < 2 {
        return;
    }
    let buffer_size = 4 + usize::from(data[0]) * 3;
    let max_chunk = usize::from(data[1]).max(1);
    let stream = &data[2..];

    // Chunking never changes what gets decoded
    let whole = run(stream, buffer_size, stream.len().max(1));
    let chunked = run(stream, buffer_size, max_chunk);
    assert_eq!(whole, chunked);
});
