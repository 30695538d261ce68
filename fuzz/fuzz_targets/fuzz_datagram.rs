// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use opc_server::transport::memory::MemoryDatagramListener;
use opc_server::{Callbacks, OpcDatagramServer};

fuzz_target!(|data: &[u8]| {
    // [buffer_size][datagram...]
    let Some((&size, packet)) = data.split_first() else {
        return;
    };
    let buffer_size = usize::from(size).max(4);

    let listener = MemoryDatagramListener::new();
    let expected = buffer_size - 4;
    let handler = Callbacks::new().with_frame(move |frame| assert_eq!(frame.len(), expected));
    let Ok(mut server) = OpcDatagramServer::new(listener.clone(), 7890, buffer_size, handler)
    else {
        return;
    };
    if server.begin().is_err() {
        return;
    }

    listener.send(packet);
    let stats = server.process();
    assert_eq!(stats.frames, usize::from(packet.len() == buffer_size));
    assert_eq!(stats.frames + stats.discarded, 1);
});
