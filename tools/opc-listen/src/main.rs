// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Open Pixel Control receiver CLI
//!
//! Listens for OPC clients and logs every frame received, or sends test
//! frames to another OPC receiver.
//!
//! # Usage
//!
//! ```bash
//! # TCP server on 0.0.0.0:7890, 4 clients, 512 pixels each
//! opc-listen
//!
//! # UDP receiver for 170-pixel frames
//! opc-listen --transport udp --pixels 170
//!
//! # Using configuration file
//! opc-listen --config opc.toml
//!
//! # Send 100 test frames, split into 7-byte writes
//! opc-listen send 127.0.0.1:7890 --pixels 64 --count 100 --chunk 7
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use opc_server::{
    encode_frame, Frame, OpcDatagramServer, OpcHandler, OpcServer, OpcServerConfig, OpcService,
    PollStats, SlotInfo, TcpStreamListener, TransportKind, UdpDatagramListener, BYTES_PER_PIXEL,
};
use std::cell::Cell;
use std::io::Write;
use std::net::{IpAddr, SocketAddr, TcpStream, UdpSocket};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Open Pixel Control frame receiver
#[derive(Parser, Debug)]
#[command(name = "opc-listen")]
#[command(about = "Open Pixel Control receiver - log incoming frames or send test frames")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, conflicts_with = "config")]
    bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, conflicts_with = "config")]
    port: Option<u16>,

    /// Transport to listen on
    #[arg(short, long, value_enum, conflicts_with = "config")]
    transport: Option<TransportArg>,

    /// Maximum simultaneous TCP clients
    #[arg(long, conflicts_with = "config")]
    clients: Option<usize>,

    /// Per-client buffer size in bytes (header included)
    #[arg(long, conflicts_with_all = ["config", "pixels"])]
    buffer_size: Option<usize>,

    /// Per-client buffer size in RGB pixels
    #[arg(long, conflicts_with = "config")]
    pixels: Option<usize>,

    /// Sleep between idle polls (milliseconds)
    #[arg(long, conflicts_with = "config")]
    poll_interval: Option<u64>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "10")]
    stats_interval: u64,

    /// Log the first payload bytes of every frame
    #[arg(long)]
    dump: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send test frames to an OPC receiver
    Send {
        /// Receiver address
        target: SocketAddr,

        /// Transport to send over
        #[arg(short, long, value_enum, default_value = "tcp")]
        transport: TransportArg,

        /// Channel byte
        #[arg(long, default_value = "0")]
        channel: u8,

        /// Command byte
        #[arg(long, default_value = "0")]
        command: u8,

        /// Pixels per frame
        #[arg(long, default_value = "512")]
        pixels: usize,

        /// Number of frames to send
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Delay between frames (milliseconds)
        #[arg(long, default_value = "20")]
        interval: u64,

        /// Split each TCP frame into writes of this many bytes
        #[arg(long)]
        chunk: Option<usize>,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "opc.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Tcp,
    Udp,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Tcp => TransportKind::Tcp,
            TransportArg::Udp => TransportKind::Udp,
        }
    }
}

/// Handler that logs frames and connection events.
struct FrameLogger {
    dump: bool,
    bytes: Rc<Cell<u64>>,
}

impl OpcHandler for FrameLogger {
    fn on_frame(&mut self, frame: &Frame<'_>) {
        self.bytes.set(self.bytes.get() + frame.len() as u64);
        if self.dump {
            let preview = &frame.data()[..frame.len().min(12)];
            tracing::info!(
                "frame ch={} cmd={} len={} data={:02x?}{}",
                frame.channel(),
                frame.command(),
                frame.len(),
                preview,
                if frame.len() > preview.len() { "..." } else { "" }
            );
        } else {
            tracing::debug!(
                "frame ch={} cmd={} len={}",
                frame.channel(),
                frame.command(),
                frame.len()
            );
        }
    }

    fn on_client_connected(&mut self, remote: Option<SocketAddr>) {
        match remote {
            Some(addr) => tracing::info!("Client connected from {}", addr),
            None => tracing::info!("Client connected"),
        }
    }

    fn on_client_disconnected(&mut self, slot: &SlotInfo) {
        tracing::info!(
            "Client {:?} disconnected (slot {}, {} bytes of partial frame dropped)",
            slot.remote_addr,
            slot.index,
            slot.buffer_length
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Handle subcommands
    if let Some(cmd) = args.command.take() {
        return match cmd {
            Commands::Send {
                target,
                transport,
                channel,
                command,
                pixels,
                count,
                interval,
                chunk,
            } => {
                let frames = TestFrames {
                    channel,
                    command,
                    pixels,
                    count,
                    interval: Duration::from_millis(interval),
                };
                match transport {
                    TransportArg::Tcp => cmd_send_tcp(target, &frames, chunk),
                    TransportArg::Udp => cmd_send_udp(target, &frames),
                }
            }
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    serve(&config, args.dump, args.stats_interval)
}

fn build_config(args: &Args) -> Result<OpcServerConfig, opc_server::ConfigError> {
    // Load from file if specified
    if let Some(ref config_path) = args.config {
        return OpcServerConfig::from_file(config_path);
    }

    let mut config = OpcServerConfig::default();
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(transport) = args.transport {
        config.transport = transport.into();
    }
    if let Some(clients) = args.clients {
        config.max_clients = clients;
    }
    if let Some(pixels) = args.pixels {
        config = config.with_pixels(pixels);
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = buffer_size;
    }
    if let Some(poll_interval) = args.poll_interval {
        config.poll_interval_ms = poll_interval;
    }
    config.validate()?;
    Ok(config)
}

fn serve(
    config: &OpcServerConfig,
    dump: bool,
    stats_interval: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = Rc::new(Cell::new(0u64));
    let handler = FrameLogger {
        dump,
        bytes: Rc::clone(&bytes),
    };

    let mut service: Box<dyn OpcService> = match config.transport {
        TransportKind::Tcp => Box::new(OpcServer::from_config(
            TcpStreamListener::new(config.listen_addr()),
            config,
            handler,
        )?),
        TransportKind::Udp => Box::new(OpcDatagramServer::from_config(
            UdpDatagramListener::new(config.bind_address),
            config,
            handler,
        )?),
    };
    service.begin()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    println!("OPC Listener v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    println!("Listening: {:?} {}", config.transport, config.listen_addr());
    println!(
        "Buffer:    {} bytes ({} pixels)",
        service.buffer_size(),
        service.buffer_size_in_pixels()
    );
    if config.transport == TransportKind::Tcp {
        println!("Clients:   {}", config.max_clients);
    }
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let idle_sleep = config.poll_interval();
    let report_every = Duration::from_secs(stats_interval);
    let started = Instant::now();
    let mut last_report = started;
    let mut totals = PollStats::default();

    while running.load(Ordering::SeqCst) {
        let stats = service.process();
        if stats.is_idle() {
            thread::sleep(idle_sleep);
        }
        totals += stats;

        if stats_interval > 0 && last_report.elapsed() >= report_every {
            print_stats(&totals, bytes.get(), service.client_count(), started);
            last_report = Instant::now();
        }
    }

    println!("\nShutting down...");
    println!("\nFinal Statistics:");
    print_stats(&totals, bytes.get(), service.client_count(), started);
    Ok(())
}

fn print_stats(totals: &PollStats, bytes: u64, clients: usize, started: Instant) {
    let secs = started.elapsed().as_secs_f64().max(f64::EPSILON);
    println!("--- Statistics ---");
    println!(
        "  {} frames ({:.1} frames/s), {}, {} clients",
        totals.frames,
        totals.frames as f64 / secs,
        format_bytes(bytes),
        clients
    );
    println!(
        "  admitted {}, refused {}, evicted {}, discarded {}, errors {}",
        totals.admitted, totals.refused, totals.evicted, totals.discarded, totals.errors
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Parameters of a test frame sequence.
struct TestFrames {
    channel: u8,
    command: u8,
    pixels: usize,
    count: u32,
    interval: Duration,
}

impl TestFrames {
    /// Encoded frame `n`: a color ramp that shifts by one pixel per frame.
    fn encode(&self, n: u32) -> Result<Vec<u8>, opc_server::OpcError> {
        let mut data = Vec::with_capacity(self.pixels * BYTES_PER_PIXEL);
        for i in 0..self.pixels {
            let step = (i as u32).wrapping_add(n);
            data.push((step.wrapping_mul(7) & 0xFF) as u8);
            data.push((step.wrapping_mul(13) & 0xFF) as u8);
            data.push((step.wrapping_mul(29) & 0xFF) as u8);
        }
        encode_frame(self.channel, self.command, &data)
    }
}

fn cmd_send_tcp(
    target: SocketAddr,
    frames: &TestFrames,
    chunk: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(target)?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to {}", target);

    let chunk = chunk.unwrap_or(usize::MAX).max(1);
    for n in 0..frames.count {
        let bytes = frames.encode(n)?;
        for part in bytes.chunks(chunk.min(bytes.len()).max(1)) {
            stream.write_all(part)?;
            stream.flush()?;
        }
        tracing::debug!("Sent frame {} ({} bytes)", n, bytes.len());
        if n + 1 < frames.count {
            thread::sleep(frames.interval);
        }
    }

    println!("Sent {} frames to {}", frames.count, target);
    Ok(())
}

fn cmd_send_udp(target: SocketAddr, frames: &TestFrames) -> Result<(), Box<dyn std::error::Error>> {
    let bind: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind)?;

    for n in 0..frames.count {
        let bytes = frames.encode(n)?;
        socket.send_to(&bytes, target)?;
        tracing::debug!("Sent datagram {} ({} bytes)", n, bytes.len());
        if n + 1 < frames.count {
            thread::sleep(frames.interval);
        }
    }

    println!("Sent {} datagrams to {}", frames.count, target);
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = OpcServerConfig::default();
    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# OPC Listener Configuration
# Generated by opc-listen gen-config
#
# transport:   "tcp" (reassembling, up to max_clients) or "udp" (one frame per datagram)
# buffer_size: header (4 bytes) + largest payload; UDP accepts only datagrams of exactly this size

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match OpcServerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen:    {:?} {}", config.transport, config.listen_addr());
            println!(
                "Buffer:    {} bytes ({} pixels)",
                config.buffer_size,
                (config.buffer_size - opc_server::HEADER_SIZE) / BYTES_PER_PIXEL
            );
            println!("Clients:   {}", config.max_clients);
            println!("Poll:      {} ms", config.poll_interval_ms);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
