// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server configuration.
//!
//! Supports both programmatic and TOML file-based configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::header::{HEADER_SIZE, MAX_DATA_LEN};
use crate::{BYTES_PER_PIXEL, DEFAULT_PORT};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which transport the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connection-oriented clients sharing a fixed slot pool.
    #[default]
    Tcp,
    /// One frame per datagram, no client state.
    Udp,
}

/// OPC server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port (default: 7890)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport to listen on
    #[serde(default)]
    pub transport: TransportKind,

    /// Number of client slots in the pool (TCP only)
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Per-client buffer size: header plus largest expected payload.
    /// In UDP mode this is also the only accepted datagram size.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Sleep between poll cycles when driven by the CLI (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_clients() -> usize {
    4
}

fn default_buffer_size() -> usize {
    // 512 RGB pixels
    HEADER_SIZE + 512 * BYTES_PER_PIXEL
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for OpcServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            transport: TransportKind::default(),
            max_clients: default_max_clients(),
            buffer_size: default_buffer_size(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl OpcServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Buffer sized for `pixels` RGB pixels.
    pub fn with_pixels(mut self, pixels: usize) -> Self {
        // Saturate so oversized requests fail validate() instead of overflowing
        self.buffer_size = pixels
            .saturating_mul(BYTES_PER_PIXEL)
            .saturating_add(HEADER_SIZE);
        self
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be > 0".into()));
        }
        if self.max_clients > u8::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_clients must be <= {}",
                u8::MAX
            )));
        }
        if self.buffer_size < HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must be >= {} (header size)",
                HEADER_SIZE
            )));
        }
        if self.buffer_size > HEADER_SIZE + MAX_DATA_LEN {
            return Err(ConfigError::Invalid(format!(
                "buffer_size must be <= {} (largest frame)",
                HEADER_SIZE + MAX_DATA_LEN
            )));
        }
        Ok(())
    }
}
