// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the OPC server.

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OpcError>;

/// Errors produced by the OPC server.
#[derive(Debug, Error)]
pub enum OpcError {
    /// The listener could not be started.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header declared more payload than the slot buffer can hold.
    #[error("frame of {declared} bytes exceeds buffer capacity of {capacity} bytes")]
    FrameTooLarge { declared: usize, capacity: usize },

    /// Payload handed to the encoder does not fit the 16-bit length field.
    #[error("payload of {0} bytes does not fit a 16-bit length field")]
    PayloadTooLong(usize),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
