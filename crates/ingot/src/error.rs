// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the ingot writer.

use std::io;

use thiserror::Error;

use crate::protocol::SendId;

/// Errors returned by ingot writer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction-time configuration (window bounds, timeouts).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying transport read/write/deadline failure.
    ///
    /// Use [`Error::is_timeout`] to distinguish deadline expiry from other
    /// transport faults.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The connection state or ack stream violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// Confirmation buffer add attempted while the window was full.
    #[error("confirmation buffer is full")]
    BufferFull,

    /// A confirm referenced a send id that is not in flight.
    #[error("no in-flight entry with send id {0}")]
    EntryNotFound(SendId),

    /// An ack drain finished with entries still unconfirmed.
    ///
    /// The writer stays usable; the caller may retry, or close and recover
    /// the survivors via `outstanding()`.
    #[error("{unconfirmed} entries still unconfirmed after ack drain")]
    AckIncomplete { unconfirmed: usize },

    /// Operation attempted on a writer that has been closed.
    #[error("writer is closed")]
    Closed,

    /// Destination buffer too small for header encoding.
    #[error("buffer too small for encoding")]
    BufferTooSmall,

    /// Entry payload exceeds the maximum allowed entry size.
    #[error("entry of {size} bytes exceeds the {max} byte limit")]
    EntryTooLarge { size: usize, max: usize },
}

impl Error {
    /// True when the underlying transport failure was a read or write
    /// deadline expiring.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport(e) => {
                matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
            }
            _ => false,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
