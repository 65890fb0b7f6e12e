// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport abstraction for the ingest connection.
//!
//! The writer owns exactly one already-connected byte stream for its whole
//! life. [`ByteStream`] is the seam that lets that stream be a TCP socket, a
//! Unix domain socket, a future TLS wrapper, or a mock in tests.

mod byte_stream;

pub use byte_stream::{BoxedByteStream, ByteStream};

#[cfg(test)]
pub(crate) use byte_stream::mock;
