// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Ingot - reliable entry ingestion client
//!
//! Client half of a pipelined, length-prefixed ingestion protocol that
//! streams log-like entries from producers to a downstream indexer over a
//! single byte-stream connection (TCP or a Unix socket).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ingot::{EntryWriter, LogEntry, Result};
//!
//! fn main() -> Result<()> {
//!     let writer: EntryWriter<LogEntry, _> = EntryWriter::connect("indexer.local:4023")?;
//!
//!     let entry = LogEntry::new("10.0.0.7".parse().unwrap(), 1, b"hello".to_vec())?;
//!     writer.write(entry)?;
//!
//!     // On close, whatever the indexer never confirmed comes back for
//!     // re-delivery over the next connection.
//!     if let Err(e) = writer.close() {
//!         eprintln!("close: {e}; {} entries to re-drive", writer.outstanding().len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        EntryWriter                           |
//! |  one mutex: write buffer | ack reader | confirmation window  |
//! +--------------------------------------------------------------+
//! |                      Wire protocol                           |
//! |     NEW_ENTRY / FORCE_ACK out,  CONFIRM in (all LE)          |
//! +--------------------------------------------------------------+
//! |                       ByteStream                             |
//! |        TcpStream | UnixStream | boxed / mock streams         |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EntryWriter`] | Pipelined writer with a bounded in-flight window |
//! | [`Entry`] | Capability trait the writer requires from records |
//! | [`LogEntry`] | Stock timestamped, tagged record implementation |
//! | [`WriterConfig`] | Window size, ack timeout, strict-ack tuning |
//! | [`ByteStream`] | Blocking transport seam with deadline control |
//!
//! ## Delivery guarantees
//!
//! At-least-once within one connection: no confirmed entry is ever resent
//! and no unconfirmed entry is silently lost. Exactly-once across connection
//! failure is explicitly out of scope; callers re-drive
//! [`outstanding`](EntryWriter::outstanding) entries themselves.

pub mod entry;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod writer;

pub use entry::{decode_log_entry_header, Entry, LogEntry, LOG_ENTRY_HEADER_SIZE};
pub use error::{Error, Result};
pub use protocol::{SendId, ACK_SIZE, MAX_ENTRY_SIZE};
pub use transport::{BoxedByteStream, ByteStream};
pub use writer::{
    EntryWriter, WriterConfig, WriterStats, CLOSING_SERVICE_ACK_TIMEOUT, MAX_UNCONFIRMED_COUNT,
    MIN_UNCONFIRMED_COUNT, WRITE_BUFFER_SIZE,
};
