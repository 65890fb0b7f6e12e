// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry writer: the client half of the ingest protocol.
//!
//! ## Overview
//!
//! An [`EntryWriter`] owns one connected byte stream to an indexer and
//! pipelines entries over it. Each entry is framed with a monotonically
//! increasing send id and parked in a bounded confirmation window until the
//! indexer confirms it. Confirms are consumed opportunistically on every
//! write, so a healthy session never stalls; when the window does fill, the
//! writer blocks on ack servicing until a slot opens.
//!
//! ```text
//! Writer                                   Indexer
//!   |                                         |
//!   |--- NEW_ENTRY (id=1) ------------------->|
//!   |--- NEW_ENTRY (id=2) ------------------->|
//!   |--- NEW_ENTRY (id=3) ------------------->|
//!   |<-- CONFIRM (id=1) ----------------------|
//!   |<-- CONFIRM (id=2) ----------------------|
//!   |--- FORCE_ACK -------------------------->|   (close / drain)
//!   |<-- CONFIRM (id=3) ----------------------|
//! ```
//!
//! Delivery is at-least-once within a connection: a confirmed entry is never
//! resent, and an unconfirmed entry is never silently lost. After [`close`],
//! [`outstanding`] returns every entry the indexer did not confirm so the
//! caller can re-drive them over a fresh connection.
//!
//! ## Concurrency
//!
//! The writer is not internally parallel. One mutex serializes every public
//! operation, protecting the transport, both buffered adapters, the
//! confirmation window, and the send-id counter. Multiple producer threads
//! may share an `EntryWriter`; their calls simply serialize. Entries go out
//! in the order calls win the lock.
//!
//! Only the force-ack and close drains apply a read deadline
//! ([`WriterConfig::ack_timeout`], default 1 s). Write paths have no
//! internal timeout; backpressure comes from transport write blocking and
//! from the confirmation window.
//!
//! [`close`]: EntryWriter::close
//! [`outstanding`]: EntryWriter::outstanding

mod ack;
mod buffer;
mod confirmation;


use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::protocol::{self, SendId, ACK_SIZE};
use crate::transport::ByteStream;

use ack::AckReader;
use buffer::WriteBuffer;
use confirmation::ConfirmationBuffer;

/// Capacity of the buffered write adapter (4 MiB).
pub const WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Smallest allowed confirmation window.
pub const MIN_UNCONFIRMED_COUNT: usize = 64;

/// Largest (and default) confirmation window.
pub const MAX_UNCONFIRMED_COUNT: usize = 4 * 1024;

/// Default read deadline for the force-ack and close drains.
pub const CLOSING_SERVICE_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Construction-time tuning for an [`EntryWriter`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    max_unconfirmed: usize,
    ack_timeout: Duration,
    strict_acks: bool,
}

impl WriterConfig {
    pub fn new() -> Self {
        Self {
            max_unconfirmed: MAX_UNCONFIRMED_COUNT,
            ack_timeout: CLOSING_SERVICE_ACK_TIMEOUT,
            strict_acks: false,
        }
    }

    /// Size of the confirmation window, between [`MIN_UNCONFIRMED_COUNT`]
    /// and [`MAX_UNCONFIRMED_COUNT`].
    pub fn max_unconfirmed(mut self, max_unconfirmed: usize) -> Self {
        self.max_unconfirmed = max_unconfirmed;
        self
    }

    /// Read deadline applied while draining acks on force-ack and close.
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Treat an ack window with no recoverable confirm magic as a protocol
    /// error instead of skipping it.
    pub fn strict_acks(mut self, strict_acks: bool) -> Self {
        self.strict_acks = strict_acks;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_unconfirmed < MIN_UNCONFIRMED_COUNT
            || self.max_unconfirmed > MAX_UNCONFIRMED_COUNT
        {
            return Err(Error::Config(format!(
                "max_unconfirmed {} outside {}..={}",
                self.max_unconfirmed, MIN_UNCONFIRMED_COUNT, MAX_UNCONFIRMED_COUNT
            )));
        }
        if self.ack_timeout.is_zero() {
            return Err(Error::Config("ack_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of writer activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Entries framed and handed to the transport.
    pub entries_written: u64,
    /// Confirms matched against an in-flight entry.
    pub acks_confirmed: u64,
    /// Entries dropped because a later confirm swept past them.
    pub entries_swept: u64,
    /// Confirms for ids not in the window (ignored).
    pub unknown_acks: u64,
    /// Force-ack frames sent.
    pub force_acks_sent: u64,
    /// Confirms recovered by scanning past garbage.
    pub ack_resyncs: u64,
    /// Ack windows discarded with no recoverable magic.
    pub garbage_windows: u64,
}

struct Inner<E: Entry, S: ByteStream> {
    stream: S,
    wbuf: WriteBuffer,
    acks: AckReader,
    pending: ConfirmationBuffer<E>,
    next_id: SendId,
    scratch: Box<[u8]>,
    hot: bool,
    ack_timeout: Duration,
    entries_written: u64,
    acks_confirmed: u64,
    entries_swept: u64,
    unknown_acks: u64,
    force_acks_sent: u64,
}

/// Reliable, pipelined writer for entries of type `E` over stream `S`.
///
/// See the [module documentation](self) for the protocol and concurrency
/// model. Entries are handed over as `Arc<E>`; the writer keeps its clone
/// until the entry is confirmed or surfaced via [`outstanding`], and the
/// shared ownership is what guarantees the bytes cannot change out from
/// under an eventual resend.
///
/// [`outstanding`]: EntryWriter::outstanding
pub struct EntryWriter<E: Entry, S: ByteStream> {
    inner: Mutex<Inner<E, S>>,
}

impl<E: Entry> EntryWriter<E, TcpStream> {
    /// Connect to an indexer over TCP and wrap the socket in a writer.
    ///
    /// Nagle's algorithm is disabled so force-ack frames and sync flushes
    /// leave immediately.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Self::new(stream)
    }
}

impl<E: Entry, S: ByteStream> EntryWriter<E, S> {
    /// Wrap an already-connected stream with default configuration.
    pub fn new(stream: S) -> Result<Self> {
        Self::with_config(stream, WriterConfig::default())
    }

    /// Wrap an already-connected stream.
    pub fn with_config(stream: S, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                stream,
                wbuf: WriteBuffer::with_capacity(WRITE_BUFFER_SIZE),
                acks: AckReader::new(ACK_SIZE * config.max_unconfirmed, config.strict_acks),
                pending: ConfirmationBuffer::new(config.max_unconfirmed),
                next_id: SendId::FIRST,
                scratch: vec![0u8; protocol::frame_header_size::<E>()].into_boxed_slice(),
                hot: true,
                ack_timeout: config.ack_timeout,
                entries_written: 0,
                acks_confirmed: 0,
                entries_swept: 0,
                unknown_acks: 0,
                force_acks_sent: 0,
            }),
        })
    }

    /// Ship an entry without forcing a transport flush.
    ///
    /// Output may sit in the write buffer until it fills
    /// ([`WRITE_BUFFER_SIZE`]), a sync variant flushes, or acks are serviced
    /// in blocking mode. Blocks only when the confirmation window is full.
    ///
    /// The writer holds a reference to the entry until it is confirmed or
    /// recovered through [`outstanding`](Self::outstanding); callers must
    /// not construct entries whose bytes can change afterwards.
    pub fn write(&self, entry: impl Into<Arc<E>>) -> Result<()> {
        self.write_flush(entry.into(), false).map(|_| ())
    }

    /// Ship an entry and flush the transport before returning.
    pub fn write_sync(&self, entry: impl Into<Arc<E>>) -> Result<()> {
        self.write_flush(entry.into(), true).map(|_| ())
    }

    /// Like [`write_sync`](Self::write_sync), additionally reporting whether
    /// this call flushed the transport.
    ///
    /// A muxer spreading load across several indexers uses the flag to
    /// decide when to rotate to the next connection.
    pub fn write_with_hint(&self, entry: impl Into<Arc<E>>) -> Result<bool> {
        self.write_flush(entry.into(), true)
    }

    fn write_flush(&self, entry: Arc<E>, flush: bool) -> Result<bool> {
        let mut inner = self.lock_hot()?;
        let blocking = inner.pending.is_full();
        inner.service_acks(blocking)?;
        inner.write_entry(entry, flush)
    }

    /// Ship a batch of entries under one lock acquisition, with no per-entry
    /// flush.
    ///
    /// On error the batch has made partial progress: entries up to the
    /// failing one are in the confirmation window and will be drained or
    /// recovered like any other write.
    pub fn write_batch(&self, entries: &[Arc<E>]) -> Result<()> {
        let mut inner = self.lock_hot()?;
        for entry in entries {
            inner.write_entry(Arc::clone(entry), false)?;
        }
        Ok(())
    }

    /// Block until at least one ack has been serviced.
    ///
    /// No-op when nothing is outstanding.
    pub fn ack(&self) -> Result<()> {
        let mut inner = self.lock_hot()?;
        if inner.pending.count() == 0 {
            return Ok(());
        }
        inner.service_acks(true)
    }

    /// Demand confirmation of everything in flight and drain until the
    /// window empties.
    ///
    /// Each blocking read is bounded by the ack timeout; on expiry the call
    /// fails with [`Error::AckIncomplete`] and the writer stays usable.
    pub fn force_ack(&self) -> Result<()> {
        self.lock_hot()?.force_ack()
    }

    /// Open window slots before a write must service acks.
    ///
    /// Used by muxing producers to size how much they can ship before
    /// moving on.
    pub fn open_slots(&self) -> Result<usize> {
        Ok(self.lock_hot()?.pending.free())
    }

    /// Recommended batch size for [`write_batch`](Self::write_batch): the
    /// capacity of the confirmation window.
    pub fn optimal_batch_write_size(&self) -> usize {
        self.inner.lock().pending.capacity()
    }

    /// Replace the read deadline used by the force-ack and close drains.
    pub fn override_ack_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(Error::Config("ack_timeout must be non-zero".to_string()));
        }
        self.lock_hot()?.ack_timeout = timeout;
        Ok(())
    }

    /// Force-ack outstanding entries (best effort), then tear the
    /// connection down.
    ///
    /// Close is terminal: every later operation fails with
    /// [`Error::Closed`]. Whatever the drain could not confirm is available
    /// through [`outstanding`](Self::outstanding) afterwards, and the first
    /// drain error (if any) is returned once teardown is complete.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.hot {
            return Err(Error::Closed);
        }

        let drained = inner.force_ack();
        if let Err(ref e) = drained {
            debug!(error = %e, "close drain left entries unconfirmed");
        }

        if let Err(e) = inner.stream.shutdown() {
            trace!(error = %e, "transport shutdown failed");
        }
        inner.hot = false;
        drained
    }

    /// In-order snapshot of the entries not yet confirmed.
    ///
    /// After [`close`](Self::close) this is exactly the set the caller must
    /// re-drive over a new connection.
    pub fn outstanding(&self) -> Vec<Arc<E>> {
        self.inner.lock().pending.outstanding()
    }

    /// True until [`close`](Self::close) completes.
    pub fn is_hot(&self) -> bool {
        self.inner.lock().hot
    }

    /// Snapshot of the writer's activity counters.
    pub fn stats(&self) -> WriterStats {
        let inner = self.inner.lock();
        WriterStats {
            entries_written: inner.entries_written,
            acks_confirmed: inner.acks_confirmed,
            entries_swept: inner.entries_swept,
            unknown_acks: inner.unknown_acks,
            force_acks_sent: inner.force_acks_sent,
            ack_resyncs: inner.acks.resyncs(),
            garbage_windows: inner.acks.garbage_windows(),
        }
    }

    fn lock_hot(&self) -> Result<MutexGuard<'_, Inner<E, S>>> {
        let inner = self.inner.lock();
        if !inner.hot {
            return Err(Error::Closed);
        }
        Ok(inner)
    }
}

impl<E: Entry, S: ByteStream> Inner<E, S> {
    /// Frame one entry and push it through the write buffer.
    ///
    /// Returns whether this call flushed the transport (the pre-payload
    /// spill for oversized payloads, or the requested sync flush).
    fn write_entry(&mut self, entry: Arc<E>, flush: bool) -> Result<bool> {
        if self.pending.is_full() {
            self.wbuf.flush(&mut self.stream)?;
            self.service_acks(true)?;
        }

        // Reusing one scratch header across writes is safe: the lock
        // serializes every caller that can touch it.
        protocol::encode_entry_header(entry.as_ref(), self.next_id, &mut self.scratch)?;
        self.wbuf.write_all(&mut self.stream, &self.scratch)?;

        let mut flushed = false;
        if entry.data().len() > self.wbuf.available() {
            // Flush the header out so the payload streams straight to the
            // transport instead of being copied through the buffer.
            flushed = true;
            self.wbuf.flush(&mut self.stream)?;
        }
        self.wbuf.write_all(&mut self.stream, entry.data())?;

        if flush {
            flushed = true;
            self.wbuf.flush(&mut self.stream)?;
        }

        self.pending.add(self.next_id, entry)?;
        trace!(id = %self.next_id, "entry framed");
        self.next_id = self.next_id.next();
        self.entries_written += 1;
        Ok(flushed)
    }

    /// Consume confirms from the transport.
    ///
    /// Non-blocking mode only decodes frames already buffered. Blocking
    /// mode first flushes pending output (the indexer cannot confirm what it
    /// has not seen) and then reads until one ack has been serviced. If the
    /// window is still full afterwards the indexer is told to flush its ack
    /// batch, and a window that stays full even then is a protocol fault.
    fn service_acks(&mut self, blocking: bool) -> Result<()> {
        if blocking && self.wbuf.buffered() > 0 {
            self.wbuf.flush(&mut self.stream)?;
        }
        self.read_acks(blocking)?;

        if self.pending.is_full() {
            self.send_force_ack()?;
            self.read_acks(true)?;
            if self.pending.is_full() {
                return Err(Error::Protocol(
                    "confirmation window still full after forced ack sync",
                ));
            }
        }
        Ok(())
    }

    fn read_acks(&mut self, mut blocking: bool) -> Result<()> {
        while self.pending.count() > 0 && (self.acks.buffered() >= ACK_SIZE || blocking) {
            let id = match self.acks.read_confirm(&mut self.stream)? {
                Some(id) => id,
                // Garbled window discarded; keep reading.
                None => continue,
            };

            match self.pending.confirm(id) {
                Ok(swept) => {
                    self.acks_confirmed += 1;
                    if !swept.is_empty() {
                        self.entries_swept += swept.len() as u64;
                        warn!(
                            id = %id,
                            swept = swept.len(),
                            "confirm skipped past unacknowledged entries; dropping them"
                        );
                    }
                }
                Err(Error::EntryNotFound(_)) => {
                    // Stale or duplicate confirm. Harmless, but worth a
                    // trace for the counter-watchers.
                    self.unknown_acks += 1;
                    debug!(id = %id, "ignoring confirm for unknown send id");
                }
                Err(e) => return Err(e),
            }

            // One ack serviced; anything further comes from the buffer only.
            blocking = false;
        }
        Ok(())
    }

    fn send_force_ack(&mut self) -> Result<()> {
        let frame = protocol::encode_force_ack();
        self.wbuf.write_all(&mut self.stream, &frame)?;
        self.wbuf.flush(&mut self.stream)?;
        self.force_acks_sent += 1;
        Ok(())
    }

    fn force_ack(&mut self) -> Result<()> {
        self.send_force_ack()?;

        while self.pending.count() > 0 {
            self.stream.set_read_timeout(Some(self.ack_timeout))?;
            let drained = self.read_acks(true);
            if let Err(e) = self.stream.set_read_timeout(None) {
                trace!(error = %e, "failed to clear read deadline");
            }
            match drained {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    return Err(Error::AckIncomplete {
                        unconfirmed: self.pending.count(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
