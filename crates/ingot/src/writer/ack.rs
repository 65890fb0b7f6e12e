// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffered ack reader.
//!
//! Confirms arrive as fixed 12-byte frames. Reads from the transport land in
//! a buffer sized for a full window of acks, so one blocking read typically
//! slurps every confirm the indexer has queued and later frames are decoded
//! without touching the socket.
//!
//! The stream may carry a small amount of garbage between frames (historical
//! indexer builds padded their ack batches). A frame whose leading word is
//! not the confirm magic is scanned for the magic anywhere inside the
//! 12-byte window; on a hit the reader pulls the few bytes still missing and
//! re-assembles the send id from the 8 bytes that follow the magic. At most
//! 8 bytes of leading garbage are tolerated per frame; a window with no
//! magic at all is dropped wholesale.

use std::io::{self, Read};

use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::{find_confirm_magic, SendId, ACK_SIZE, SEND_ID_SIZE};

/// Buffered reader and decoder for the confirm stream.
pub(crate) struct AckReader {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
    strict: bool,
    acks_decoded: u64,
    resyncs: u64,
    garbage_windows: u64,
}

impl AckReader {
    /// `capacity` is the transport read buffer size, normally
    /// `ACK_SIZE * max_unconfirmed`. `strict` turns unrecoverable garbage
    /// into a protocol error instead of skipping it.
    pub fn new(capacity: usize, strict: bool) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            strict,
            acks_decoded: 0,
            resyncs: 0,
            garbage_windows: 0,
        }
    }

    /// Bytes already pulled off the transport and not yet decoded.
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Confirm frames decoded so far.
    pub fn acks_decoded(&self) -> u64 {
        self.acks_decoded
    }

    /// Frames recovered by scanning past leading garbage.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Windows discarded because no magic was found.
    pub fn garbage_windows(&self) -> u64 {
        self.garbage_windows
    }

    /// Read one ack frame, blocking on the transport as needed.
    ///
    /// Returns `Ok(Some(id))` for a decoded confirm and `Ok(None)` when a
    /// garbled window was discarded (the caller just tries again). Reads
    /// honor whatever read deadline is currently set on the transport.
    pub fn read_confirm<S: Read>(&mut self, stream: &mut S) -> Result<Option<SendId>> {
        self.fill_to(stream, ACK_SIZE)?;

        // Room for a full frame plus up to 8 resync bytes.
        let mut frame = [0u8; ACK_SIZE + SEND_ID_SIZE];
        self.consume_into(&mut frame[..ACK_SIZE]);

        let offset = match find_confirm_magic(&frame[..ACK_SIZE]) {
            Some(offset) => offset,
            None => {
                self.garbage_windows += 1;
                if self.strict {
                    return Err(Error::Protocol("no confirm magic in ack stream"));
                }
                warn!(window = ACK_SIZE, "discarding garbled ack window");
                return Ok(None);
            }
        };

        if offset > 0 {
            // `offset` garbage bytes pushed the tail of the send id past the
            // window; pull exactly that many bytes to complete the frame.
            self.fill_to(stream, offset)?;
            self.consume_into(&mut frame[ACK_SIZE..ACK_SIZE + offset]);
            self.resyncs += 1;
        }

        let id_start = offset + 4;
        let mut raw = [0u8; SEND_ID_SIZE];
        raw.copy_from_slice(&frame[id_start..id_start + SEND_ID_SIZE]);
        self.acks_decoded += 1;
        Ok(Some(SendId::from_raw(u64::from_le_bytes(raw))))
    }

    /// Block until at least `target` bytes are buffered.
    fn fill_to<S: Read>(&mut self, stream: &mut S, target: usize) -> Result<()> {
        while self.buffered() < target {
            if self.end == self.buf.len() {
                self.compact();
            }
            let n = stream.read(&mut self.buf[self.end..])?;
            if n == 0 {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed while reading acks",
                )));
            }
            self.end += n;
        }
        Ok(())
    }

    fn consume_into(&mut self, dst: &mut [u8]) {
        let n = dst.len();
        dst.copy_from_slice(&self.buf[self.start..self.start + n]);
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    fn compact(&mut self) {
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }
}
