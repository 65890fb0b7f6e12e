// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Confirmation buffer: the bounded window of in-flight entries.
//!
//! Every shipped entry is parked here, keyed by its send id, until the
//! indexer confirms it. The buffer is the writer's sole source of truth for
//! backpressure (a full buffer stalls writes) and for recovery (whatever is
//! left after close is what the caller must re-drive).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::SendId;

/// Bounded, ordered window of unconfirmed entries.
///
/// Records are held in strictly increasing send-id order; the writer assigns
/// ids under its lock, so ordering holds by construction.
pub(crate) struct ConfirmationBuffer<E> {
    records: VecDeque<(SendId, Arc<E>)>,
    capacity: usize,
}

impl<E> ConfirmationBuffer<E> {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "window capacity validated at construction");
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Park an entry under its send id. Fails when the window is full.
    pub fn add(&mut self, id: SendId, entry: Arc<E>) -> Result<()> {
        if self.records.len() >= self.capacity {
            return Err(Error::BufferFull);
        }
        debug_assert!(
            self.records.back().map_or(true, |&(last, _)| last < id),
            "send ids must be strictly increasing"
        );
        self.records.push_back((id, entry));
        Ok(())
    }

    /// Confirm the entry with send id `id`, removing it from the window.
    ///
    /// Acks are point-in-time, but a healthy indexer confirms in order. When
    /// `id` arrives while earlier entries are still pending, those earlier
    /// entries can no longer be confirmed on this stream; they are swept out
    /// of the window and returned so the caller can account for them.
    ///
    /// Fails with [`Error::EntryNotFound`] when `id` is not in the window;
    /// the window is left unchanged in that case.
    pub fn confirm(&mut self, id: SendId) -> Result<Vec<Arc<E>>> {
        // Records are sorted by id, so a binary search finds the match.
        let pos = self
            .records
            .binary_search_by(|&(rid, _)| rid.cmp(&id))
            .map_err(|_| Error::EntryNotFound(id))?;

        let mut swept: Vec<Arc<E>> = self
            .records
            .drain(..=pos)
            .map(|(_, entry)| entry)
            .collect();
        swept.pop(); // the confirmed entry itself is not "swept"
        Ok(swept)
    }

    /// Number of entries currently in flight.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Open slots before the window stalls writes.
    pub fn free(&self) -> usize {
        self.capacity - self.records.len()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// In-order snapshot of the entries still awaiting confirmation.
    pub fn outstanding(&self) -> Vec<Arc<E>> {
        self.records.iter().map(|(_, e)| Arc::clone(e)).collect()
    }
}
