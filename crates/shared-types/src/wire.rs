//! Causal-vector wire format.
//!
//! A sort payload is a sequence of length-framed blocks:
//!
//! ```text
//! +----------------+---------------------+----------------------------+
//! | length: u32 LE | owner txn: u64 LE   | entries: n x 24 bytes      |
//! +----------------+---------------------+----------------------------+
//!                   \------------- length = 8 + 24n ----------------/
//! ```
//!
//! Each entry is a 16-byte peer identifier followed by a u64 LE sequence
//! number. The same framing is used in both directions: coordinator blocks
//! riding a poll reply, and merged vectors riding the next poll query.

use crate::deps::DependencyEntry;
use crate::errors::WireError;
use crate::ids::{PeerId, SequenceNumber};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Capacity of an accumulation buffer, in bytes.
pub const SORT_BUFFER_CAPACITY: usize = 4096;

/// Bytes taken by the u32 length framing a block.
pub const FRAME_HEADER_LEN: usize = 4;

/// Bytes taken by the owner txn prefix inside a block.
pub const BLOCK_PREFIX_LEN: usize = 8;

/// Bytes taken by one `(peer, txn)` entry.
pub const ENTRY_LEN: usize = PeerId::LEN + 8;

/// One decoded block: the owning txn plus its entries in wire order.
///
/// Entries are deliberately *not* collapsed into a [`crate::DependencySet`]
/// here: the proxy-side merge resolves duplicates with its own tie-break and
/// must see every entry as transmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortRecord {
    pub owner: SequenceNumber,
    pub entries: Vec<DependencyEntry>,
}

/// Fixed-capacity accumulation buffer for framed dependency blocks.
///
/// The `pending` flag tracks whether a flush has been scheduled for the
/// buffer's current contents: it starts true (nothing scheduled), is cleared
/// by [`SortBuffer::mark_flush_scheduled`], and resets whenever the buffer is
/// drained. Callers use it to schedule at most one flush per fill.
#[derive(Debug)]
pub struct SortBuffer {
    buf: BytesMut,
    pending: bool,
}

impl Default for SortBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SortBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(SORT_BUFFER_CAPACITY),
            pending: true,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when no flush has been scheduled since the last drain.
    pub fn flush_pending(&self) -> bool {
        self.pending
    }

    /// Record that a flush has been scheduled. Returns true when this call
    /// did the scheduling, false when one was already pending.
    pub fn mark_flush_scheduled(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    /// Append one framed block. Fails with [`WireError::BufferFull`] when the
    /// block does not fit; the buffer is left untouched in that case.
    pub fn append(
        &mut self,
        owner: SequenceNumber,
        entries: &[DependencyEntry],
    ) -> Result<(), WireError> {
        let payload = BLOCK_PREFIX_LEN + ENTRY_LEN * entries.len();
        let needed = FRAME_HEADER_LEN + payload;
        if self.buf.len() + needed > SORT_BUFFER_CAPACITY {
            return Err(WireError::BufferFull {
                needed,
                available: SORT_BUFFER_CAPACITY - self.buf.len(),
            });
        }

        self.buf.put_u32_le(payload as u32);
        self.buf.put_u64_le(owner.value());
        for entry in entries {
            self.buf.put_slice(entry.peer.as_bytes());
            self.buf.put_u64_le(entry.txn.value());
        }
        Ok(())
    }

    /// Append an already-framed payload (a whole buffer produced elsewhere).
    pub fn append_raw(&mut self, payload: &[u8]) -> Result<(), WireError> {
        if self.buf.len() + payload.len() > SORT_BUFFER_CAPACITY {
            return Err(WireError::BufferFull {
                needed: payload.len(),
                available: SORT_BUFFER_CAPACITY - self.buf.len(),
            });
        }
        self.buf.put_slice(payload);
        Ok(())
    }

    /// Drain the buffer, returning its contents and resetting it to a fresh
    /// state (empty, flush pending again).
    pub fn take(&mut self) -> Bytes {
        self.pending = true;
        self.buf.split().freeze()
    }
}

/// Streaming reader over a buffer of framed blocks.
pub struct SortReader {
    buf: Bytes,
}

impl SortReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next block, or `Ok(None)` at a clean end of buffer.
    pub fn next_record(&mut self) -> Result<Option<SortRecord>, WireError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < FRAME_HEADER_LEN {
            return Err(WireError::Truncated {
                remaining: self.buf.len(),
                needed: FRAME_HEADER_LEN,
            });
        }
        let length = self.buf.get_u32_le();
        let payload = length as usize;
        if payload < BLOCK_PREFIX_LEN
            || (payload - BLOCK_PREFIX_LEN) % ENTRY_LEN != 0
        {
            return Err(WireError::BadBlockLength { length });
        }
        if self.buf.len() < payload {
            return Err(WireError::Truncated {
                remaining: self.buf.len(),
                needed: payload,
            });
        }

        let owner = SequenceNumber::new(self.buf.get_u64_le());
        let count = (payload - BLOCK_PREFIX_LEN) / ENTRY_LEN;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let mut peer = [0u8; PeerId::LEN];
            self.buf.copy_to_slice(&mut peer);
            let txn = SequenceNumber::new(self.buf.get_u64_le());
            entries.push(DependencyEntry {
                peer: PeerId::from_bytes(peer),
                txn,
            });
        }
        Ok(Some(SortRecord { owner, entries }))
    }
}
