//! Long-poll sort exchange.
//!
//! Coordinator side of the causal-vector channel, one per client. Admission
//! appends framed dependency blocks to an active buffer; a flush hands the
//! buffer to the oldest parked poll. When no poll is parked the buffer waits
//! in a FIFO backlog, and when no data is waiting the poll parks instead.

use bytes::Bytes;
use shared_types::{DependencyEntry, SequenceNumber, SortBuffer, WireError};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// One parked long-poll waiting for the next flush.
#[derive(Debug)]
struct PollSlot {
    id: u64,
    reply: oneshot::Sender<Bytes>,
}

/// How a poll proceeds after checking for buffered data.
#[derive(Debug)]
pub enum PollWait {
    /// Data was waiting; reply immediately.
    Ready(Bytes),
    /// Nothing buffered; the receiver resolves when a flush claims the slot.
    /// The poller enforces its own deadline and simply drops the receiver
    /// on timeout; a dead slot is skipped at the next flush.
    Parked(oneshot::Receiver<Bytes>),
}

/// Per-client exchange state, guarded by the client lock.
#[derive(Debug, Default)]
pub struct SortExchange {
    /// Buffer admission blocks accumulate in.
    active: SortBuffer,
    /// Buffers that filled up or found no live slot, oldest first.
    backlog: VecDeque<Bytes>,
    /// Parked polls, oldest first.
    slots: VecDeque<PollSlot>,
    /// Slots parked since creation; ids for the logs.
    parked_total: u64,
}

impl SortExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one framed dependency block. A full active buffer rotates to
    /// the backlog and a fresh one takes the block.
    pub fn append_block(
        &mut self,
        owner: SequenceNumber,
        entries: &[DependencyEntry],
    ) -> Result<(), WireError> {
        if self.active.append(owner, entries).is_err() {
            let full = self.active.take();
            trace!(bytes = full.len(), "sort buffer rotated to backlog");
            self.backlog.push_back(full);
            self.active.append(owner, entries)?;
        }
        Ok(())
    }

    /// Hand accumulated payloads to parked polls, oldest data to oldest
    /// slot. Returns the number of payloads claimed; a payload that finds
    /// only dead slots goes back to the backlog front.
    pub fn flush(&mut self) -> usize {
        let mut claimed = 0;
        while !self.slots.is_empty() {
            let Some(payload) = self.next_payload() else {
                break;
            };
            match self.offer(payload) {
                None => claimed += 1,
                Some(rejected) => {
                    self.backlog.push_front(rejected);
                    break;
                }
            }
        }
        claimed
    }

    /// Answer a poll with waiting data, or park it.
    pub fn claim_or_park(&mut self) -> PollWait {
        if let Some(payload) = self.next_payload() {
            return PollWait::Ready(payload);
        }
        self.slots.retain(|slot| !slot.reply.is_closed());
        let (tx, rx) = oneshot::channel();
        self.parked_total += 1;
        let id = self.parked_total;
        self.slots.push_back(PollSlot { id, reply: tx });
        debug!(slot = id, parked = self.slots.len(), "poll parked");
        PollWait::Parked(rx)
    }

    /// Oldest unclaimed payload: backlog first, then the active buffer.
    fn next_payload(&mut self) -> Option<Bytes> {
        if let Some(payload) = self.backlog.pop_front() {
            return Some(payload);
        }
        if self.active.is_empty() {
            return None;
        }
        Some(self.active.take())
    }

    /// Send `payload` to the oldest live slot, skipping slots whose pollers
    /// already gave up. Returns the payload when every slot was dead.
    fn offer(&mut self, mut payload: Bytes) -> Option<Bytes> {
        while let Some(slot) = self.slots.pop_front() {
            match slot.reply.send(payload) {
                Ok(()) => {
                    trace!(slot = slot.id, "parked poll claimed");
                    return None;
                }
                Err(back) => {
                    trace!(slot = slot.id, "dead poll slot skipped");
                    payload = back;
                }
            }
        }
        Some(payload)
    }

    pub fn parked_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// True when neither the active buffer nor the backlog holds data.
    pub fn is_drained(&self) -> bool {
        self.active.is_empty() && self.backlog.is_empty()
    }
}
