//! Executor that records dispatch order for assertions.

use async_trait::async_trait;
use cw_ordering::{ExecutionError, Operation, OperationExecutor};
use parking_lot::Mutex;
use shared_types::PeerId;
use std::time::Duration;

/// What the executor saw, in log order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Start,
    Finish,
}

/// Logs a Start and a Finish event per operation, optionally stalling
/// between them to widen overlap windows.
#[derive(Default)]
pub struct EventLogExecutor {
    log: Mutex<Vec<(Event, PeerId, u64)>>,
    pub delay: Option<Duration>,
}

impl EventLogExecutor {
    pub fn events(&self) -> Vec<(Event, PeerId, u64)> {
        self.log.lock().clone()
    }

    /// Txns one peer finished, in completion order.
    pub fn finished(&self, peer: PeerId) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|&(event, p, _)| event == Event::Finish && p == peer)
            .map(|(_, _, txn)| txn)
            .collect()
    }

    /// Finish events across all peers, in completion order.
    pub fn finish_order(&self) -> Vec<(PeerId, u64)> {
        self.events()
            .into_iter()
            .filter(|&(event, _, _)| event == Event::Finish)
            .map(|(_, peer, txn)| (peer, txn))
            .collect()
    }

    /// Index of one event in the log.
    pub fn position(&self, event: Event, peer: PeerId, txn: u64) -> Option<usize> {
        self.events()
            .iter()
            .position(|&logged| logged == (event, peer, txn))
    }
}

#[async_trait]
impl OperationExecutor for EventLogExecutor {
    async fn execute(&self, op: &Operation) -> Result<(), ExecutionError> {
        self.log
            .lock()
            .push((Event::Start, op.peer, op.txn.value()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log
            .lock()
            .push((Event::Finish, op.peer, op.txn.value()));
        Ok(())
    }
}
