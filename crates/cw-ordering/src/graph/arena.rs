//! Slab storage for resource links.
//!
//! Links are dense per chain and churn constantly, so each chain owns a
//! small free-list arena instead of boxing every node. [`LinkId`] values are
//! only meaningful within the arena that issued them.

use crate::domain::request::Request;
use std::sync::Arc;

/// Index of a link within one chain's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkId(pub u32);

/// Traversal bookkeeping for the cycle scan, tagged by scan id so a new
/// scan never has to clear the previous one's marks.
#[derive(Debug, Default)]
pub struct ScanState {
    pub scan_id: u64,
    pub index: u32,
    pub lowlink: u32,
    pub on_stack: bool,
}

/// One request's membership in one resource chain.
#[derive(Debug)]
pub struct LinkRecord {
    pub request: Arc<Request>,
    /// Which of the request's resource slots this link occupies.
    pub slot: usize,
    pub scan: ScanState,
}

#[derive(Debug, Default)]
pub struct LinkArena {
    records: Vec<Option<LinkRecord>>,
    free: Vec<u32>,
}

impl LinkArena {
    pub fn alloc(&mut self, request: Arc<Request>, slot: usize) -> LinkId {
        let record = LinkRecord {
            request,
            slot,
            scan: ScanState::default(),
        };
        match self.free.pop() {
            Some(index) => {
                self.records[index as usize] = Some(record);
                LinkId(index)
            }
            None => {
                self.records.push(Some(record));
                LinkId((self.records.len() - 1) as u32)
            }
        }
    }

    pub fn free(&mut self, id: LinkId) -> LinkRecord {
        let record = self.records[id.0 as usize]
            .take()
            .unwrap_or_else(|| panic!("freeing dangling link {:?}", id));
        self.free.push(id.0);
        record
    }

    pub fn get(&self, id: LinkId) -> &LinkRecord {
        self.records[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling link {:?}", id))
    }

    pub fn get_mut(&mut self, id: LinkId) -> &mut LinkRecord {
        self.records[id.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling link {:?}", id))
    }

    pub fn live(&self) -> usize {
        self.records.len() - self.free.len()
    }
}
