//! Protocol field map.
//!
//! Stands in for the typed key/value metadata store that carries protocol
//! fields alongside each operation. The ordering layer reads and writes
//! exactly three well-known fields; everything else passes through opaque.

use crate::errors::FieldError;
use crate::ids::PeerId;
use bytes::Bytes;
use std::collections::HashMap;

/// 16-byte peer identity of the submitting client.
pub const FIELD_PEER: &str = "causeway.peer";

/// Per-peer sequence number assigned by the proxy.
pub const FIELD_TXN: &str = "causeway.txn";

/// Framed causal-vector payload riding a poll query or reply.
pub const FIELD_SORT: &str = "causeway.sort";

/// A typed field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Id([u8; PeerId::LEN]),
    Int(i64),
    Blob(Bytes),
}

/// Typed key/value carrier for protocol fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: HashMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert_id(&mut self, key: &str, value: [u8; PeerId::LEN]) {
        self.fields.insert(key.to_string(), FieldValue::Id(value));
    }

    pub fn insert_int(&mut self, key: &str, value: i64) {
        self.fields.insert(key.to_string(), FieldValue::Int(value));
    }

    pub fn insert_blob(&mut self, key: &str, value: Bytes) {
        self.fields.insert(key.to_string(), FieldValue::Blob(value));
    }

    /// Remove and return `key` as a 16-byte identifier.
    ///
    /// `Ok(None)` when absent; [`FieldError::WrongType`] when present with a
    /// different type (the field is consumed either way).
    pub fn take_id(
        &mut self,
        key: &str,
    ) -> Result<Option<[u8; PeerId::LEN]>, FieldError> {
        match self.fields.remove(key) {
            None => Ok(None),
            Some(FieldValue::Id(value)) => Ok(Some(value)),
            Some(_) => Err(FieldError::WrongType {
                field: key.to_string(),
            }),
        }
    }

    /// Remove and return `key` as a 64-bit integer.
    pub fn take_int(&mut self, key: &str) -> Result<Option<i64>, FieldError> {
        match self.fields.remove(key) {
            None => Ok(None),
            Some(FieldValue::Int(value)) => Ok(Some(value)),
            Some(_) => Err(FieldError::WrongType {
                field: key.to_string(),
            }),
        }
    }

    /// Remove and return `key` as a binary blob.
    pub fn take_blob(&mut self, key: &str) -> Result<Option<Bytes>, FieldError> {
        match self.fields.remove(key) {
            None => Ok(None),
            Some(FieldValue::Blob(value)) => Ok(Some(value)),
            Some(_) => Err(FieldError::WrongType {
                field: key.to_string(),
            }),
        }
    }
}
