//! Classification of incoming traffic by its protocol fields.
//!
//! Three well-known fields decide a submission's path: none of them means
//! the operation bypasses ordering entirely, identity plus txn means it is
//! managed, and a sort payload on top marks proxy exchange traffic. The
//! fields are consumed during analysis so downstream layers never see them.

use crate::domain::errors::OrderingError;
use bytes::Bytes;
use shared_types::{FieldMap, PeerId, SequenceNumber, FIELD_PEER, FIELD_SORT, FIELD_TXN};

/// Where a submission goes after field analysis.
#[derive(Debug, PartialEq, Eq)]
pub enum Intake {
    /// No protocol fields: execute outside the ordering layer.
    Passthrough,
    /// Identity and txn: a managed operation for the scheduler.
    Managed { peer: PeerId, txn: SequenceNumber },
    /// Identity, txn and a sort payload: proxy exchange traffic.
    Exchange {
        peer: PeerId,
        txn: SequenceNumber,
        payload: Bytes,
    },
}

/// Strip the protocol fields off `fields` and classify the submission.
///
/// A partial field set is rejected: identity without a txn (or the other
/// way round) can only come from a confused proxy, and guessing a path for
/// it would corrupt ordering state.
pub fn analyze(fields: &mut FieldMap) -> Result<Intake, OrderingError> {
    let peer = fields.take_id(FIELD_PEER)?;
    let txn = fields.take_int(FIELD_TXN)?;
    let payload = fields.take_blob(FIELD_SORT)?;

    match (peer, txn, payload) {
        (None, None, None) => Ok(Intake::Passthrough),
        (Some(peer), Some(txn), payload) => {
            let txn = u64::try_from(txn).map_err(|_| OrderingError::MalformedFields {
                reason: "negative sequence number".to_string(),
            })?;
            let peer = PeerId::from_bytes(peer);
            let txn = SequenceNumber::new(txn);
            Ok(match payload {
                None => Intake::Managed { peer, txn },
                Some(payload) => Intake::Exchange { peer, txn, payload },
            })
        }
        _ => Err(OrderingError::MalformedFields {
            reason: "identity and txn fields must travel together".to_string(),
        }),
    }
}
