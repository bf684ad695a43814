//! Batch envelope decoding.
//!
//! A batch response carries envelopes with one optional slot per record kind.
//! A well-formed envelope has exactly one populated slot; anything else is a
//! server-side protocol violation and is reported, never coerced.

use recap_proto as proto;

use crate::error::{ClientError, Result};
use crate::record::Record;

/// Extract the single record carried by `envelope`.
///
/// `index` is the envelope's position in its batch and only feeds the error.
pub fn decode(envelope: proto::ItemEnvelope, index: usize) -> Result<Record> {
    let populated = usize::from(envelope.item_a.is_some())
        + usize::from(envelope.item_b.is_some())
        + usize::from(envelope.item_c.is_some());

    match envelope {
        proto::ItemEnvelope {
            item_a: Some(item),
            item_b: None,
            item_c: None,
        } => Ok(item.into()),
        proto::ItemEnvelope {
            item_a: None,
            item_b: Some(item),
            item_c: None,
        } => Ok(item.into()),
        proto::ItemEnvelope {
            item_a: None,
            item_b: None,
            item_c: Some(item),
        } => Ok(item.into()),
        _ => Err(ClientError::MalformedEnvelope { index, populated }),
    }
}

/// Decode a whole batch in order, stopping at the first malformed envelope.
pub fn decode_batch(envelopes: Vec<proto::ItemEnvelope>) -> Result<Vec<Record>> {
    envelopes
        .into_iter()
        .enumerate()
        .map(|(index, envelope)| decode(envelope, index))
        .collect()
}
