//! On-disk encoding of an entry's id list (MessagePack array of strings).

use crate::error::StoreError;

pub fn encode_ids(ids: &[String]) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec(ids).map_err(|e| StoreError::Codec(e.to_string()))
}

pub fn decode_ids(bytes: &[u8]) -> Result<Vec<String>, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}
