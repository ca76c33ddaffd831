//! The serialized blob exchanged with the cluster.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;

use crate::error::{HazelcastError, Result};
use crate::partition::compute_partition_hash;

/// Offset of the type id within a blob.
pub const TYPE_OFFSET: usize = 4;
/// Offset of the payload within a blob.
pub const DATA_OFFSET: usize = 8;

/// A serialized value: `partitionHash:i32 BE | typeId:i32 BE | payload`.
///
/// A zero partition hash means none was set explicitly, and the effective
/// hash is derived from the payload. Equality and hashing ignore the
/// partition hash slot.
#[derive(Clone, Default)]
pub struct Data {
    bytes: Bytes,
}

impl Data {
    /// Wraps serialized bytes, validating the header length.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if !bytes.is_empty() && bytes.len() < DATA_OFFSET {
            return Err(HazelcastError::Serialization(format!(
                "blob of {} bytes is shorter than its {}-byte header",
                bytes.len(),
                DATA_OFFSET
            )));
        }
        Ok(Self { bytes })
    }

    /// Returns the whole blob, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload following the header.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(DATA_OFFSET..).unwrap_or_default()
    }

    /// Returns the total size in bytes.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the payload size in bytes.
    pub fn data_size(&self) -> usize {
        self.bytes.len().saturating_sub(DATA_OFFSET)
    }

    /// Returns the type id; an empty blob reports the null type id.
    pub fn type_id(&self) -> i32 {
        self.header_int(TYPE_OFFSET)
    }

    /// Returns true if a partition hash was set explicitly.
    pub fn has_partition_hash(&self) -> bool {
        self.header_int(0) != 0
    }

    /// Returns the effective partition hash.
    pub fn partition_hash(&self) -> i32 {
        match self.header_int(0) {
            0 => compute_partition_hash(self.payload()),
            hash => hash,
        }
    }

    /// Returns true for the serialized form of a null value.
    pub fn is_null(&self) -> bool {
        self.type_id() == 0
    }

    fn header_int(&self, offset: usize) -> i32 {
        self.bytes
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .map(i32::from_be_bytes)
            .unwrap_or(0)
    }

    fn identity(&self) -> &[u8] {
        self.bytes.get(TYPE_OFFSET..).unwrap_or_default()
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Data {}

impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("type_id", &self.type_id())
            .field("partition_hash", &self.partition_hash())
            .field("total_size", &self.total_size())
            .finish()
    }
}

impl TryFrom<Vec<u8>> for Data {
    type Error = HazelcastError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl From<Data> for Bytes {
    fn from(data: Data) -> Self {
        data.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn blob(partition_hash: i32, type_id: i32, payload: &[u8]) -> Data {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&partition_hash.to_be_bytes());
        bytes.extend_from_slice(&type_id.to_be_bytes());
        bytes.extend_from_slice(payload);
        Data::new(bytes).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let data = blob(17, -7, &[0, 0, 0, 1]);
        assert_eq!(data.type_id(), -7);
        assert!(data.has_partition_hash());
        assert_eq!(data.partition_hash(), 17);
        assert_eq!(data.payload(), &[0, 0, 0, 1]);
        assert_eq!(data.total_size(), 12);
        assert_eq!(data.data_size(), 4);
    }

    #[test]
    fn test_zero_partition_hash_falls_back_to_payload_hash() {
        let data = blob(0, -11, b"payload");
        assert!(!data.has_partition_hash());
        assert_eq!(data.partition_hash(), compute_partition_hash(b"payload"));
        assert_ne!(data.partition_hash(), 0);
    }

    #[test]
    fn test_equality_ignores_partition_hash() {
        let a = blob(1, -7, &[1, 2, 3]);
        let b = blob(2, -7, &[1, 2, 3]);
        let c = blob(1, -8, &[1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_short_blob_rejected() {
        assert!(Data::new(vec![0u8; 7]).is_err());
        assert!(Data::new(vec![0u8; 8]).is_ok());
    }

    #[test]
    fn test_empty_blob_is_null() {
        let data = Data::default();
        assert!(data.is_null());
        assert_eq!(data.type_id(), 0);
        assert!(data.payload().is_empty());
    }
}
