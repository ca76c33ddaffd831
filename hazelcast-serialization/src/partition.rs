//! Partition hashing and key routing.
//!
//! A blob's partition hash decides which cluster partition owns it. By
//! default the hash is derived from the blob's payload; a
//! [`PartitioningStrategy`] can substitute another value (a "partition key")
//! whose serialized form is hashed instead. This enables co-location of
//! related entries on the same partition.
//!
//! # Example
//!
//! ```ignore
//! struct OrderKey {
//!     order_id: i64,
//!     customer_id: String,
//! }
//!
//! impl PartitionAware for OrderKey {
//!     fn partition_key(&self) -> &dyn HazelcastObject {
//!         // all orders of a customer land on the same partition
//!         &self.customer_id
//!     }
//! }
//!
//! impl HazelcastObject for OrderKey {
//!     fn as_partition_aware(&self) -> Option<&dyn PartitionAware> {
//!         Some(self)
//!     }
//! }
//! ```

use std::any::Any;

use crate::serialization::HazelcastObject;

/// Seed of the partition hash.
pub const PARTITION_HASH_SEED: u32 = 0x0100_0193;

/// Computes the partition hash of a payload.
pub fn compute_partition_hash(payload: &[u8]) -> i32 {
    murmur_hash3_x86_32(payload, PARTITION_HASH_SEED)
}

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

fn mix_k1(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// MurmurHash3 x86 32-bit, reading blocks little-endian.
fn murmur_hash3_x86_32(data: &[u8], seed: u32) -> i32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |k, (i, &b)| k ^ (u32::from(b) << (8 * i)));
        h1 ^= mix_k1(k1);
    }

    fmix(h1 ^ data.len() as u32) as i32
}

/// A value that routes by another key than itself.
pub trait PartitionAware: Send + Sync {
    /// Returns the value whose serialized form decides the partition.
    fn partition_key(&self) -> &dyn HazelcastObject;
}

/// Picks the partition key of a value about to be serialized.
///
/// Returning `None`, or the value itself, leaves the partition hash to be
/// derived from the value's own payload.
pub trait PartitioningStrategy: Send + Sync {
    /// Returns the partition key for `value`.
    fn partition_key<'a>(&self, value: &'a dyn HazelcastObject)
        -> Option<&'a dyn HazelcastObject>;
}

/// Strategy that honours [`PartitionAware`] values and ignores all others.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPartitioningStrategy;

impl PartitioningStrategy for DefaultPartitioningStrategy {
    fn partition_key<'a>(
        &self,
        value: &'a dyn HazelcastObject,
    ) -> Option<&'a dyn HazelcastObject> {
        value.as_partition_aware().map(|aware| aware.partition_key())
    }
}

/// Strategy that never supplies a partition key.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPartitioningStrategy;

impl PartitioningStrategy for NoPartitioningStrategy {
    fn partition_key<'a>(
        &self,
        _value: &'a dyn HazelcastObject,
    ) -> Option<&'a dyn HazelcastObject> {
        None
    }
}

/// Returns true if both references point at the same value.
///
/// A field at offset 0 shares its struct's address, so the concrete types
/// must match as well.
pub(crate) fn same_object(a: &dyn HazelcastObject, b: &dyn HazelcastObject) -> bool {
    std::ptr::eq(
        a as *const dyn HazelcastObject as *const u8,
        b as *const dyn HazelcastObject as *const u8,
    ) && Any::type_id(a.as_any()) == Any::type_id(b.as_any())
}
