//! # binsearch
//!
//! In-memory, binary-searchable sorted-array indexes over byte keys of up to
//! 64 bytes, plus simpler variants over fixed-width integers.
//!
//! Byte keys are never hashed or boxed. Each key is packed into one to eight
//! big-endian `u64` words and stored in one of 64 sorted arrays chosen by its
//! exact length, so a lookup is a binary search over plain integer tuples.
//!
//! Three flavors are provided:
//!
//! - [`KeyBytes`]: keys only. Every key gets a dense rank in `0..len()` that
//!   callers use to index their own parallel arrays.
//! - [`KeyValBytes`]: keys with an `i64` value each.
//! - [`CounterBytes`]: like `KeyValBytes`, but [`CounterBytes::build`] sums the
//!   values of duplicate keys (`map[key] += value`).
//!
//! Keys can be inserted one by one in sorted position, or appended unsorted and
//! finalized with a single `build` call, which for `KeyBytes` returns the
//! permutation to apply to any data collected in insertion order.
//!
//! The iteration order (and the dense rank order) groups keys by length first:
//! all 1-byte keys, then all 2-byte keys, and so on. It is sorted within a
//! length but is *not* a global byte order.
//!
//! ## Example
//!
//! ```rust
//! use binsearch::KeyBytes;
//!
//! let mut index = KeyBytes::new();
//! for key in ["pear", "apple", "fig"] {
//!     index.add_unsorted(key.as_bytes()).unwrap();
//! }
//! let remap = index.build().unwrap();
//!
//! // `remap[rank]` is the insertion position of the key now at `rank`.
//! assert_eq!(remap, vec![2, 0, 1]);
//! assert_eq!(index.find(b"apple"), (2, true));
//! assert_eq!(index.keys(), vec![b"fig".to_vec(), b"pear".to_vec(), b"apple".to_vec()]);
//! ```
//!
//! None of the types synchronize internally: mutate first, then read, from one
//! thread at a time.

#![deny(unsafe_op_in_unsafe_fn)]

mod bucket;
pub mod codec;
mod counter;
mod cursor;
pub mod error;
pub mod ints;
mod keys;
mod keyval;
pub mod pack;
mod rank;
pub mod runes;
mod valued;

pub use codec::{Persist, Reader, Writer};
pub use counter::CounterBytes;
pub use error::{IndexError, Result};
pub use ints::{
    CounterInt, CounterUint16, CounterUint32, CounterUint64, CounterUint8, KeyInt, KeyUint16,
    KeyUint32, KeyUint64, KeyUint8, KeyValInt, KeyValUint16, KeyValUint32, KeyValUint64,
    KeyValUint8,
};
pub use keys::{apply_remap, KeyBytes};
pub use keyval::KeyValBytes;
pub use pack::MAX_KEY_LEN;
pub use runes::{CounterRunes, KeyRunes, KeyValRunes};

/// Configuration shared by the byte indexes.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Tuples reserved up front in each of the 64 buckets.
    pub bucket_capacity: usize,
    /// When reading a persisted index, check that every bucket is strictly
    /// sorted. The format itself carries no such guarantee. The `KeyBytes`
    /// rank table is always checked against the bucket sizes.
    pub verify_on_read: bool,
}

/// Packs `key`, failing with [`IndexError::InvalidKey`] when it is too long.
pub(crate) fn pack_checked(key: &[u8]) -> Result<pack::PackedKey> {
    pack::pack(key).ok_or(IndexError::InvalidKey { len: key.len() })
}

#[cfg(test)]
mod proptests;
