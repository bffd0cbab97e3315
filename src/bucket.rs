//! Sorted arrays of fixed-width `u64` tuples.
//!
//! Every bucket stores its tuples flat in one `Vec<u64>` with a fixed stride:
//! the key words of its length class, followed by `extra` trailing words
//! (one value word for the value-bearing indexes, none for `KeyBytes`).
//! Comparison only ever looks at the key words.

use std::cmp::Ordering;
use std::io::{Read, Write};

use crate::codec::{Reader, Writer};
use crate::error::{IndexError, Result};
use crate::pack::{slot_words, PackedKey, SLOTS};

/// Upper bound on words reserved up front while reading, so a corrupt size
/// cannot trigger a huge allocation before the data runs out.
const READ_RESERVE_WORDS: usize = 1 << 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TupleArray {
    key_words: usize,
    stride: usize,
    data: Vec<u64>,
}

impl TupleArray {
    pub(crate) fn new(key_words: usize, extra: usize) -> Self {
        debug_assert!(key_words > 0);
        Self {
            key_words,
            stride: key_words + extra,
            data: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub(crate) fn key_words(&self) -> usize {
        self.key_words
    }

    #[inline]
    pub(crate) fn tuple(&self, i: usize) -> &[u64] {
        &self.data[i * self.stride..(i + 1) * self.stride]
    }

    #[inline]
    pub(crate) fn tuple_mut(&mut self, i: usize) -> &mut [u64] {
        &mut self.data[i * self.stride..(i + 1) * self.stride]
    }

    #[inline]
    pub(crate) fn key(&self, i: usize) -> &[u64] {
        let start = i * self.stride;
        &self.data[start..start + self.key_words]
    }

    pub(crate) fn tuples_mut(&mut self) -> std::slice::ChunksExactMut<'_, u64> {
        self.data.chunks_exact_mut(self.stride)
    }

    /// Binary search on the key words.
    ///
    /// `Ok(i)` when found, `Err(i)` with the insertion point otherwise.
    pub(crate) fn search(&self, key: &[u64]) -> std::result::Result<usize, usize> {
        debug_assert_eq!(key.len(), self.key_words);
        let mut lo = 0usize;
        let mut hi = self.len();
        while lo < hi {
            let at = lo + (hi - lo) / 2;
            match self.key(at).cmp(key) {
                Ordering::Less => lo = at + 1,
                Ordering::Greater => hi = at,
                Ordering::Equal => return Ok(at),
            }
        }
        Err(lo)
    }

    /// Inserts a full tuple at position `i`, shifting later tuples up.
    pub(crate) fn insert(&mut self, i: usize, tuple: &[u64]) {
        debug_assert_eq!(tuple.len(), self.stride);
        debug_assert!(i <= self.len());
        let at = i * self.stride;
        self.data.splice(at..at, tuple.iter().copied());
    }

    pub(crate) fn push(&mut self, tuple: &[u64]) {
        debug_assert_eq!(tuple.len(), self.stride);
        self.data.extend_from_slice(tuple);
    }

    /// Stable permutation that sorts the tuples by key words.
    pub(crate) fn sorted_order(&self) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.sort_by(|&a, &b| self.key(a).cmp(self.key(b)));
        perm
    }

    /// Rewrites the array in the order given by `perm`.
    pub(crate) fn apply_order(&mut self, perm: &[usize]) {
        debug_assert_eq!(perm.len(), self.len());
        let mut data = Vec::with_capacity(self.data.len());
        for &i in perm {
            data.extend_from_slice(self.tuple(i));
        }
        self.data = data;
    }

    /// True when keys are strictly increasing.
    pub(crate) fn is_strictly_sorted(&self) -> bool {
        (1..self.len()).all(|i| self.key(i - 1) < self.key(i))
    }

    pub(crate) fn replace_data(&mut self, data: Vec<u64>) {
        debug_assert_eq!(data.len() % self.stride, 0);
        self.data = data;
    }

    pub(crate) fn reserve(&mut self, tuples: usize) {
        self.data.reserve(tuples * self.stride);
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    pub(crate) fn heap_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<u64>()
    }

    /// Size as a varint, then every word raw.
    pub(crate) fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_len(self.len())?;
        for &word in &self.data {
            w.write_u64(word)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(&mut self, r: &mut Reader<R>) -> Result<()> {
        let n = r.read_len()?;
        let words = n
            .checked_mul(self.stride)
            .ok_or_else(|| IndexError::Corrupt(format!("bucket size {n} overflows")))?;
        let mut data = Vec::with_capacity(words.min(READ_RESERVE_WORDS));
        for _ in 0..words {
            data.push(r.read_u64()?);
        }
        self.data = data;
        Ok(())
    }
}

/// The 64 buckets of one index, indexed by slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Buckets {
    slots: [TupleArray; SLOTS],
}

impl Buckets {
    pub(crate) fn new(extra: usize, capacity: usize) -> Self {
        Self {
            slots: std::array::from_fn(|slot| {
                let mut arr = TupleArray::new(slot_words(slot), extra);
                if capacity > 0 {
                    arr.reserve(capacity);
                }
                arr
            }),
        }
    }

    #[inline]
    pub(crate) fn get(&self, slot: usize) -> &TupleArray {
        &self.slots[slot]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut TupleArray {
        &mut self.slots[slot]
    }

    #[inline]
    pub(crate) fn for_key(&self, key: &PackedKey) -> &TupleArray {
        &self.slots[key.slot()]
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, TupleArray> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, TupleArray> {
        self.slots.iter_mut()
    }

    /// Bucket sizes in slot order.
    pub(crate) fn lens(&self) -> [usize; SLOTS] {
        std::array::from_fn(|slot| self.slots[slot].len())
    }

    pub(crate) fn total(&self) -> usize {
        self.slots.iter().map(TupleArray::len).sum()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        for arr in &mut self.slots {
            arr.shrink_to_fit();
        }
    }

    pub(crate) fn heap_bytes(&self) -> usize {
        self.slots.iter().map(TupleArray::heap_bytes).sum()
    }

    pub(crate) fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        for arr in &self.slots {
            arr.write_to(w)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(extra: usize, r: &mut Reader<R>) -> Result<Self> {
        let mut buckets = Self::new(extra, 0);
        for arr in buckets.iter_mut() {
            arr.read_from(r)?;
        }
        Ok(buckets)
    }

    /// First slot whose keys are not strictly increasing.
    pub(crate) fn first_unsorted(&self) -> Option<usize> {
        self.slots.iter().position(|arr| !arr.is_strictly_sorted())
    }
}
