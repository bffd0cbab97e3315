//! Storage shared by the value-bearing byte indexes.
//!
//! Same 64 buckets as `KeyBytes`, but each tuple carries one trailing word
//! holding an `i64` value. Lookups return that value, so there is no rank
//! table and no remap.

use std::io::{Read, Write};

use smallvec::SmallVec;

use crate::bucket::{Buckets, TupleArray};
use crate::codec::{Reader, Writer};
use crate::cursor::{self, Cursor};
use crate::error::{IndexError, Result};
use crate::pack::{self, split_slot, PackedKey, LENGTH_CLASSES};
use crate::{pack_checked, Config};

/// Key words plus the value word.
type Tuple = SmallVec<[u64; LENGTH_CLASSES + 1]>;

fn tuple_of(key: &PackedKey, value: i64) -> Tuple {
    let mut tuple = Tuple::from_slice(key.words());
    tuple.push(value as u64);
    tuple
}

#[inline]
fn value_of(arr: &TupleArray, i: usize) -> i64 {
    arr.tuple(i)[arr.key_words()] as i64
}

#[derive(Clone, Debug)]
pub(crate) struct ValueStore {
    buckets: Buckets,
    total: usize,
    /// Entries appended since the last sort.
    pending: usize,
    cursor: Cursor,
}

impl ValueStore {
    pub(crate) fn with_config(config: &Config) -> Self {
        Self {
            buckets: Buckets::new(1, config.bucket_capacity),
            total: 0,
            pending: 0,
            cursor: Cursor::default(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.total
    }

    #[inline]
    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    fn position(&self, key: &[u8]) -> Option<(usize, usize)> {
        let packed = pack::pack(key)?;
        let slot = packed.slot();
        let i = self.buckets.get(slot).search(packed.words()).ok()?;
        Some((slot, i))
    }

    pub(crate) fn find(&self, key: &[u8]) -> Option<i64> {
        let (slot, i) = self.position(key)?;
        Some(value_of(self.buckets.get(slot), i))
    }

    pub(crate) fn update(&mut self, key: &[u8], f: impl FnOnce(i64) -> i64) -> bool {
        let Some((slot, i)) = self.position(key) else {
            return false;
        };
        let arr = self.buckets.get_mut(slot);
        let at = arr.key_words();
        let word = &mut arr.tuple_mut(i)[at];
        *word = f(*word as i64) as u64;
        true
    }

    pub(crate) fn update_all(&mut self, mut f: impl FnMut(i64) -> i64) {
        for arr in self.buckets.iter_mut() {
            let at = arr.key_words();
            for tuple in arr.tuples_mut() {
                tuple[at] = f(tuple[at] as i64) as u64;
            }
        }
    }

    /// Sorted insert; an existing key gets its value replaced.
    /// Returns whether the key existed.
    pub(crate) fn insert_sorted(&mut self, key: &[u8], value: i64) -> Result<bool> {
        let packed = pack_checked(key)?;
        let arr = self.buckets.get_mut(packed.slot());
        match arr.search(packed.words()) {
            Ok(i) => {
                let at = arr.key_words();
                arr.tuple_mut(i)[at] = value as u64;
                Ok(true)
            }
            Err(i) => {
                arr.insert(i, &tuple_of(&packed, value));
                self.total += 1;
                Ok(false)
            }
        }
    }

    pub(crate) fn push(&mut self, key: &[u8], value: i64) -> Result<()> {
        let packed = pack_checked(key)?;
        self.buckets
            .get_mut(packed.slot())
            .push(&tuple_of(&packed, value));
        self.total += 1;
        self.pending += 1;
        Ok(())
    }

    /// Sorts every bucket by key, keeping duplicates in append order.
    pub(crate) fn sort(&mut self) {
        for arr in self.buckets.iter_mut() {
            if arr.len() > 1 {
                let perm = arr.sorted_order();
                arr.apply_order(&perm);
            }
        }
        self.buckets.shrink_to_fit();
        self.pending = 0;
    }

    /// Sorts every bucket and folds runs of equal keys into one entry whose
    /// value is the (wrapping) sum of the run.
    pub(crate) fn sort_and_sum(&mut self) {
        for arr in self.buckets.iter_mut() {
            if arr.is_empty() {
                continue;
            }
            let kw = arr.key_words();
            let stride = arr.stride();
            let perm = arr.sorted_order();
            let mut data: Vec<u64> = Vec::with_capacity(arr.len() * stride);
            for &i in &perm {
                let tuple = arr.tuple(i);
                let run = data.len().checked_sub(stride);
                match run {
                    Some(last) if data[last..last + kw] == tuple[..kw] => {
                        let sum = (data[last + kw] as i64).wrapping_add(tuple[kw] as i64);
                        data[last + kw] = sum as u64;
                    }
                    _ => data.extend_from_slice(tuple),
                }
            }
            data.shrink_to_fit();
            arr.replace_data(data);
        }
        self.total = self.buckets.total();
        self.pending = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.cursor.reset();
    }

    fn entry_at(&self, slot: usize, offset: usize) -> (Vec<u8>, i64) {
        let (_, tag) = split_slot(slot);
        let arr = self.buckets.get(slot);
        (pack::unpack(arr.key(offset), tag as u8), value_of(arr, offset))
    }

    pub(crate) fn next_entry(&mut self) -> Option<(Vec<u8>, i64, bool)> {
        let (slot, offset, last) = self.cursor.advance(&self.buckets)?;
        let (key, value) = self.entry_at(slot, offset);
        Some((key, value, last))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Vec<u8>, i64)> + '_ {
        cursor::positions(&self.buckets).map(|(slot, offset)| self.entry_at(slot, offset))
    }

    pub(crate) fn keys(&self) -> Vec<Vec<u8>> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.buckets.shrink_to_fit();
    }

    pub(crate) fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.buckets.heap_bytes()
    }

    pub(crate) fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_len(self.total)?;
        self.buckets.write_to(w)
    }

    pub(crate) fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let total = r.read_len()?;
        let buckets = Buckets::read_from(1, r)?;
        if buckets.total() != total {
            return Err(IndexError::Corrupt(format!(
                "bucket sizes sum to {}, header says {total}",
                buckets.total()
            )));
        }
        if config.verify_on_read {
            if let Some(slot) = buckets.first_unsorted() {
                return Err(IndexError::Corrupt(format!("bucket {slot} is not sorted")));
            }
        }
        Ok(Self {
            buckets,
            total,
            pending: 0,
            cursor: Cursor::default(),
        })
    }
}
