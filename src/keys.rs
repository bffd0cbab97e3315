//! Key-only byte index with dense ranks.

use std::io::{Read, Write};
use std::time::Instant;

use tracing::{debug, trace};

use crate::bucket::Buckets;
use crate::codec::{Persist, Reader, Writer};
use crate::cursor::{self, Cursor};
use crate::error::{IndexError, Result};
use crate::pack::{self, split_slot, PackedKey, SLOTS};
use crate::rank::RankTable;
use crate::{pack_checked, Config};

/// Sorted set of byte keys (at most 64 bytes each), where every key is
/// identified by its dense rank in `0..len()`.
///
/// Keys go in one of two ways:
///
/// - [`add`](Self::add) / [`add_at`](Self::add_at) insert in sorted position
///   and keep ranks valid after every call.
/// - [`add_unsorted`](Self::add_unsorted) appends, and a single
///   [`build`](Self::build) then sorts everything and reports where each
///   appended key ended up. Lookups in between are meaningless.
///
/// Inserting a key shifts the rank of every key after it by one, so ranks are
/// stable only while the index is not being mutated.
#[derive(Clone, Debug)]
pub struct KeyBytes {
    buckets: Buckets,
    /// Per slot, insertion index of each key appended by `add_unsorted`.
    order: [Vec<usize>; SLOTS],
    ranks: RankTable,
    total: usize,
    /// Keys appended since the last build.
    pending: usize,
    built: bool,
    cursor: Cursor,
}

impl KeyBytes {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            buckets: Buckets::new(0, config.bucket_capacity),
            order: std::array::from_fn(|_| Vec::new()),
            ranks: RankTable::new(),
            total: 0,
            pending: 0,
            built: false,
            cursor: Cursor::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn locate(&self, key: &PackedKey) -> (usize, bool) {
        let base = self.ranks.base(key.slot());
        match self.buckets.for_key(key).search(key.words()) {
            Ok(i) => (base + i, true),
            Err(i) => (base + i, false),
        }
    }

    /// Returns `(rank, true)` for a stored key, or `(rank, false)` with the
    /// rank the key would take if added now.
    ///
    /// Keys longer than 64 bytes are never stored and give `(len(), false)`.
    pub fn find(&self, key: &[u8]) -> (usize, bool) {
        debug_assert_eq!(self.pending, 0, "find during an unsorted bulk load");
        match pack::pack(key) {
            Some(packed) => self.locate(&packed),
            None => (self.total, false),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).1
    }

    fn place(&mut self, key: &PackedKey, local: usize) {
        let slot = key.slot();
        self.buckets.get_mut(slot).insert(local, key.words());
        self.ranks.shift_after(slot);
        self.total += 1;
    }

    /// Inserts `key` in sorted position unless present.
    ///
    /// Returns the key's rank and whether it already existed, like
    /// [`find`](Self::find) would have.
    pub fn add(&mut self, key: &[u8]) -> Result<(usize, bool)> {
        debug_assert_eq!(self.pending, 0, "add during an unsorted bulk load");
        let packed = pack_checked(key)?;
        let (rank, found) = self.locate(&packed);
        if !found {
            self.place(&packed, rank - self.ranks.base(packed.slot()));
        }
        Ok((rank, found))
    }

    /// Inserts `key` at `rank`, which the caller already knows to be its
    /// sorted position (for instance from a previous [`find`](Self::find)).
    ///
    /// `rank` must fall inside the key's length bucket; ordering within the
    /// bucket is not re-checked.
    pub fn add_at(&mut self, key: &[u8], rank: usize) -> Result<()> {
        debug_assert_eq!(self.pending, 0, "add_at during an unsorted bulk load");
        let packed = pack_checked(key)?;
        let lo = self.ranks.base(packed.slot());
        let hi = lo + self.buckets.for_key(&packed).len();
        if !(lo..=hi).contains(&rank) {
            return Err(IndexError::PositionOutOfRange { index: rank, lo, hi });
        }
        debug_assert!(
            self.buckets.for_key(&packed).search(packed.words()) == Err(rank - lo),
            "add_at position does not keep the bucket sorted"
        );
        self.place(&packed, rank - lo);
        Ok(())
    }

    /// Appends `key` for a later [`build`](Self::build). Its insertion index is
    /// the value of `len()` before the call.
    pub fn add_unsorted(&mut self, key: &[u8]) -> Result<()> {
        debug_assert!(!self.built, "add_unsorted after build");
        debug_assert_eq!(self.pending, self.total, "add_unsorted after sorted inserts");
        let packed = pack_checked(key)?;
        let slot = packed.slot();
        self.buckets.get_mut(slot).push(packed.words());
        self.order[slot].push(self.total);
        self.ranks.mark_appended(slot);
        self.total += 1;
        self.pending += 1;
        Ok(())
    }

    /// Sorts the keys appended with [`add_unsorted`](Self::add_unsorted).
    ///
    /// Returns `remap` where `remap[rank]` is the insertion index of the key
    /// that now has `rank`; apply it to anything collected in insertion order
    /// (see [`apply_remap`]).
    ///
    /// Runs once. Fails with [`IndexError::RebuildNotAllowed`], leaving the
    /// index untouched, when it already ran or when keys were placed with
    /// [`add`](Self::add) / [`add_at`](Self::add_at).
    pub fn build(&mut self) -> Result<Vec<usize>> {
        if self.built {
            return Err(IndexError::RebuildNotAllowed);
        }
        if (0..SLOTS).any(|slot| self.order[slot].len() != self.buckets.get(slot).len()) {
            return Err(IndexError::RebuildNotAllowed);
        }

        let start = Instant::now();
        let mut remap = Vec::with_capacity(self.total);
        for (slot, order) in self.order.iter_mut().enumerate() {
            let order = std::mem::take(order);
            let arr = self.buckets.get_mut(slot);
            if arr.is_empty() {
                continue;
            }
            let perm = arr.sorted_order();
            arr.apply_order(&perm);
            remap.extend(perm.iter().map(|&i| order[i]));
        }
        self.ranks.accumulate();
        self.pending = 0;
        self.built = true;

        debug_assert_eq!(remap.len(), self.total);
        debug!(
            keys = self.total,
            elapsed_us = start.elapsed().as_micros() as u64,
            "built KeyBytes"
        );
        Ok(remap)
    }

    /// Rewinds the cursor used by [`next_key`](Self::next_key).
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    fn key_at(&self, slot: usize, offset: usize) -> Vec<u8> {
        let (_, tag) = split_slot(slot);
        pack::unpack(self.buckets.get(slot).key(offset), tag as u8)
    }

    /// Returns the key under the cursor and whether it was the last one, then
    /// advances. After the last key the cursor starts over.
    ///
    /// `None` when the index is empty.
    pub fn next_key(&mut self) -> Option<(Vec<u8>, bool)> {
        let (slot, offset, last) = self.cursor.advance(&self.buckets)?;
        Some((self.key_at(slot, offset), last))
    }

    /// All keys in rank order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.iter().collect()
    }

    /// Keys in rank order, independent of the [`next_key`](Self::next_key) cursor.
    pub fn iter(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        cursor::positions(&self.buckets).map(|(slot, offset)| self.key_at(slot, offset))
    }

    pub fn shrink_to_fit(&mut self) {
        self.buckets.shrink_to_fit();
        for order in &mut self.order {
            order.shrink_to_fit();
        }
    }

    /// Approximate heap bytes owned by the index.
    pub fn memory_usage(&self) -> usize {
        let order: usize = self
            .order
            .iter()
            .map(|o| o.capacity() * std::mem::size_of::<usize>())
            .sum();
        std::mem::size_of::<Self>() + self.buckets.heap_bytes() + order
    }
}

impl Default for KeyBytes {
    fn default() -> Self {
        Self::new()
    }
}

/// Reorders `values`, collected in insertion order, into rank order using the
/// `remap` returned by [`KeyBytes::build`].
pub fn apply_remap<T: Clone>(remap: &[usize], values: &[T]) -> Vec<T> {
    debug_assert_eq!(remap.len(), values.len());
    remap.iter().map(|&i| values[i].clone()).collect()
}

impl Persist for KeyBytes {
    /// Total, the 64-entry rank table, then the buckets.
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        debug_assert_eq!(self.pending, 0, "persisting an unbuilt bulk load");
        let start = w.written();
        w.write_len(self.total)?;
        for &c in self.ranks.counts() {
            w.write_len(c)?;
        }
        self.buckets.write_to(w)?;
        trace!(keys = self.total, bytes = w.written() - start, "wrote KeyBytes");
        Ok(())
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let total = r.read_len()?;
        let mut count = [0usize; SLOTS];
        for c in &mut count {
            *c = r.read_len()?;
        }
        let buckets = Buckets::read_from(0, r)?;
        if buckets.total() != total {
            return Err(IndexError::Corrupt(format!(
                "bucket sizes sum to {}, header says {total}",
                buckets.total()
            )));
        }
        let ranks = RankTable::from_counts(count);
        if ranks != RankTable::from_lens(&buckets.lens()) {
            return Err(IndexError::Corrupt("rank table does not match bucket sizes".into()));
        }
        if config.verify_on_read {
            if let Some(slot) = buckets.first_unsorted() {
                return Err(IndexError::Corrupt(format!("bucket {slot} is not sorted")));
            }
        }
        trace!(keys = total, "read KeyBytes");
        Ok(Self {
            buckets,
            order: std::array::from_fn(|_| Vec::new()),
            ranks,
            total,
            pending: 0,
            built: false,
            cursor: Cursor::default(),
        })
    }
}
