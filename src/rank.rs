//! Translation from (slot, local offset) to a dense global rank.
//!
//! `count[s]` holds the number of keys stored in every slot before `s`, so the
//! dense rank of the key at offset `i` of slot `s` is `i + count[s]`.
//!
//! Sorted inserts keep the table cumulative on every call. The bulk path does
//! not: while appending it only bumps the entry right after the key's own slot,
//! which leaves `count[s + 1]` holding the *size* of slot `s`. [`RankTable::accumulate`]
//! then turns those sizes into cumulative bases in one pass.

use crate::pack::SLOTS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RankTable {
    count: [usize; SLOTS],
}

impl RankTable {
    pub(crate) fn new() -> Self {
        Self { count: [0; SLOTS] }
    }

    pub(crate) fn from_counts(count: [usize; SLOTS]) -> Self {
        Self { count }
    }

    /// Rank of the first key in `slot`.
    #[inline]
    pub(crate) fn base(&self, slot: usize) -> usize {
        self.count[slot]
    }

    #[inline]
    pub(crate) fn counts(&self) -> &[usize; SLOTS] {
        &self.count
    }

    /// A key was inserted in sorted position into `slot`.
    pub(crate) fn shift_after(&mut self, slot: usize) {
        for c in &mut self.count[slot + 1..] {
            *c += 1;
        }
    }

    /// A key was appended unsorted to `slot`.
    pub(crate) fn mark_appended(&mut self, slot: usize) {
        if slot + 1 < SLOTS {
            self.count[slot + 1] += 1;
        }
    }

    /// Converts per-slot sizes left by [`mark_appended`](Self::mark_appended)
    /// into cumulative bases. Slots 0 and 1 are already correct.
    pub(crate) fn accumulate(&mut self) {
        for s in 2..SLOTS {
            self.count[s] += self.count[s - 1];
        }
    }

    /// Table implied by bucket sizes, used to validate persisted indexes.
    pub(crate) fn from_lens(lens: &[usize; SLOTS]) -> Self {
        let mut count = [0usize; SLOTS];
        for s in 1..SLOTS {
            count[s] = count[s - 1] + lens[s - 1];
        }
        Self { count }
    }
}
