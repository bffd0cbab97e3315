//! Forward cursor over the 64 buckets of an index.
//!
//! The cursor walks length classes, then remainder buckets, then offsets, so
//! keys come out grouped by length and sorted only within a group. It is not a
//! global byte order: `b"b"` is visited before `b"aa"`.

use crate::bucket::Buckets;
use crate::pack::{slot_of, LENGTH_CLASSES, REMAINDERS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    class: usize,
    remainder: usize,
    offset: usize,
}

impl Cursor {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    fn slot(&self) -> usize {
        slot_of(self.class, self.remainder)
    }

    /// Moves forward to the first existing entry at or after the current
    /// position. Returns false when there is none.
    fn settle(&mut self, buckets: &Buckets) -> bool {
        while self.class < LENGTH_CLASSES {
            if self.offset < buckets.get(self.slot()).len() {
                return true;
            }
            self.offset = 0;
            self.remainder += 1;
            if self.remainder == REMAINDERS {
                self.remainder = 0;
                self.class += 1;
            }
        }
        false
    }

    /// Position `(slot, offset)` of the next entry plus whether it is the last
    /// one. After the last entry the cursor rewinds to the start.
    ///
    /// `None` only when `buckets` is empty. A cursor left stale by mutation
    /// wraps around instead of faulting.
    pub(crate) fn advance(&mut self, buckets: &Buckets) -> Option<(usize, usize, bool)> {
        if !self.settle(buckets) {
            self.reset();
            if !self.settle(buckets) {
                self.reset();
                return None;
            }
        }
        let here = (self.slot(), self.offset);
        self.offset += 1;
        let last = !self.settle(buckets);
        if last {
            self.reset();
        }
        Some((here.0, here.1, last))
    }
}

/// Walk of every `(slot, offset)` in cursor order, without shared state.
pub(crate) fn positions(buckets: &Buckets) -> impl Iterator<Item = (usize, usize)> + '_ {
    buckets
        .iter()
        .enumerate()
        .flat_map(|(slot, arr)| (0..arr.len()).map(move |i| (slot, i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets_with(entries: &[(usize, u64)]) -> Buckets {
        let mut b = Buckets::new(0, 0);
        for &(slot, word) in entries {
            let words = vec![word; b.get(slot).key_words()];
            b.get_mut(slot).push(&words);
        }
        b
    }

    #[test]
    fn test_empty() {
        let b = Buckets::new(0, 0);
        let mut c = Cursor::default();
        assert_eq!(c.advance(&b), None);
        assert_eq!(c, Cursor::default());
    }

    #[test]
    fn test_walks_slots_in_order_and_wraps() {
        let b = buckets_with(&[(9, 1), (0, 1), (0, 2), (63, 1)]);
        let mut c = Cursor::default();
        assert_eq!(c.advance(&b), Some((0, 0, false)));
        assert_eq!(c.advance(&b), Some((0, 1, false)));
        assert_eq!(c.advance(&b), Some((9, 0, false)));
        assert_eq!(c.advance(&b), Some((63, 0, true)));
        assert_eq!(c.advance(&b), Some((0, 0, false)));

        let all: Vec<_> = positions(&b).collect();
        assert_eq!(all, vec![(0, 0), (0, 1), (9, 0), (63, 0)]);
    }

    #[test]
    fn test_single_entry_is_always_last() {
        let b = buckets_with(&[(20, 4)]);
        let mut c = Cursor::default();
        assert_eq!(c.advance(&b), Some((20, 0, true)));
        assert_eq!(c.advance(&b), Some((20, 0, true)));
    }
}
