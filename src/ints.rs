//! Sorted-slice indexes over fixed-width integer keys.
//!
//! These need no packing or bucketing: the keys already compare as plain
//! integers, so each index is one sorted `Vec` searched with a binary search.
//! The API mirrors the byte flavors.

use std::fmt::Debug;
use std::io::{Read, Write};
use std::time::Instant;

use tracing::debug;

use crate::codec::{Persist, Reader, Writer};
use crate::error::{IndexError, Result};
use crate::Config;

/// Keys read from a dump are reserved up front to at most this many.
const READ_RESERVE: usize = 1 << 16;

/// An integer usable as a key. Persisted at its natural width.
pub trait IntKey: Copy + Ord + Debug {
    fn write_key<W: Write>(self, w: &mut Writer<W>) -> Result<()>;

    fn read_key<R: Read>(r: &mut Reader<R>) -> Result<Self>;
}

macro_rules! int_key {
    ($($t:ty => $write:ident, $read:ident;)*) => {$(
        impl IntKey for $t {
            #[inline]
            fn write_key<W: Write>(self, w: &mut Writer<W>) -> Result<()> {
                w.$write(self)
            }

            #[inline]
            fn read_key<R: Read>(r: &mut Reader<R>) -> Result<Self> {
                r.$read()
            }
        }
    )*};
}

int_key! {
    u8 => write_u8, read_u8;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
}

impl IntKey for i64 {
    #[inline]
    fn write_key<W: Write>(self, w: &mut Writer<W>) -> Result<()> {
        w.write_u64(self as u64)
    }

    #[inline]
    fn read_key<R: Read>(r: &mut Reader<R>) -> Result<Self> {
        Ok(r.read_u64()? as i64)
    }
}

/// Steps a wrapping cursor over `len` items. `None` when there are none.
fn step(cursor: &mut usize, len: usize) -> Option<(usize, bool)> {
    if len == 0 {
        return None;
    }
    if *cursor >= len {
        *cursor = 0;
    }
    let at = *cursor;
    *cursor += 1;
    if *cursor == len {
        *cursor = 0;
        return Some((at, true));
    }
    Some((at, false))
}

fn check_sorted<T: Ord>(items: &[T], config: &Config) -> Result<()> {
    if config.verify_on_read && items.windows(2).any(|w| w[0] >= w[1]) {
        return Err(IndexError::Corrupt("integer keys are not strictly sorted".into()));
    }
    Ok(())
}

/// Sorted set of integer keys, each identified by its rank.
#[derive(Clone, Debug)]
pub struct KeyInt<T> {
    keys: Vec<T>,
    cursor: usize,
}

impl<T: IntKey> KeyInt<T> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `(rank, true)` when present, else `(insertion rank, false)`.
    pub fn find(&self, key: T) -> (usize, bool) {
        match self.keys.binary_search(&key) {
            Ok(i) => (i, true),
            Err(i) => (i, false),
        }
    }

    pub fn contains(&self, key: T) -> bool {
        self.find(key).1
    }

    /// Inserts `key` in sorted position unless present.
    pub fn add(&mut self, key: T) -> (usize, bool) {
        let (rank, found) = self.find(key);
        if !found {
            self.keys.insert(rank, key);
        }
        (rank, found)
    }

    /// Inserts `key` at `rank`, which the caller knows to be its sorted position.
    pub fn add_at(&mut self, key: T, rank: usize) -> Result<()> {
        let hi = self.keys.len();
        if rank > hi {
            return Err(IndexError::PositionOutOfRange { index: rank, lo: 0, hi });
        }
        debug_assert!(
            self.keys.binary_search(&key) == Err(rank),
            "add_at position does not keep the keys sorted"
        );
        self.keys.insert(rank, key);
        Ok(())
    }

    pub fn add_unsorted(&mut self, key: T) {
        self.keys.push(key);
    }

    /// Sorts the keys and returns `remap`, where `remap[rank]` is the
    /// insertion index of the key now at `rank`.
    pub fn build(&mut self) -> Vec<usize> {
        let start = Instant::now();
        let mut remap: Vec<usize> = (0..self.keys.len()).collect();
        remap.sort_by_key(|&i| self.keys[i]);
        self.keys = remap.iter().map(|&i| self.keys[i]).collect();
        debug!(
            keys = self.keys.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "built KeyInt"
        );
        remap
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn next_key(&mut self) -> Option<(T, bool)> {
        let (at, last) = step(&mut self.cursor, self.keys.len())?;
        Some((self.keys[at], last))
    }

    pub fn keys(&self) -> Vec<T> {
        self.keys.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.keys.iter().copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.keys
    }
}

impl<T: IntKey> Default for KeyInt<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IntKey> Persist for KeyInt<T> {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_len(self.keys.len())?;
        for &k in &self.keys {
            k.write_key(w)?;
        }
        Ok(())
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let n = r.read_len()?;
        let mut keys = Vec::with_capacity(n.min(READ_RESERVE));
        for _ in 0..n {
            keys.push(T::read_key(r)?);
        }
        check_sorted(&keys, config)?;
        Ok(Self { keys, cursor: 0 })
    }
}

/// `(key, value)` pairs sorted by key, shared by the value-bearing flavors.
#[derive(Clone, Debug)]
struct Entries<T> {
    items: Vec<(T, i64)>,
    cursor: usize,
}

impl<T: IntKey> Entries<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    fn search(&self, key: T) -> std::result::Result<usize, usize> {
        self.items.binary_search_by(|(k, _)| k.cmp(&key))
    }

    fn find(&self, key: T) -> Option<i64> {
        self.search(key).ok().map(|i| self.items[i].1)
    }

    fn update(&mut self, key: T, f: impl FnOnce(i64) -> i64) -> bool {
        match self.search(key) {
            Ok(i) => {
                let v = &mut self.items[i].1;
                *v = f(*v);
                true
            }
            Err(_) => false,
        }
    }

    fn update_all(&mut self, mut f: impl FnMut(i64) -> i64) {
        for (_, v) in &mut self.items {
            *v = f(*v);
        }
    }

    fn sort(&mut self) {
        self.items.sort_by_key(|&(k, _)| k);
        self.items.shrink_to_fit();
    }

    fn next_entry(&mut self) -> Option<(T, i64, bool)> {
        let (at, last) = step(&mut self.cursor, self.items.len())?;
        let (k, v) = self.items[at];
        Some((k, v, last))
    }

    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_len(self.items.len())?;
        for &(k, v) in &self.items {
            k.write_key(w)?;
            w.write_u64(v as u64)?;
        }
        Ok(())
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let n = r.read_len()?;
        let mut items = Vec::with_capacity(n.min(READ_RESERVE));
        for _ in 0..n {
            let k = T::read_key(r)?;
            let v = r.read_u64()? as i64;
            items.push((k, v));
        }
        if config.verify_on_read && items.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(IndexError::Corrupt("integer keys are not strictly sorted".into()));
        }
        Ok(Self { items, cursor: 0 })
    }
}

/// Sorted map from integer keys to `i64`.
#[derive(Clone, Debug)]
pub struct KeyValInt<T> {
    entries: Entries<T>,
}

impl<T: IntKey> KeyValInt<T> {
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.items.is_empty()
    }

    pub fn find(&self, key: T) -> Option<i64> {
        self.entries.find(key)
    }

    pub fn update(&mut self, key: T, f: impl FnOnce(i64) -> i64) -> bool {
        self.entries.update(key, f)
    }

    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.entries.update_all(f)
    }

    /// Inserts in sorted position or overwrites. Returns whether `key` existed.
    pub fn add(&mut self, key: T, value: i64) -> bool {
        match self.entries.search(key) {
            Ok(i) => {
                self.entries.items[i].1 = value;
                true
            }
            Err(i) => {
                self.entries.items.insert(i, (key, value));
                false
            }
        }
    }

    pub fn add_unsorted(&mut self, key: T, value: i64) {
        self.entries.items.push((key, value));
    }

    pub fn build(&mut self) {
        self.entries.sort();
        debug!(keys = self.len(), "built KeyValInt");
    }

    pub fn reset(&mut self) {
        self.entries.cursor = 0;
    }

    pub fn next_entry(&mut self) -> Option<(T, i64, bool)> {
        self.entries.next_entry()
    }

    pub fn keys(&self) -> Vec<T> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, i64)> + '_ {
        self.entries.items.iter().copied()
    }
}

impl<T: IntKey> Default for KeyValInt<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IntKey> Persist for KeyValInt<T> {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        self.entries.write_to(w)
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        Ok(Self {
            entries: Entries::read_from_with(r, config)?,
        })
    }
}

/// Sums `i64` values per integer key.
#[derive(Clone, Debug)]
pub struct CounterInt<T> {
    entries: Entries<T>,
}

impl<T: IntKey> CounterInt<T> {
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.items.is_empty()
    }

    /// Only meaningful after [`build`](Self::build).
    pub fn find(&self, key: T) -> Option<i64> {
        self.entries.find(key)
    }

    pub fn update(&mut self, key: T, f: impl FnOnce(i64) -> i64) -> bool {
        self.entries.update(key, f)
    }

    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.entries.update_all(f)
    }

    pub fn add(&mut self, key: T, value: i64) {
        self.entries.items.push((key, value));
    }

    /// Sorts and folds duplicate keys into one entry holding the wrapping sum.
    pub fn build(&mut self) {
        let appended = self.len();
        self.entries.sort();
        let mut folded: Vec<(T, i64)> = Vec::with_capacity(appended);
        for &(k, v) in &self.entries.items {
            if let Some((last, sum)) = folded.last_mut() {
                if *last == k {
                    *sum = sum.wrapping_add(v);
                    continue;
                }
            }
            folded.push((k, v));
        }
        folded.shrink_to_fit();
        self.entries.items = folded;
        debug!(appended, distinct = self.len(), "built CounterInt");
    }

    pub fn reset(&mut self) {
        self.entries.cursor = 0;
    }

    pub fn next_entry(&mut self) -> Option<(T, i64, bool)> {
        self.entries.next_entry()
    }

    pub fn keys(&self) -> Vec<T> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, i64)> + '_ {
        self.entries.items.iter().copied()
    }
}

impl<T: IntKey> Default for CounterInt<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IntKey> Persist for CounterInt<T> {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        self.entries.write_to(w)
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        Ok(Self {
            entries: Entries::read_from_with(r, config)?,
        })
    }
}

pub type KeyUint64 = KeyInt<u64>;
pub type KeyUint32 = KeyInt<u32>;
pub type KeyUint16 = KeyInt<u16>;
pub type KeyUint8 = KeyInt<u8>;

pub type KeyValUint64 = KeyValInt<u64>;
pub type KeyValUint32 = KeyValInt<u32>;
pub type KeyValUint16 = KeyValInt<u16>;
pub type KeyValUint8 = KeyValInt<u8>;

pub type CounterUint64 = CounterInt<u64>;
pub type CounterUint32 = CounterInt<u32>;
pub type CounterUint16 = CounterInt<u16>;
pub type CounterUint8 = CounterInt<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    #[test]
    fn test_key_int_sorted_and_bulk_agree() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut input: Vec<u32> = Vec::new();
        while input.len() < 500 {
            let k = rng.gen();
            if !input.contains(&k) {
                input.push(k);
            }
        }

        let mut sorted = KeyUint32::new();
        let mut bulk = KeyUint32::new();
        for &k in &input {
            assert!(!sorted.add(k).1);
            bulk.add_unsorted(k);
        }
        let remap = bulk.build();
        assert_eq!(bulk.as_slice(), sorted.as_slice());
        for (rank, &i) in remap.iter().enumerate() {
            assert_eq!(bulk.find(input[i]), (rank, true));
        }
    }

    #[test]
    fn test_key_int_add_at() {
        let mut t = KeyUint8::new();
        t.add(10);
        t.add(30);
        let (rank, found) = t.find(20);
        assert!(!found);
        t.add_at(20, rank).unwrap();
        assert_eq!(t.keys(), vec![10, 20, 30]);
        assert!(matches!(
            t.add_at(40, 9),
            Err(IndexError::PositionOutOfRange { index: 9, lo: 0, hi: 3 })
        ));
    }

    #[test]
    fn test_key_int_cursor() {
        let mut t = KeyInt::<i64>::new();
        assert_eq!(t.next_key(), None);
        t.add(-1);
        t.add(5);
        assert_eq!(t.next_key(), Some((-1, false)));
        assert_eq!(t.next_key(), Some((5, true)));
        assert_eq!(t.next_key(), Some((-1, false)));
        t.reset();
        assert_eq!(t.next_key(), Some((-1, false)));
    }

    #[test]
    fn test_keyval_int() {
        let mut t = KeyValUint16::new();
        assert!(!t.add(300, 1));
        assert!(!t.add(7, 2));
        assert!(t.add(300, 3));
        assert_eq!(t.find(300), Some(3));
        assert_eq!(t.find(8), None);
        assert!(t.update(7, |v| v - 10));
        t.update_all(|v| v * 2);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![(7, -16), (300, 6)]);

        let mut bulk = KeyValUint16::new();
        bulk.add_unsorted(300, 6);
        bulk.add_unsorted(7, -16);
        bulk.build();
        assert_eq!(bulk.iter().collect::<Vec<_>>(), t.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_counter_int_matches_model() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut model: BTreeMap<u64, i64> = BTreeMap::new();
        let mut c = CounterUint64::new();
        for _ in 0..3000 {
            let k = rng.gen_range(0..100u64);
            let v = rng.gen_range(-3..=3);
            *model.entry(k).or_default() += v;
            c.add(k, v);
        }
        c.build();
        assert_eq!(c.iter().collect::<Vec<_>>(), model.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_counter_int_empty_build() {
        let mut c = CounterUint8::new();
        c.build();
        assert!(c.is_empty());
        assert_eq!(c.next_entry(), None);
    }

    #[test]
    fn test_persist_natural_width() {
        let mut t = KeyUint16::new();
        t.add(1);
        t.add(0xBEEF);
        let bytes = t.to_bytes().unwrap();
        assert_eq!(bytes, vec![2, 1, 0, 0xEF, 0xBE]);
        let back = KeyUint16::from_bytes(&bytes).unwrap();
        assert_eq!(back.keys(), vec![1, 0xBEEF]);

        let mut c = CounterUint8::new();
        c.add(4, -1);
        c.build();
        let bytes = c.to_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + 1 + 8);
        let back = CounterUint8::from_bytes(&bytes).unwrap();
        assert_eq!(back.find(4), Some(-1));
    }

    #[test]
    fn test_verify_rejects_unsorted() {
        let mut t = KeyValUint32::new();
        t.add_unsorted(2, 0);
        t.add_unsorted(1, 0);
        let bytes = t.to_bytes().unwrap();
        assert!(KeyValUint32::from_bytes(&bytes).is_ok());
        let config = Config {
            verify_on_read: true,
            ..Config::default()
        };
        assert!(matches!(
            KeyValUint32::from_bytes_with(&bytes, &config),
            Err(IndexError::Corrupt(_))
        ));

        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(KeyValUint32::from_bytes(truncated), Err(IndexError::Io(_))));
    }
}
