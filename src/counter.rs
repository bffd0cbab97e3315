//! Byte-key counter: appends `(key, value)` pairs, then sums duplicates.

use std::io::{Read, Write};
use std::time::Instant;

use tracing::{debug, trace};

use crate::codec::{Persist, Reader, Writer};
use crate::error::Result;
use crate::valued::ValueStore;
use crate::Config;

/// Accumulates `map[key] += value` over byte keys of at most 64 bytes.
///
/// [`add`](Self::add) only appends. [`build`](Self::build) sorts and folds
/// duplicate keys into one entry holding the sum of their values. Lookups and
/// updates are only meaningful after `build`.
#[derive(Clone, Debug)]
pub struct CounterBytes {
    store: ValueStore,
}

impl CounterBytes {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            store: ValueStore::with_config(&config),
        }
    }

    /// Appended pairs before [`build`](Self::build), distinct keys after.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    pub fn find(&self, key: &[u8]) -> Option<i64> {
        debug_assert_eq!(self.store.pending(), 0, "find before build");
        self.store.find(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    pub fn update(&mut self, key: &[u8], f: impl FnOnce(i64) -> i64) -> bool {
        debug_assert_eq!(self.store.pending(), 0, "update before build");
        self.store.update(key, f)
    }

    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.store.update_all(f)
    }

    /// Appends one occurrence of `key` carrying `value`.
    pub fn add(&mut self, key: &[u8], value: i64) -> Result<()> {
        self.store.push(key, value)
    }

    /// Sorts and sums duplicates. Sums wrap on overflow. Running it again
    /// after more [`add`](Self::add) calls folds the new pairs into the
    /// existing totals.
    pub fn build(&mut self) {
        let start = Instant::now();
        let appended = self.store.len();
        self.store.sort_and_sum();
        debug!(
            appended,
            distinct = self.store.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "built CounterBytes"
        );
    }

    pub fn reset(&mut self) {
        self.store.reset()
    }

    pub fn next_entry(&mut self) -> Option<(Vec<u8>, i64, bool)> {
        self.store.next_entry()
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.store.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, i64)> + '_ {
        self.store.iter()
    }

    pub fn shrink_to_fit(&mut self) {
        self.store.shrink_to_fit()
    }

    pub fn memory_usage(&self) -> usize {
        self.store.memory_usage()
    }
}

impl Default for CounterBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for CounterBytes {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        debug_assert_eq!(self.store.pending(), 0, "persisting an unbuilt counter");
        let start = w.written();
        self.store.write_to(w)?;
        trace!(keys = self.len(), bytes = w.written() - start, "wrote CounterBytes");
        Ok(())
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let store = ValueStore::read_from_with(r, config)?;
        trace!(keys = store.len(), "read CounterBytes");
        Ok(Self { store })
    }
}
