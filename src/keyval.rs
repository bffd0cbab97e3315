//! Byte keys with one `i64` value each.

use std::io::{Read, Write};
use std::time::Instant;

use tracing::{debug, trace};

use crate::codec::{Persist, Reader, Writer};
use crate::error::Result;
use crate::valued::ValueStore;
use crate::Config;

/// Sorted map from byte keys (at most 64 bytes) to `i64`.
///
/// Fill it with [`add`](Self::add), or with
/// [`add_unsorted`](Self::add_unsorted) followed by one
/// [`build`](Self::build). Keys are expected to be unique; `add_unsorted`
/// does not check, and a duplicate survives `build` as a second entry.
#[derive(Clone, Debug)]
pub struct KeyValBytes {
    store: ValueStore,
}

impl KeyValBytes {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            store: ValueStore::with_config(&config),
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Value stored for `key`. Keys longer than 64 bytes are never found.
    pub fn find(&self, key: &[u8]) -> Option<i64> {
        debug_assert_eq!(self.store.pending(), 0, "find before build");
        self.store.find(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Replaces the value of `key` with `f(old)`. Returns whether the key exists.
    pub fn update(&mut self, key: &[u8], f: impl FnOnce(i64) -> i64) -> bool {
        debug_assert_eq!(self.store.pending(), 0, "update before build");
        self.store.update(key, f)
    }

    /// Applies `f` to every stored value.
    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.store.update_all(f)
    }

    /// Inserts `key` in sorted position, or overwrites its value if present.
    /// Returns whether the key already existed.
    pub fn add(&mut self, key: &[u8], value: i64) -> Result<bool> {
        debug_assert_eq!(self.store.pending(), 0, "add during an unsorted bulk load");
        self.store.insert_sorted(key, value)
    }

    /// Appends `key` for a later [`build`](Self::build).
    pub fn add_unsorted(&mut self, key: &[u8], value: i64) -> Result<()> {
        self.store.push(key, value)
    }

    /// Sorts everything appended with [`add_unsorted`](Self::add_unsorted)
    /// and trims spare capacity. Calling it again is harmless.
    pub fn build(&mut self) {
        let start = Instant::now();
        self.store.sort();
        debug!(
            keys = self.store.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "built KeyValBytes"
        );
    }

    /// Rewinds the cursor used by [`next_entry`](Self::next_entry).
    pub fn reset(&mut self) {
        self.store.reset()
    }

    /// Returns the entry under the cursor and whether it was the last one,
    /// then advances. After the last entry the cursor starts over.
    pub fn next_entry(&mut self) -> Option<(Vec<u8>, i64, bool)> {
        self.store.next_entry()
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.store.keys()
    }

    /// Entries in bucket order, independent of the cursor.
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

impl Default for KeyValBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl Persist for KeyValBytes {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        let start = w.written();
        self.store.write_to(w)?;
        trace!(keys = self.len(), bytes = w.written() - start, "wrote KeyValBytes");
        Ok(())
    }

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
        let store = ValueStore::read_from_with(r, config)?;
        trace!(keys = store.len(), "read KeyValBytes");
        Ok(Self { store })
    }
}
