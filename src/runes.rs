//! Text-key adapters over the byte indexes.
//!
//! Keys are stored as their UTF-8 encoding, so the 64-byte cap applies to
//! the encoded form: 64 ASCII characters, but only 16 four-byte ones.

use std::io::{Read, Write};

use crate::codec::{Persist, Reader, Writer};
use crate::error::Result;
use crate::{Config, CounterBytes, KeyBytes, KeyValBytes};

/// Stored keys were all valid `&str`, but a dump read from disk may not be.
fn text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// [`KeyBytes`] over string keys.
#[derive(Clone, Debug, Default)]
pub struct KeyRunes {
    inner: KeyBytes,
}

impl KeyRunes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            inner: KeyBytes::with_config(config),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn find(&self, key: &str) -> (usize, bool) {
        self.inner.find(key.as_bytes())
    }

    pub fn add(&mut self, key: &str) -> Result<(usize, bool)> {
        self.inner.add(key.as_bytes())
    }

    pub fn add_at(&mut self, key: &str, rank: usize) -> Result<()> {
        self.inner.add_at(key.as_bytes(), rank)
    }

    pub fn add_unsorted(&mut self, key: &str) -> Result<()> {
        self.inner.add_unsorted(key.as_bytes())
    }

    pub fn build(&mut self) -> Result<Vec<usize>> {
        self.inner.build()
    }

    pub fn reset(&mut self) {
        self.inner.reset()
    }

    pub fn next_key(&mut self) -> Option<(String, bool)> {
        self.inner.next_key().map(|(k, last)| (text(k), last))
    }

    pub fn keys(&self) -> Vec<String> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.inner.iter().map(text)
    }

    pub fn as_bytes_index(&self) -> &KeyBytes {
        &self.inner
    }

    pub fn into_inner(self) -> KeyBytes {
        self.inner
    }
}

/// [`KeyValBytes`] over string keys.
#[derive(Clone, Debug, Default)]
pub struct KeyValRunes {
    inner: KeyValBytes,
}

impl KeyValRunes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            inner: KeyValBytes::with_config(config),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn find(&self, key: &str) -> Option<i64> {
        self.inner.find(key.as_bytes())
    }

    pub fn update(&mut self, key: &str, f: impl FnOnce(i64) -> i64) -> bool {
        self.inner.update(key.as_bytes(), f)
    }

    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.inner.update_all(f)
    }

    pub fn add(&mut self, key: &str, value: i64) -> Result<bool> {
        self.inner.add(key.as_bytes(), value)
    }

    pub fn add_unsorted(&mut self, key: &str, value: i64) -> Result<()> {
        self.inner.add_unsorted(key.as_bytes(), value)
    }

    pub fn build(&mut self) {
        self.inner.build()
    }

    pub fn reset(&mut self) {
        self.inner.reset()
    }

    pub fn next_entry(&mut self) -> Option<(String, i64, bool)> {
        self.inner
            .next_entry()
            .map(|(k, v, last)| (text(k), v, last))
    }

    pub fn keys(&self) -> Vec<String> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, i64)> + '_ {
        self.inner.iter().map(|(k, v)| (text(k), v))
    }

    pub fn as_bytes_index(&self) -> &KeyValBytes {
        &self.inner
    }

    pub fn into_inner(self) -> KeyValBytes {
        self.inner
    }
}

/// [`CounterBytes`] over string keys.
#[derive(Clone, Debug, Default)]
pub struct CounterRunes {
    inner: CounterBytes,
}

impl CounterRunes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            inner: CounterBytes::with_config(config),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn find(&self, key: &str) -> Option<i64> {
        self.inner.find(key.as_bytes())
    }

    pub fn update(&mut self, key: &str, f: impl FnOnce(i64) -> i64) -> bool {
        self.inner.update(key.as_bytes(), f)
    }

    pub fn update_all(&mut self, f: impl FnMut(i64) -> i64) {
        self.inner.update_all(f)
    }

    pub fn add(&mut self, key: &str, value: i64) -> Result<()> {
        self.inner.add(key.as_bytes(), value)
    }

    pub fn build(&mut self) {
        self.inner.build()
    }

    pub fn reset(&mut self) {
        self.inner.reset()
    }

    pub fn next_entry(&mut self) -> Option<(String, i64, bool)> {
        self.inner
            .next_entry()
            .map(|(k, v, last)| (text(k), v, last))
    }

    pub fn keys(&self) -> Vec<String> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, i64)> + '_ {
        self.inner.iter().map(|(k, v)| (text(k), v))
    }

    pub fn as_bytes_index(&self) -> &CounterBytes {
        &self.inner
    }

    pub fn into_inner(self) -> CounterBytes {
        self.inner
    }
}

macro_rules! persist_via_inner {
    ($($outer:ty => $inner:ty),* $(,)?) => {$(
        impl Persist for $outer {
            fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
                self.inner.write_to(w)
            }

            fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self> {
                Ok(Self {
                    inner: <$inner>::read_from_with(r, config)?,
                })
            }
        }
    )*};
}

persist_via_inner!(
    KeyRunes => KeyBytes,
    KeyValRunes => KeyValBytes,
    CounterRunes => CounterBytes,
);
