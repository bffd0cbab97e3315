//! Binary writer/reader used to persist indexes.
//!
//! Fixed-width integers are little-endian. Lengths and counts use a
//! variable-length integer (LEB128, 1-10 bytes):
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - etc.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::Config;

/// Longest varint encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encodes `value` into `buf`, returning the number of bytes used.
pub fn encode_varint(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Number of bytes [`encode_varint`] uses for `value`.
pub fn varint_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Sink for persisted indexes.
pub struct Writer<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.put(&[v])
    }

    pub fn write_var_u64(&mut self, v: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(v, &mut buf);
        self.put(&buf[..n])
    }

    /// Writes a `usize` length as a varint.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        self.write_var_u64(len as u64)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Source for persisted indexes.
pub struct Reader<R: Read> {
    inner: R,
    read: u64,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, read: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.read
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.read += N as u64;
        Ok(buf)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.take::<1>()?;
        Ok(b)
    }

    pub fn read_var_u64(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            let low = (byte & 0x7F) as u64;
            if shift == 63 && low > 1 {
                break;
            }
            value |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(IndexError::Corrupt("varint overflows u64".into()))
    }

    /// Reads a varint length, rejecting values that do not fit in `usize`.
    pub fn read_len(&mut self) -> Result<usize> {
        let v = self.read_var_u64()?;
        usize::try_from(v).map_err(|_| IndexError::Corrupt(format!("length {v} overflows usize")))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Binary persistence shared by every index flavor.
pub trait Persist: Sized {
    fn write_to<W: Write>(&self, w: &mut Writer<W>) -> Result<()>;

    fn read_from_with<R: Read>(r: &mut Reader<R>, config: &Config) -> Result<Self>;

    fn read_from<R: Read>(r: &mut Reader<R>) -> Result<Self> {
        Self::read_from_with(r, &Config::default())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new(Vec::new());
        self.write_to(&mut w)?;
        Ok(w.into_inner())
    }

    /// Reads from a byte slice that must hold exactly one index.
    fn from_bytes_with(bytes: &[u8], config: &Config) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let out = Self::read_from_with(&mut r, config)?;
        let rest = r.into_inner();
        if !rest.is_empty() {
            return Err(IndexError::Corrupt(format!(
                "{} trailing bytes after index",
                rest.len()
            )));
        }
        Ok(out)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, &Config::default())
    }

    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut w = Writer::new(BufWriter::new(File::create(path)?));
        self.write_to(&mut w)?;
        w.flush()?;
        debug!(path = %path.display(), bytes = w.written(), "saved index");
        Ok(())
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &Config::default())
    }

    fn load_with(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before returning. The
        // file must not be truncated by another process while we read it.
        let map = unsafe { Mmap::map(&file)? };
        let out = Self::from_bytes_with(&map[..], config)?;
        debug!(path = %path.display(), bytes = map.len(), "loaded index");
        Ok(out)
    }
}
