//! Packing of byte keys into big-endian `u64` words.
//!
//! A key of `n` bytes (1..=64) becomes `ceil(n / 8)` words. Every word holds
//! eight consecutive key bytes read big-endian; the last word may be partial,
//! in which case its bytes sit at the high-order end and the missing low-order
//! bytes are zero. Comparing two packed keys of the same length word by word
//! therefore gives the same answer as comparing the original bytes.
//!
//! Alongside the words we keep a *tag* (`(n - 1) % 8`) naming how many bytes of
//! the last word are significant. Length class (`words - 1`) and tag together
//! recover the exact key length, which is why zero bytes in a key survive the
//! round trip.

use smallvec::SmallVec;

/// Longest key accepted by the byte indexes.
pub const MAX_KEY_LEN: usize = 64;

/// Number of length classes (1-8, 9-16, ..., 57-64 bytes).
pub const LENGTH_CLASSES: usize = 8;

/// Number of remainder buckets inside each length class.
pub const REMAINDERS: usize = 8;

/// Total number of independent sorted arrays.
pub const SLOTS: usize = LENGTH_CLASSES * REMAINDERS;

/// A key packed into words, ready for comparison against bucket tuples.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackedKey {
    words: SmallVec<[u64; LENGTH_CLASSES]>,
    tag: u8,
}

impl PackedKey {
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Length class, `0..8`.
    #[inline]
    pub fn class(&self) -> usize {
        self.words.len() - 1
    }

    /// Remainder tag, `0..8`.
    #[inline]
    pub fn tag(&self) -> usize {
        self.tag as usize
    }

    /// Bucket slot in canonical (class-major) order.
    #[inline]
    pub fn slot(&self) -> usize {
        slot_of(self.class(), self.tag())
    }

    /// Length in bytes of the key this was packed from.
    #[inline]
    pub fn byte_len(&self) -> usize {
        key_len(self.class(), self.tag())
    }

    pub fn unpack(&self) -> Vec<u8> {
        unpack(&self.words, self.tag)
    }
}

#[inline]
pub fn slot_of(class: usize, tag: usize) -> usize {
    debug_assert!(class < LENGTH_CLASSES && tag < REMAINDERS);
    class * REMAINDERS + tag
}

/// Splits a slot back into `(class, tag)`.
#[inline]
pub fn split_slot(slot: usize) -> (usize, usize) {
    (slot / REMAINDERS, slot % REMAINDERS)
}

/// Exact byte length of every key stored under `(class, tag)`.
#[inline]
pub fn key_len(class: usize, tag: usize) -> usize {
    class * 8 + tag + 1
}

/// Number of key words stored by every tuple in `slot`.
#[inline]
pub fn slot_words(slot: usize) -> usize {
    slot / REMAINDERS + 1
}

/// Reads up to eight bytes as a big-endian word, left-justified.
#[inline]
fn load_word(chunk: &[u8]) -> u64 {
    debug_assert!(!chunk.is_empty() && chunk.len() <= 8);
    let mut buf = [0u8; 8];
    buf[..chunk.len()].copy_from_slice(chunk);
    u64::from_be_bytes(buf)
}

/// Packs `key`, or returns `None` when it is longer than [`MAX_KEY_LEN`].
///
/// The empty key packs exactly like the one-byte key `[0x00]`.
pub fn pack(key: &[u8]) -> Option<PackedKey> {
    if key.len() > MAX_KEY_LEN {
        return None;
    }
    if key.is_empty() {
        return Some(PackedKey {
            words: SmallVec::from_elem(0, 1),
            tag: 0,
        });
    }
    let words = key.chunks(8).map(load_word).collect();
    Some(PackedKey {
        words,
        tag: ((key.len() - 1) % 8) as u8,
    })
}

/// Inverse of [`pack`]: `words` are the key words of one tuple.
///
/// The number of significant bytes in the last word comes from `tag`, never
/// from scanning for zero bytes.
pub fn unpack(words: &[u64], tag: u8) -> Vec<u8> {
    debug_assert!(!words.is_empty() && words.len() <= LENGTH_CLASSES);
    let len = key_len(words.len() - 1, tag as usize);
    let mut out = Vec::with_capacity(words.len() * 8);
    for w in words {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_short() {
        let p = pack(b"abc").unwrap();
        assert_eq!(p.class(), 0);
        assert_eq!(p.tag(), 2);
        assert_eq!(p.slot(), 2);
        assert_eq!(p.words(), &[0x6162_6300_0000_0000]);
        assert_eq!(p.unpack(), b"abc");
    }

    #[test]
    fn test_pack_boundaries() {
        let eight = pack(b"12345678").unwrap();
        assert_eq!((eight.class(), eight.tag()), (0, 7));

        let nine = pack(b"123456789").unwrap();
        assert_eq!((nine.class(), nine.tag()), (1, 0));
        assert_eq!(nine.words().len(), 2);

        let max = pack(&[0xFF; 64]).unwrap();
        assert_eq!(max.slot(), SLOTS - 1);
        assert_eq!(max.byte_len(), 64);

        assert!(pack(&[0u8; 65]).is_none());
    }

    #[test]
    fn test_empty_key_is_single_zero() {
        let empty = pack(b"").unwrap();
        assert_eq!(empty, pack(&[0]).unwrap());
        assert_eq!(empty.unpack(), vec![0]);
    }

    #[test]
    fn test_trailing_zero_bytes_survive() {
        let key = [1u8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let p = pack(&key).unwrap();
        assert_eq!(p.unpack(), key);

        let zeros = [0u8; 17];
        assert_eq!(pack(&zeros).unwrap().unpack(), zeros);
    }

    #[test]
    fn test_roundtrip_all_lengths() {
        for len in 1..=MAX_KEY_LEN {
            let key: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let p = pack(&key).unwrap();
            assert_eq!(p.byte_len(), len);
            assert_eq!(slot_words(p.slot()), p.words().len());
            assert_eq!(split_slot(p.slot()), (p.class(), p.tag()));
            assert_eq!(p.unpack(), key, "len {len}");
        }
    }

    #[test]
    fn test_order_matches_bytes() {
        let keys: [&[u8]; 5] = [b"aaaaaaaaaa", b"aaaaaaaaab", b"aaaaaaabaa", b"abaaaaaaaa", b"zzzzzzzzzz"];
        for pair in keys.windows(2) {
            let a = pack(pair[0]).unwrap();
            let b = pack(pair[1]).unwrap();
            assert!(a.words() < b.words());
        }
    }
}
