use std::fmt;
use std::io::Cursor;
use std::ops::Range;

use roaring::RoaringTreemap;

use crate::error::{Error, Result};

/// An ordered set of 64-bit positions backed by a Roaring treemap.
///
/// Iteration and serialization are always in ascending position order.
#[derive(Clone, Default, PartialEq)]
pub struct Bitmap {
    bits: RoaringTreemap,
}

impl Bitmap {
    /// Create an empty bitmap.
    pub fn new() -> Self {
        Bitmap {
            bits: RoaringTreemap::new(),
        }
    }

    /// Bitmap with every position in `range` set.
    pub fn from_range(range: Range<u64>) -> Self {
        let mut bits = RoaringTreemap::new();
        if range.start < range.end {
            bits.insert_range(range);
        }
        Bitmap { bits }
    }

    /// Set `pos`. Returns `true` if the bit was previously clear.
    pub fn set_bit(&mut self, pos: u64) -> bool {
        self.bits.insert(pos)
    }

    /// Clear `pos`. Returns `true` if the bit was previously set.
    pub fn clear_bit(&mut self, pos: u64) -> bool {
        self.bits.remove(pos)
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.bits.contains(pos)
    }

    /// Exact number of set positions.
    pub fn count(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Iterate set positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.bits.iter()
    }

    /// Number of positions set in both `self` and `other`.
    pub fn intersection_count(&self, other: &Bitmap) -> u64 {
        (&self.bits & &other.bits).len()
    }

    pub fn union(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            bits: &self.bits | &other.bits,
        }
    }

    pub fn intersect(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            bits: &self.bits & &other.bits,
        }
    }

    pub fn difference(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            bits: &self.bits - &other.bits,
        }
    }

    pub fn union_with(&mut self, other: &Bitmap) {
        self.bits |= &other.bits;
    }

    pub fn intersect_with(&mut self, other: &Bitmap) {
        self.bits &= &other.bits;
    }

    pub fn difference_with(&mut self, other: &Bitmap) {
        self.bits -= &other.bits;
    }

    /// Serialize into the portable Roaring format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.bits.serialized_size());
        // Writing into a Vec cannot fail.
        let _ = self.bits.serialize_into(&mut buf);
        buf
    }

    /// Rebuild a bitmap from [`Bitmap::to_bytes`] output.
    ///
    /// Truncated input, invalid containers and trailing bytes are all rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let bits = RoaringTreemap::deserialize_from(&mut cursor)
            .map_err(|e| Error::Decode(format!("invalid bitmap bytes: {}", e)))?;
        let consumed = cursor.position() as usize;
        if consumed != data.len() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after bitmap",
                data.len() - consumed
            )));
        }
        Ok(Bitmap { bits })
    }
}

impl FromIterator<u64> for Bitmap {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Bitmap {
            bits: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits.len() <= 16 {
            f.debug_set().entries(self.bits.iter()).finish()
        } else {
            write!(f, "Bitmap<{} bits>", self.bits.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_are_idempotent() {
        let mut bm = Bitmap::new();
        assert!(bm.set_bit(7));
        assert!(!bm.set_bit(7));
        assert_eq!(bm.count(), 1);
        assert!(bm.clear_bit(7));
        assert!(!bm.clear_bit(7));
        assert!(bm.is_empty());
    }

    #[test]
    fn from_range_handles_empty_and_wide_ranges() {
        assert!(Bitmap::from_range(5..5).is_empty());
        assert!(Bitmap::from_range(9..3).is_empty());
        let wide = Bitmap::from_range((u32::MAX as u64 - 2)..(u32::MAX as u64 + 3));
        assert_eq!(wide.count(), 5);
    }

    #[test]
    fn bytes_reject_trailing_garbage() {
        let bm: Bitmap = [1u64, 2, 1 << 40].into_iter().collect();
        let mut bytes = bm.to_bytes();
        assert_eq!(Bitmap::from_bytes(&bytes).unwrap(), bm);
        bytes.push(0xff);
        assert!(matches!(Bitmap::from_bytes(&bytes), Err(Error::Decode(_))));
        assert!(matches!(Bitmap::from_bytes(&[]), Err(Error::Decode(_))));
    }
}
