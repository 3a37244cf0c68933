use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::error::Result;

/// Point-in-time counters reported by a storage backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Rows with at least one set bit.
    pub rows: u64,
    /// Set bits across all rows.
    pub bits: u64,
    /// Non-empty time buckets across all rows.
    pub buckets: u64,
    /// `set_bit` calls that changed state.
    pub bits_set: u64,
    /// `clear_bit` calls that changed state.
    pub bits_cleared: u64,
}

/// Persisted bit data for one (index, frame, slice).
///
/// A fragment owns exactly one storage value and calls it from a single
/// executor, so implementations need no internal locking.
///
/// `filter` is an opaque tag attached to a mutation. The in-memory backend
/// reads it as a time bucket in unix seconds, with `0` meaning untimed.
pub trait Storage: Send + 'static {
    /// Snapshot of `row_id`, or an empty bitmap if the row is absent.
    fn get(&mut self, row_id: u64) -> Result<Bitmap>;

    /// Whether `row_id` has any persisted bits.
    fn exists(&self, row_id: u64) -> bool;

    /// Every row identifier with persisted bits, ascending.
    fn row_ids(&self) -> Vec<u64>;

    /// Replace `row_id` with `bitmap`, or with a non-zero `filter`, replace
    /// that bucket and merge its bits into the row.
    fn store(&mut self, row_id: u64, bitmap: Bitmap, filter: u64) -> Result<()>;

    fn set_bit(&mut self, row_id: u64, pos: u64, filter: u64) -> Result<bool>;

    fn clear_bit(&mut self, row_id: u64, pos: u64) -> Result<bool>;

    /// Remove all rows.
    fn clear(&mut self) -> Result<()>;

    fn stats(&self) -> StatsSnapshot;

    /// Positions of `row_id` recorded under filters within `[start, end)`.
    fn range(&mut self, row_id: u64, start: SystemTime, end: SystemTime) -> Result<Bitmap>;
}

#[derive(Default)]
struct Row {
    bits: Bitmap,
    buckets: BTreeMap<u64, Bitmap>,
}

/// In-memory storage keeping each row plus its per-bucket bitmaps.
#[derive(Default)]
pub struct MemoryStorage {
    rows: FxHashMap<u64, Row>,
    bits_set: u64,
    bits_cleared: u64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl Storage for MemoryStorage {
    fn get(&mut self, row_id: u64) -> Result<Bitmap> {
        Ok(self
            .rows
            .get(&row_id)
            .map(|row| row.bits.clone())
            .unwrap_or_default())
    }

    fn exists(&self, row_id: u64) -> bool {
        self.rows
            .get(&row_id)
            .map_or(false, |row| !row.bits.is_empty())
    }

    fn row_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .rows
            .iter()
            .filter(|(_, row)| !row.bits.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    // Every bucket stays a subset of its row's bits.
    fn store(&mut self, row_id: u64, bitmap: Bitmap, filter: u64) -> Result<()> {
        let row = self.rows.entry(row_id).or_default();
        if filter != 0 {
            row.bits.union_with(&bitmap);
            row.buckets.insert(filter, bitmap);
        } else {
            row.buckets.retain(|_, bucket| {
                bucket.intersect_with(&bitmap);
                !bucket.is_empty()
            });
            row.bits = bitmap;
        }
        if row.bits.is_empty() && row.buckets.is_empty() {
            self.rows.remove(&row_id);
        }
        Ok(())
    }

    fn set_bit(&mut self, row_id: u64, pos: u64, filter: u64) -> Result<bool> {
        let row = self.rows.entry(row_id).or_default();
        let changed = row.bits.set_bit(pos);
        if filter != 0 {
            row.buckets.entry(filter).or_default().set_bit(pos);
        }
        if changed {
            self.bits_set += 1;
        }
        Ok(changed)
    }

    fn clear_bit(&mut self, row_id: u64, pos: u64) -> Result<bool> {
        let Some(row) = self.rows.get_mut(&row_id) else {
            return Ok(false);
        };
        let changed = row.bits.clear_bit(pos);
        row.buckets.retain(|_, bucket| {
            bucket.clear_bit(pos);
            !bucket.is_empty()
        });
        if row.bits.is_empty() && row.buckets.is_empty() {
            self.rows.remove(&row_id);
        }
        if changed {
            self.bits_cleared += 1;
        }
        Ok(changed)
    }

    fn clear(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn stats(&self) -> StatsSnapshot {
        let mut stats = StatsSnapshot {
            bits_set: self.bits_set,
            bits_cleared: self.bits_cleared,
            ..Default::default()
        };
        for row in self.rows.values() {
            if !row.bits.is_empty() {
                stats.rows += 1;
                stats.bits += row.bits.count();
            }
            stats.buckets += row.buckets.values().filter(|b| !b.is_empty()).count() as u64;
        }
        stats
    }

    fn range(&mut self, row_id: u64, start: SystemTime, end: SystemTime) -> Result<Bitmap> {
        let (lo, hi) = (unix_seconds(start).max(1), unix_seconds(end));
        let mut result = Bitmap::new();
        if lo >= hi {
            return Ok(result);
        }
        if let Some(row) = self.rows.get(&row_id) {
            for bucket in row.buckets.range(lo..hi).map(|(_, b)| b) {
                result.union_with(bucket);
            }
        }
        Ok(result)
    }
}
