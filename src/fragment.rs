use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::codec;
use crate::config::{FragmentConfig, HandleRetention};
use crate::error::{Error, Result};
use crate::handle::{BitmapHandle, HandleTable};
use crate::storage::{StatsSnapshot, Storage};

/// A ranked `(row id, count)` result element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub id: u64,
    pub count: u64,
}

/// Parameters for [`Fragment::top_fill`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillArgs {
    /// Filter bitmap; `None` or [`BitmapHandle::NONE`] reports raw row counts.
    pub handle: Option<BitmapHandle>,
    /// Candidate row ids.
    pub rows: Vec<u64>,
}

/// One shard's executor state: persisted bit data plus the handle table.
///
/// All methods take `&mut self` or `&self` and assume a single caller; see
/// [`crate::FragmentExecutor`] for the queue that serializes access.
pub struct Fragment<S: Storage> {
    storage: S,
    handles: HandleTable,
    config: FragmentConfig,
}

impl<S: Storage> Fragment<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, FragmentConfig::default())
    }

    pub fn with_config(storage: S, config: FragmentConfig) -> Self {
        Fragment {
            storage,
            handles: HandleTable::new(),
            config,
        }
    }

    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Number of live handles.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn alloc_handle(&mut self, bitmap: Bitmap) -> BitmapHandle {
        self.handles.alloc(bitmap)
    }

    pub fn bitmap(&self, handle: BitmapHandle) -> Option<&Bitmap> {
        self.handles.get(handle)
    }

    fn require(&self, handle: BitmapHandle) -> Result<&Bitmap> {
        self.handles
            .get(handle)
            .ok_or(Error::HandleNotFound(handle))
    }

    /// Materialize persisted row `row_id` into a fresh handle.
    pub fn new_handle(&mut self, row_id: u64) -> Result<BitmapHandle> {
        let bitmap = self.storage.get(row_id)?;
        Ok(self.handles.alloc(bitmap))
    }

    pub fn exists(&self, row_id: u64) -> bool {
        self.storage.exists(row_id)
    }

    /// Close the current query scope, dropping handles under [`HandleRetention::PerQuery`].
    pub fn end_query(&mut self) {
        if self.config.handle_retention == HandleRetention::PerQuery {
            self.handles.reset();
        }
    }

    fn collect(&self, handles: &[BitmapHandle]) -> Result<Vec<&Bitmap>> {
        handles.iter().map(|h| self.require(*h)).collect()
    }

    pub fn union(&mut self, handles: &[BitmapHandle]) -> Result<BitmapHandle> {
        let mut result = Bitmap::new();
        for bm in self.collect(handles)? {
            result.union_with(bm);
        }
        Ok(self.handles.alloc(result))
    }

    pub fn intersect(&mut self, handles: &[BitmapHandle]) -> Result<BitmapHandle> {
        let bitmaps = self.collect(handles)?;
        let result = match bitmaps.split_first() {
            Some((first, rest)) => {
                let mut acc = (*first).clone();
                for bm in rest {
                    if acc.is_empty() {
                        break;
                    }
                    acc.intersect_with(bm);
                }
                acc
            }
            None => Bitmap::new(),
        };
        Ok(self.handles.alloc(result))
    }

    /// `handles[0]` minus every following operand.
    pub fn difference(&mut self, handles: &[BitmapHandle]) -> Result<BitmapHandle> {
        let bitmaps = self.collect(handles)?;
        let result = match bitmaps.split_first() {
            Some((first, rest)) => {
                let mut acc = (*first).clone();
                for bm in rest {
                    acc.difference_with(bm);
                }
                acc
            }
            None => Bitmap::new(),
        };
        Ok(self.handles.alloc(result))
    }

    /// Rows in `categories` (or every row, when empty) ranked by their overlap with `handle`.
    pub fn top_n(
        &mut self,
        handle: BitmapHandle,
        n: usize,
        categories: &[u64],
    ) -> Result<Vec<Pair>> {
        let base = self.require(handle)?.clone();
        self.rank(n, categories, |row| base.intersection_count(row))
    }

    /// Rows in `categories` (or every row) ranked by raw cardinality.
    pub fn top_n_all(&mut self, n: usize, categories: &[u64]) -> Result<Vec<Pair>> {
        self.rank(n, categories, Bitmap::count)
    }

    fn rank<F>(&mut self, n: usize, categories: &[u64], score: F) -> Result<Vec<Pair>>
    where
        F: Fn(&Bitmap) -> u64,
    {
        let ids = if categories.is_empty() {
            self.storage.row_ids()
        } else {
            categories.to_vec()
        };
        let mut pairs = Vec::new();
        for id in ids {
            let count = score(&self.storage.get(id)?);
            if count > 0 {
                pairs.push(Pair { id, count });
            }
        }
        pairs.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        pairs.dedup_by_key(|p| p.id);
        pairs.truncate(n);
        Ok(pairs)
    }

    /// Counts for each existing candidate row, in candidate order, zero counts dropped.
    pub fn top_fill(&mut self, args: &FillArgs) -> Result<Vec<Pair>> {
        let filter = match args.handle.filter(|h| !h.is_none()) {
            Some(h) => Some(self.require(h)?.clone()),
            None => None,
        };
        let mut result = Vec::new();
        for &id in &args.rows {
            if !self.storage.exists(id) {
                continue;
            }
            let row = self.storage.get(id)?;
            let count = match &filter {
                Some(f) => f.intersection_count(&row),
                None => row.count(),
            };
            if count > 0 {
                result.push(Pair { id, count });
            }
        }
        Ok(result)
    }

    pub fn time_range(
        &mut self,
        row_id: u64,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<BitmapHandle> {
        let bitmap = self.storage.range(row_id, start, end)?;
        Ok(self.handles.alloc(bitmap))
    }

    /// Handle for a bitmap with every position in `[start, end)` set.
    pub fn mask(&mut self, start: u64, end: u64) -> BitmapHandle {
        self.handles.alloc(Bitmap::from_range(start..end))
    }

    /// Export a handle as a compressed frame; a missing handle exports as empty.
    pub fn export(&self, handle: BitmapHandle) -> Result<Vec<u8>> {
        match self.handles.get(handle) {
            Some(bm) => codec::encode(bm, self.config.compression_level),
            None => {
                tracing::warn!(handle = %handle, "handle missing, exporting empty bitmap");
                codec::encode(&Bitmap::new(), self.config.compression_level)
            }
        }
    }

    /// Decode a compressed frame into a new handle. Nothing is allocated on failure.
    pub fn import(&mut self, frame: &[u8]) -> Result<BitmapHandle> {
        let bitmap = codec::decode(frame)?;
        Ok(self.handles.alloc(bitmap))
    }

    pub fn get(&mut self, row_id: u64) -> Result<Bitmap> {
        self.storage.get(row_id)
    }

    pub fn set_bit(&mut self, row_id: u64, pos: u64, filter: u64) -> Result<bool> {
        self.storage.set_bit(row_id, pos, filter)
    }

    pub fn clear_bit(&mut self, row_id: u64, pos: u64) -> Result<bool> {
        self.storage.clear_bit(row_id, pos)
    }

    pub fn store(&mut self, row_id: u64, bitmap: Bitmap, filter: u64) -> Result<()> {
        self.storage.store(row_id, bitmap, filter)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.storage.clear()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.storage.stats()
    }
}
