use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::bitmap::Bitmap;

// Handle layout: table id (24 bits) | sequence (40 bits). Neither part is
// ever zero. Table ids repeat after 2^24 tables, so at most that many tables
// can be told apart while alive at once.
const SEQ_BITS: u32 = 40;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;
const TABLE_MASK: u64 = (1 << (64 - SEQ_BITS)) - 1;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a bitmap held in one fragment's handle table.
///
/// The raw value `0` is reserved and never allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitmapHandle(u64);

impl BitmapHandle {
    pub const NONE: BitmapHandle = BitmapHandle(0);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    fn table_id(self) -> u64 {
        self.0 >> SEQ_BITS
    }
}

impl From<u64> for BitmapHandle {
    fn from(raw: u64) -> Self {
        BitmapHandle(raw)
    }
}

impl fmt::Display for BitmapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Transient bitmaps materialized during query evaluation, keyed by handle.
///
/// Every table carries a process-unique id that is packed into the handles it
/// hands out, so a handle only ever resolves against the table that made it.
/// Sequence numbers keep increasing across [`HandleTable::reset`].
pub struct HandleTable {
    id: u64,
    next_seq: u64,
    bitmaps: FxHashMap<BitmapHandle, Bitmap>,
}

impl HandleTable {
    pub fn new() -> Self {
        let id = next_table_id();
        HandleTable {
            id,
            next_seq: 1,
            bitmaps: FxHashMap::default(),
        }
    }

    /// Store `bitmap` and return a fresh handle for it.
    pub fn alloc(&mut self, bitmap: Bitmap) -> BitmapHandle {
        let seq = self.next_seq;
        self.next_seq = if seq == SEQ_MASK { 1 } else { seq + 1 };
        let handle = BitmapHandle((self.id << SEQ_BITS) | seq);
        self.bitmaps.insert(handle, bitmap);
        handle
    }

    pub fn get(&self, handle: BitmapHandle) -> Option<&Bitmap> {
        if handle.is_none() || handle.table_id() != self.id {
            return None;
        }
        self.bitmaps.get(&handle)
    }

    pub fn contains(&self, handle: BitmapHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    /// Drop every allocated bitmap. Outstanding handles stop resolving.
    pub fn reset(&mut self) {
        self.bitmaps.clear();
    }
}

fn next_table_id() -> u64 {
    loop {
        let id = NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed) & TABLE_MASK;
        if id != 0 {
            return id;
        }
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
