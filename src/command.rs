use std::fmt;
use std::time::SystemTime;

use crate::bitmap::Bitmap;
use crate::codec;
use crate::error::{Error, Result};
use crate::fragment::{FillArgs, Fragment, Pair};
use crate::handle::BitmapHandle;
use crate::storage::{StatsSnapshot, Storage};

/// Every operation a caller can run against a fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Materialize a persisted row into a handle.
    Get { row_id: u64 },
    Count { handle: BitmapHandle },
    Union { handles: Vec<BitmapHandle> },
    /// First operand minus the rest; order matters.
    Difference { handles: Vec<BitmapHandle> },
    Intersect { handles: Vec<BitmapHandle> },
    SetBit { row_id: u64, pos: u64, filter: u64 },
    ClearBit { row_id: u64, pos: u64 },
    /// Export a handle as a compressed frame.
    GetBytes { handle: BitmapHandle },
    /// Import a compressed frame as a new handle.
    FromBytes { frame: Vec<u8> },
    Empty,
    GetList { row_ids: Vec<u64> },
    TopN { handle: BitmapHandle, n: usize, categories: Vec<u64> },
    TopNAll { n: usize, categories: Vec<u64> },
    TopFill { args: FillArgs },
    Clear,
    /// Store a base64-wrapped compressed frame directly under `row_id`.
    Loader { row_id: u64, compressed: String, filter: u64 },
    Stats,
    /// Warm `row_id` in storage without allocating a handle.
    LoadRequest { row_id: u64 },
    Range { row_id: u64, start: SystemTime, end: SystemTime },
    Mask { start: u64, end: u64 },
}

impl Command {
    pub fn query_type(&self) -> &'static str {
        match self {
            Command::Get { .. } => "Get",
            Command::Count { .. } => "Count",
            Command::Union { .. } => "Union",
            Command::Difference { .. } => "Difference",
            Command::Intersect { .. } => "Intersect",
            Command::SetBit { .. } => "SetBit",
            Command::ClearBit { .. } => "ClearBit",
            Command::GetBytes { .. } => "GetBytes",
            Command::FromBytes { .. } => "FromBytes",
            Command::Empty => "Empty",
            Command::GetList { .. } => "GetList",
            Command::TopN { .. } => "TopN",
            Command::TopNAll { .. } => "TopNAll",
            Command::TopFill { .. } => "TopFill",
            Command::Clear => "Clear",
            Command::Loader { .. } => "Loader",
            Command::Stats => "Stats",
            Command::LoadRequest { .. } => "LoadRequest",
            Command::Range { .. } => "Range",
            Command::Mask { .. } => "Mask",
        }
    }

    /// Whether this command changes persisted shard state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::SetBit { .. }
                | Command::ClearBit { .. }
                | Command::Clear
                | Command::Loader { .. }
        )
    }
}

/// Outcome of a status-only command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The command was skipped; shard state is unchanged.
    NotApplied,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("ok"),
            Status::NotApplied => f.write_str("not applied"),
        }
    }
}

/// The result of executing a [`Command`].
#[derive(Clone, Debug, PartialEq)]
pub enum Calculation {
    Handle(BitmapHandle),
    Count(u64),
    /// Whether a bit mutation changed state.
    Changed(bool),
    Bytes(Vec<u8>),
    Handles(Vec<BitmapHandle>),
    Pairs(Vec<Pair>),
    Status(Status),
    Stats(StatsSnapshot),
    Error(Error),
}

impl Calculation {
    pub fn handle(&self) -> Option<BitmapHandle> {
        match self {
            Calculation::Handle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            Calculation::Count(c) => Some(*c),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Option<&[Pair]> {
        match self {
            Calculation::Pairs(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Calculation::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Calculation::Error(_))
    }
}

impl<T> From<Result<T>> for Calculation
where
    T: Into<Calculation>,
{
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(v) => v.into(),
            Err(e) => Calculation::Error(e),
        }
    }
}

impl From<BitmapHandle> for Calculation {
    fn from(h: BitmapHandle) -> Self {
        Calculation::Handle(h)
    }
}

impl From<Vec<Pair>> for Calculation {
    fn from(p: Vec<Pair>) -> Self {
        Calculation::Pairs(p)
    }
}

impl From<Vec<BitmapHandle>> for Calculation {
    fn from(h: Vec<BitmapHandle>) -> Self {
        Calculation::Handles(h)
    }
}

impl From<Vec<u8>> for Calculation {
    fn from(b: Vec<u8>) -> Self {
        Calculation::Bytes(b)
    }
}

impl From<bool> for Calculation {
    fn from(changed: bool) -> Self {
        Calculation::Changed(changed)
    }
}

impl From<()> for Calculation {
    fn from(_: ()) -> Self {
        Calculation::Status(Status::Ok)
    }
}

impl<S: Storage> Fragment<S> {
    /// Run one command to completion. Errors are returned inside the calculation.
    pub fn execute(&mut self, command: Command) -> Calculation {
        match command {
            Command::Get { row_id } => self.new_handle(row_id).into(),
            Command::Count { handle } => {
                Calculation::Count(self.bitmap(handle).map_or(0, Bitmap::count))
            }
            Command::Union { handles } => self.union(&handles).into(),
            Command::Difference { handles } => self.difference(&handles).into(),
            Command::Intersect { handles } => self.intersect(&handles).into(),
            Command::SetBit {
                row_id,
                pos,
                filter,
            } => self.set_bit(row_id, pos, filter).into(),
            Command::ClearBit { row_id, pos } => self.clear_bit(row_id, pos).into(),
            Command::GetBytes { handle } => self.export(handle).into(),
            Command::FromBytes { frame } => self.import(&frame).into(),
            Command::Empty => Calculation::Handle(self.alloc_handle(Bitmap::new())),
            Command::GetList { row_ids } => row_ids
                .iter()
                .map(|&id| self.new_handle(id))
                .collect::<Result<Vec<_>>>()
                .into(),
            Command::TopN {
                handle,
                n,
                categories,
            } => self.top_n(handle, n, &categories).into(),
            Command::TopNAll { n, categories } => self.top_n_all(n, &categories).into(),
            Command::TopFill { args } => self.top_fill(&args).into(),
            Command::Clear => self.clear().into(),
            Command::Loader {
                row_id,
                compressed,
                filter,
            } => self.load(row_id, &compressed, filter),
            Command::Stats => Calculation::Stats(self.stats()),
            Command::LoadRequest { row_id } => self.get(row_id).map(|_| ()).into(),
            Command::Range { row_id, start, end } => self.time_range(row_id, start, end).into(),
            Command::Mask { start, end } => Calculation::Handle(self.mask(start, end)),
        }
    }

    // Bulk loads keep going past bad records: a decode failure is logged and skipped.
    fn load(&mut self, row_id: u64, compressed: &str, filter: u64) -> Calculation {
        match codec::decode_base64(compressed) {
            Ok(bitmap) => match self.store(row_id, bitmap, filter) {
                Ok(()) => Calculation::Status(Status::Ok),
                Err(e) => Calculation::Error(e),
            },
            Err(e) => {
                tracing::warn!(row_id, error = %e, "skipping undecodable bitmap");
                Calculation::Status(Status::NotApplied)
            }
        }
    }
}
