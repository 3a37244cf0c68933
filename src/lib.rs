//! Per-shard query execution for a distributed bitmap index.
//!
//! A [`Fragment`] owns one shard's persisted bits (through a [`Storage`]
//! implementation) and a table of transient bitmap handles. Callers build a
//! [`Command`], hand it to the fragment's [`FragmentExecutor`] queue and await
//! the [`Calculation`] it produces.

pub mod bench;
mod bitmap;
pub mod codec;
mod command;
mod config;
mod error;
mod executor;
mod fragment;
mod handle;
mod responder;
pub mod router;
mod storage;

pub use bitmap::Bitmap;
pub use command::{Calculation, Command, Status};
pub use config::{FragmentConfig, HandleRetention};
pub use error::{Error, Result};
pub use executor::{FragmentExecutor, FragmentHandle};
pub use fragment::{FillArgs, Fragment, Pair};
pub use handle::{BitmapHandle, HandleTable};
pub use responder::{Pending, QueryResult, Request, Responder};
pub use router::{FragmentKey, ShardRouter};
pub use storage::{MemoryStorage, StatsSnapshot, Storage};
