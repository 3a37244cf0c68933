use thiserror::Error;

use crate::handle::BitmapHandle;

/// Errors produced while executing commands against a fragment.
///
/// Every variant carries owned, comparable data so an error can be posted
/// back through a responder as part of a [`crate::Calculation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed serialized or compressed bitmap input.
    #[error("decode error: {0}")]
    Decode(String),
    /// A bitmap could not be compressed for transfer.
    #[error("encode error: {0}")]
    Encode(String),
    /// A referenced handle is not allocated in this fragment's table.
    #[error("bitmap handle {0} not found")]
    HandleNotFound(BitmapHandle),
    /// The submission path has no usable client or executor.
    #[error("client unavailable: {0}")]
    ClientUnavailable(String),
    /// The storage collaborator rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),
    /// The fragment executor stopped before answering.
    #[error("fragment executor closed")]
    ExecutorClosed,
    /// A command answered with a result of the wrong shape.
    #[error("unexpected {0} result")]
    UnexpectedResult(&'static str),
    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
