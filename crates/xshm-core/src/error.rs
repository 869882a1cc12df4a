//! Error types for xshm

use thiserror::Error;

use crate::dtype::ElementType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("count must be {min} .. {max}, got {count}")]
    InvalidCount {
        count: usize,
        min: usize,
        max: usize,
    },

    #[error("key must be {min} .. {max}, got {key}")]
    InvalidKey { key: u32, min: u32, max: u32 },

    #[error("invalid segment name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("unknown element type code {0}")]
    UnknownType(u8),

    #[error("key space exhausted after {0} attempts")]
    KeySpaceExhausted(usize),

    #[error("segment length {len} is not a multiple of element width {width}")]
    IndivisibleLength { len: usize, width: usize },

    #[error("element type mismatch: segment is {segment:?}, requested {requested:?}")]
    TypeMismatch {
        segment: ElementType,
        requested: ElementType,
    },

    #[error("access denied: segment is attached read-only")]
    ReadOnly,

    #[error("segment already detached")]
    Detached,

    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn os(op: &'static str, source: std::io::Error) -> Self {
        Error::Os { op, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
