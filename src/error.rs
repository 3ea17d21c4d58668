//! Errors

use std::io;

use thiserror::Error;

/// Errors produced by this crate's reader.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("deku error: {0:?}")]
    Deku(#[from] deku::DekuError),

    #[error("corrupt image: {0}")]
    Corrupt(String),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotDir(String),

    #[error("unsupported entry type: {0}")]
    Unsupported(&'static str),

    #[error("range error: {0}")]
    Range(String),

    #[error("symlink chase exceeded depth cap")]
    Loop,

    #[error("allocation refused: {0}")]
    NoMem(String),
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        use Error::*;
        match value {
            Io(e) => e,
            Deku(e) => Self::new(io::ErrorKind::InvalidData, e),
            Corrupt(e) => Self::new(io::ErrorKind::InvalidData, e),
            e @ NotFound(_) => Self::new(io::ErrorKind::NotFound, e),
            e @ NotDir(_) => Self::new(io::ErrorKind::InvalidInput, e),
            e @ Unsupported(_) => Self::new(io::ErrorKind::Unsupported, e),
            e @ Range(_) => Self::new(io::ErrorKind::InvalidInput, e),
            e @ Loop => Self::new(io::ErrorKind::InvalidInput, e),
            e @ NoMem(_) => Self::new(io::ErrorKind::OutOfMemory, e),
        }
    }
}
