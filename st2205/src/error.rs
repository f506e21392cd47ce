//! Error types for the ST2205 driver

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a block device", .0.display())]
    NotBlockDevice(PathBuf),

    #[error("device does not carry the Sitronix signature")]
    NotPhotoFrame,

    #[error("panel descriptor: {0}")]
    Descriptor(String),

    #[error("unsupported panel: protocol {protocol}, {bpp} bpp")]
    UnsupportedProtocol { protocol: u8, bpp: u8 },

    #[error("out of range: {0}")]
    Range(String),

    #[error("short write at 0x{offset:x}: {written} of {expected} bytes")]
    ShortWrite {
        offset: u64,
        expected: usize,
        written: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes callers decide retry policy on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device missing, wrong type or unreadable descriptor. Fatal.
    Open,
    /// Device write failed or was short. The shadow buffer is untouched, so
    /// the same operation may be retried.
    Io,
    /// Rectangle or buffer size violates the panel geometry.
    Range,
    /// Descriptor names a protocol/bpp combination without an encoder.
    UnsupportedProtocol,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. }
            | Error::NotBlockDevice(_)
            | Error::NotPhotoFrame
            | Error::Descriptor(_) => ErrorKind::Open,
            Error::UnsupportedProtocol { .. } => ErrorKind::UnsupportedProtocol,
            Error::Range(_) => ErrorKind::Range,
            Error::ShortWrite { .. } | Error::Io(_) => ErrorKind::Io,
        }
    }
}
