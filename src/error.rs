//! Error types shared across the crate.
//!
//! Errors are grouped by kind rather than by source: the same `OutOfBounds`
//! is returned whether a tile index misses the cache grid or a pixel
//! coordinate falls outside a view. Validation errors are reported
//! synchronously at the API surface; errors raised inside the streaming
//! pipeline are latched by the engine and surfaced from
//! [`next_view_blocking`](crate::engine::Engine::next_view_blocking).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the engine, the cache and the feature collection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Tile indices or pixel coordinates outside the image, grid or view.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// A caller-supplied parameter is invalid (e.g. a non-power-of-two mask
    /// tile size, or a connectivity rank other than 4 or 8).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Tile read or file access failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed input: an unsupported sample layout, or a corrupt
    /// serialized feature stream.
    #[error("format error: {0}")]
    Format(String),

    /// Pool or buffer allocation failure.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Shorthand used by bounds checks on `(row, col)` pairs.
    pub(crate) fn bad_index(what: &str, row: u32, col: u32) -> Self {
        Error::OutOfBounds(format!("{what} ({row}, {col})"))
    }
}
