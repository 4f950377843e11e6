use frame::FrameError;
use mapping::MappingError;
use thiserror::Error;

/// Errors surfaced by the log core.
///
/// Nothing here is retried internally; every failure is reported to the
/// caller once, typed. Errors that report corruption
/// ([`LogError::FrameCorrupt`]) leave the reporting iterator's cursor
/// exactly where it was, so the caller can retry, diagnose, or bail without
/// having skipped or double-read bytes.
#[derive(Debug, Error)]
pub enum LogError {
    /// Allocation would advance past the last segment. There is no
    /// wraparound; this writer cannot recover without a larger log.
    #[error("log exhausted: frame of {requested} bytes does not fit ({remaining} bytes remain)")]
    Exhausted { requested: u64, remaining: u64 },

    /// A frame's prefix/suffix self-check failed, or a length field is
    /// outside the well-formed range.
    #[error("frame corrupt at address {address}: {reason}")]
    FrameCorrupt { address: u64, reason: String },

    /// A random-access address or size is out of bounds.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: u64, reason: String },

    /// A cursor (start position or seek target) is out of range or does not
    /// sit on a frame boundary.
    #[error("invalid cursor {address}: {reason}")]
    CursorInvalid { address: u64, reason: String },

    /// The shared header itself is inconsistent.
    #[error("log header invalid: {0}")]
    Header(String),

    /// A frame would straddle a segment boundary wider than the overlap
    /// window, so readers could never see it contiguously.
    #[error("frame of {frame_len} bytes straddles a segment boundary wider than the {overlap}-byte overlap")]
    StraddleTooWide { frame_len: u64, overlap: u32 },

    /// Use of a writer after [`close`](crate::LogWriter::close).
    #[error("log writer is closed")]
    Closed,

    /// Use of an iterator after [`close`](crate::LogIterator::close).
    #[error("log iterator is closed")]
    IteratorClosed,

    /// An underlying mapping failure (open, bounds, alignment).
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// A payload that cannot be framed (empty or larger than a u16 length
    /// can describe).
    #[error(transparent)]
    Frame(#[from] FrameError),
}
