//! # shmlog: single-writer, multi-reader shared-memory frame log
//!
//! An append-only log of framed binary messages living in memory shared
//! between independent processes: one process appends, any number of
//! processes poll and read, with no broker and no copies on the read path.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ backing file (MAP_SHARED)                                │
//! │                                                          │
//! │ [24-byte header][frame][frame][frame]............        │
//! │        |                                                 │
//! │        └─ size word: committed watermark (atomic)        │
//! └──────────────────────────────────────────────────────────┘
//!      ^                 ^                        ^
//!      |                 |                        |
//!   WritableLog      LogWriter               LogIterator(s)
//!   ReadOnlyLog    allocate/commit        next / next_batch / seek
//! ```
//!
//! ## Module responsibilities
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | [`header`]  | The 24-byte header: load, fresh-file init, watermark |
//! | [`cursor`]  | Per-instance `(segment, offset)` position arithmetic |
//! | [`address`] | Absolute-address → segment-view translation          |
//! | [`writer`]  | Frame allocation and the publish-on-commit protocol  |
//! | [`iter`]    | Batched, corruption-aware, cursor-stable iteration   |
//!
//! ## Handles
//!
//! The writable/read-only distinction is a type, not a runtime flag:
//! [`WritableLog`] is the only way to obtain a [`LogWriter`], while
//! [`ReadOnlyLog`] exposes iteration only. Both hand out any number of
//! independent iterators.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shmlog::{BatchOptions, LogConfig, WritableLog};
//!
//! let config = LogConfig::new("/dev/shm/orders.log");
//! let log = WritableLog::open(&config).unwrap();
//! let mut writer = log.writer().unwrap();
//!
//! writer.allocate(5).unwrap().copy_from_slice(b"hello");
//! writer.commit().unwrap();
//!
//! let mut it = log.iter().unwrap();
//! for payload in it.next_batch(&BatchOptions::default()).unwrap() {
//!     println!("{:?}", payload);
//! }
//! ```
//!
//! ## Growth model
//!
//! The log only ever grows: no reclamation, no wraparound. When the last
//! segment is full, allocation fails with [`LogError::Exhausted`] and the
//! log must be replaced by a larger one.

pub mod address;
pub mod cursor;
mod error;
pub mod header;
mod iter;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use mapping::{Geometry, SegmentedMapping};

pub use crate::cursor::Cursor;
pub use crate::error::LogError;
pub use crate::header::{Header, HEADER_LEN};
pub use crate::iter::{BatchOptions, LogIterator, DEFAULT_MAX_BYTES, DEFAULT_MAX_MESSAGES};
pub use crate::writer::LogWriter;
pub use frame::{FrameError, MAX_PAYLOAD_LEN};
pub use mapping::{MappingError, MIN_SEGMENT_LEN};

/// Default logical bytes per segment (1 MiB).
pub const DEFAULT_SEGMENT_LEN: u64 = 1024 * 1024;

/// Default number of segments.
pub const DEFAULT_SEGMENT_COUNT: u32 = 8;

/// Default overlap window (64 KiB). Not less than the largest possible
/// frame (`u16::MAX` bytes), so any frame may straddle one boundary.
pub const DEFAULT_OVERLAP: u32 = 64 * 1024;

/// How to open a log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Backing file path. A path under `/dev/shm/` gives plain shared
    /// memory; any other path gives a persistent memory-mapped file.
    pub path: PathBuf,
    /// Logical bytes per segment.
    pub segment_len: u64,
    /// Number of segments when creating; an existing file's real size
    /// always wins.
    pub segment_count: u32,
    /// Overlap window in bytes; must cover the largest frame ever written.
    pub overlap: u32,
    /// Enable extra frame validation in writers and iterators created
    /// from this log.
    pub debug_checks: bool,
}

impl LogConfig {
    /// A config with default geometry.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            segment_len: DEFAULT_SEGMENT_LEN,
            segment_count: DEFAULT_SEGMENT_COUNT,
            overlap: DEFAULT_OVERLAP,
            debug_checks: false,
        }
    }

    /// Total logical capacity this config describes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.segment_len * u64::from(self.segment_count)
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            segment_len: self.segment_len,
            segment_count: self.segment_count,
            overlap: self.overlap,
        }
    }
}

/// Shared internals of both handle types.
struct LogCore {
    mapping: Arc<SegmentedMapping>,
    /// `header_size`/`data_offset` snapshot; the live `size` is always
    /// re-read through the atomic word.
    header: Header,
    debug_checks: bool,
}

impl LogCore {
    fn open(config: &LogConfig, writable: bool) -> Result<Self, LogError> {
        let mapping = SegmentedMapping::open(&config.path, &config.geometry(), writable)?;
        let header = Header::load_or_init(&mapping)?;
        Ok(Self {
            mapping: Arc::new(mapping),
            header,
            debug_checks: config.debug_checks,
        })
    }

    fn header(&self) -> Result<Header, LogError> {
        Header::load(&self.mapping)
    }

    fn iter_from(&self, start: Option<u64>) -> Result<LogIterator, LogError> {
        LogIterator::new(
            Arc::clone(&self.mapping),
            &self.header,
            start,
            self.debug_checks,
        )
    }

    fn payload_at(&self, address: u64, payload_len: usize) -> Result<&[u8], LogError> {
        address::check_payload_bounds(
            address,
            payload_len,
            self.header.data_offset,
            self.mapping.total_len(),
        )?;
        address::resolve_payload(&self.mapping, address, payload_len)
    }

    fn committed_size(&self) -> Result<u64, LogError> {
        header::committed_size(&self.mapping)
    }
}

/// A read-only handle: iteration and address lookup, no writer.
///
/// Opening fails with [`MappingError::NotFound`] when no writer has created
/// the backing file yet.
pub struct ReadOnlyLog {
    core: LogCore,
}

impl ReadOnlyLog {
    /// Maps an existing log read-only.
    pub fn open(config: &LogConfig) -> Result<Self, LogError> {
        Ok(Self {
            core: LogCore::open(config, false)?,
        })
    }

    /// The header with a live (acquire-loaded) `size`.
    pub fn header(&self) -> Result<Header, LogError> {
        self.core.header()
    }

    /// An iterator from the data offset.
    pub fn iter(&self) -> Result<LogIterator, LogError> {
        self.core.iter_from(None)
    }

    /// An iterator from an absolute start address.
    pub fn iter_from(&self, address: u64) -> Result<LogIterator, LogError> {
        self.core.iter_from(Some(address))
    }

    /// Resolves the payload of the frame at `address` (as returned by the
    /// writer's allocation), independent of any iterator.
    pub fn payload_at(&self, address: u64, payload_len: usize) -> Result<&[u8], LogError> {
        self.core.payload_at(address, payload_len)
    }

    /// Total logical capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.core.mapping.total_len()
    }

    /// The live committed watermark (absolute).
    pub fn committed_size(&self) -> Result<u64, LogError> {
        self.core.committed_size()
    }

    /// Releases the handle. Live iterators keep the mapping alive until
    /// they are dropped too.
    pub fn close(self) {}
}

/// A writable handle: everything [`ReadOnlyLog`] offers, plus the writer.
///
/// Opening creates and sizes the backing file when it does not exist; it
/// never degrades to read-only. By contract at most one process opens the
/// log writable at a time.
pub struct WritableLog {
    core: LogCore,
}

impl WritableLog {
    /// Opens or creates the log read-write.
    pub fn open(config: &LogConfig) -> Result<Self, LogError> {
        Ok(Self {
            core: LogCore::open(config, true)?,
        })
    }

    /// A writer positioned at the live committed watermark.
    pub fn writer(&self) -> Result<LogWriter, LogError> {
        let header = self.core.header()?;
        Ok(LogWriter::new(
            Arc::clone(&self.core.mapping),
            &header,
            self.core.debug_checks,
        ))
    }

    /// The header with a live (acquire-loaded) `size`.
    pub fn header(&self) -> Result<Header, LogError> {
        self.core.header()
    }

    /// An iterator from the data offset.
    pub fn iter(&self) -> Result<LogIterator, LogError> {
        self.core.iter_from(None)
    }

    /// An iterator from an absolute start address.
    pub fn iter_from(&self, address: u64) -> Result<LogIterator, LogError> {
        self.core.iter_from(Some(address))
    }

    /// Resolves the payload of the frame at `address`.
    pub fn payload_at(&self, address: u64, payload_len: usize) -> Result<&[u8], LogError> {
        self.core.payload_at(address, payload_len)
    }

    /// Total logical capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.core.mapping.total_len()
    }

    /// The live committed watermark (absolute).
    pub fn committed_size(&self) -> Result<u64, LogError> {
        self.core.committed_size()
    }

    /// Flushes dirty pages and releases the handle. Live writers and
    /// iterators keep the mapping alive until they are dropped too.
    pub fn close(self) -> Result<(), LogError> {
        self.core.mapping.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
