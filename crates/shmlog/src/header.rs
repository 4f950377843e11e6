//! The fixed 24-byte log header at absolute offset 0.
//!
//! ```text
//! offset 0..8   : header_size (u64 LE)  size of this header
//! offset 8..16  : data_offset (u64 LE)  where the frame sequence starts
//! offset 16..24 : size        (u64 LE)  committed watermark (atomic)
//! ```
//!
//! `size` is the single synchronization point between the writer and all
//! readers: bytes below it are stable and published, bytes above it are the
//! writer's private scratch. It is only ever accessed through the mapping's
//! atomic view with acquire/release ordering. The two metadata fields are
//! plain values written once when a fresh file is initialized.

use byteorder::{ByteOrder, LittleEndian};
use mapping::SegmentedMapping;
use std::sync::atomic::Ordering;

use crate::error::LogError;

/// Header length in bytes: three u64 fields.
pub const HEADER_LEN: u64 = 24;

/// Flat offset of the committed-size word.
pub const SIZE_WORD_OFFSET: u64 = 16;

/// Parsed log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Size of the header itself (24 for this format).
    pub header_size: u64,
    /// Absolute address where the frame sequence starts. Always
    /// `>= header_size`.
    pub data_offset: u64,
    /// Committed watermark: all frame bytes below this absolute address are
    /// published. Only ever increases. `>= data_offset`.
    pub size: u64,
}

impl Header {
    /// Loads the header fields, taking `size` with an acquire load.
    pub fn load(mapping: &SegmentedMapping) -> Result<Self, LogError> {
        let bytes = mapping.view(0, HEADER_LEN as usize)?;
        Ok(Self {
            header_size: LittleEndian::read_u64(&bytes[0..8]),
            data_offset: LittleEndian::read_u64(&bytes[8..16]),
            size: committed_size(mapping)?,
        })
    }

    /// Writes all three fields back. The two metadata fields are plain
    /// stores; `size` goes through the atomic word with release ordering.
    pub(crate) fn store(&self, mapping: &SegmentedMapping) -> Result<(), LogError> {
        let bytes = unsafe { mapping.view_mut(0, SIZE_WORD_OFFSET as usize)? };
        LittleEndian::write_u64(&mut bytes[0..8], self.header_size);
        LittleEndian::write_u64(&mut bytes[8..16], self.data_offset);
        publish_size(mapping, self.size)
    }

    /// Loads the header, normalizing a fresh (all-zero) or out-of-range
    /// header to the defaults.
    ///
    /// On a writable mapping the normalized fields are also stored back,
    /// so the very first writer initializes
    /// `header_size = data_offset = size = 24` before any allocation. A
    /// read-only mapping of a file no writer has touched yet gets the same
    /// defaults in the returned copy without writing.
    pub(crate) fn load_or_init(mapping: &SegmentedMapping) -> Result<Self, LogError> {
        let len = mapping.total_len();
        let mut header = Self::load(mapping)?;

        let mut repair = false;
        if header.header_size == 0 || header.header_size > len {
            header.header_size = HEADER_LEN;
            repair = true;
        }
        if header.data_offset == 0 || header.data_offset > len {
            header.data_offset = header.header_size;
            repair = true;
        }
        if header.data_offset < header.header_size {
            return Err(LogError::Header(format!(
                "data offset {} precedes header end {}",
                header.data_offset, header.header_size
            )));
        }
        if header.size < header.data_offset || header.size > len {
            header.size = header.data_offset;
            repair = true;
        }

        if mapping.writable() && repair {
            header.store(mapping)?;
        }

        Ok(header)
    }
}

/// Acquire-loads the committed watermark.
pub(crate) fn committed_size(mapping: &SegmentedMapping) -> Result<u64, LogError> {
    Ok(mapping.atomic_u64(SIZE_WORD_OFFSET)?.load(Ordering::Acquire))
}

/// Release-stores the committed watermark. Must only be called after every
/// frame byte below `size` has been written.
pub(crate) fn publish_size(mapping: &SegmentedMapping, size: u64) -> Result<(), LogError> {
    mapping
        .atomic_u64(SIZE_WORD_OFFSET)?
        .store(size, Ordering::Release);
    Ok(())
}
