//! The single writer: frame allocation and the commit protocol.
//!
//! ## Allocation / commit protocol
//!
//! 1. `allocate(n)` reserves `n + 4` bytes at the uncommitted tip, stamps
//!    both length fields immediately, and returns the payload slice. The
//!    frame is self-describing on disk from this moment, but invisible to
//!    readers because the committed watermark has not moved.
//! 2. The caller fills the payload bytes directly in shared memory.
//! 3. `commit()` publishes every allocation since the previous commit in
//!    one release store of the header's `size` word.
//!
//! Readers treat the `size` word as the sole signal that all bytes below it
//! are stable, so the store must come after the payload writes; the
//! release/acquire pairing on the mapped word guarantees that order.
//!
//! A writer that crashes after allocating but before committing leaves
//! frames below the watermark untouched; the stamped-but-unpublished bytes
//! are simply overwritten by the next writer instance, whose cursor starts
//! from the committed watermark.

use std::sync::Arc;

use mapping::SegmentedMapping;

use crate::address;
use crate::cursor::Cursor;
use crate::error::LogError;
use crate::header::{self, Header};

/// Exclusive append handle over a writable log.
///
/// Exactly one process holds a live writer at a time (a usage contract,
/// not a lock). The writer owns its cursor; readers never see uncommitted
/// positions.
pub struct LogWriter {
    mapping: Arc<SegmentedMapping>,
    data_offset: u64,
    segment_len: u64,
    overlap: u32,
    capacity: u64,
    /// Absolute committed watermark as this writer last published it.
    committed: u64,
    /// Uncommitted write position (committed + pending bytes).
    cursor: Cursor,
    /// Bytes allocated since the last commit.
    pending: u64,
    /// Frame start address of the most recent allocation.
    last_allocated: Option<u64>,
    debug_checks: bool,
    closed: bool,
}

impl LogWriter {
    pub(crate) fn new(
        mapping: Arc<SegmentedMapping>,
        header: &Header,
        debug_checks: bool,
    ) -> Self {
        let segment_len = mapping.segment_len();
        let committed = header.size.max(header.data_offset);
        Self {
            data_offset: header.data_offset,
            segment_len,
            overlap: mapping.overlap(),
            capacity: mapping.total_len(),
            committed,
            cursor: Cursor::from_absolute(committed, segment_len),
            pending: 0,
            last_allocated: None,
            debug_checks,
            closed: false,
            mapping,
        }
    }

    fn ensure_open(&self) -> Result<(), LogError> {
        if self.closed {
            return Err(LogError::Closed);
        }
        Ok(())
    }

    /// Allocates a frame slot for a `payload_size`-byte message and returns
    /// the payload region, aliasing the mapped memory directly.
    ///
    /// Both length fields are stamped before this returns; the caller only
    /// fills the payload. The frame stays invisible to readers until
    /// [`commit`](LogWriter::commit).
    ///
    /// # Errors
    ///
    /// - [`LogError::Frame`] for an empty or oversized payload.
    /// - [`LogError::Exhausted`] when the frame would pass the last
    ///   segment's capacity (the log never wraps).
    /// - [`LogError::StraddleTooWide`] when the frame would cross a segment
    ///   boundary but does not fit the overlap window.
    /// - [`LogError::FrameCorrupt`] from the debug pre-check (see below).
    pub fn allocate(&mut self, payload_size: usize) -> Result<&mut [u8], LogError> {
        self.ensure_open()?;

        let frame_len = u64::from(frame::frame_len(payload_size)?);
        let start = self.cursor.absolute(self.segment_len);

        if start + frame_len > self.capacity {
            return Err(LogError::Exhausted {
                requested: frame_len,
                remaining: self.capacity - start,
            });
        }
        // A boundary-crossing frame is only contiguous through the overlap
        // bytes, so it must fit the overlap window.
        if self.cursor.offset + frame_len > self.segment_len && frame_len > u64::from(self.overlap)
        {
            return Err(LogError::StraddleTooWide {
                frame_len,
                overlap: self.overlap,
            });
        }

        if self.debug_checks {
            self.verify_previous_frame(start)?;
        }

        {
            let envelope = unsafe { self.mapping.view_mut(start, frame_len as usize)? };
            frame::write_frame_len(envelope, frame_len as u16);
        }

        self.last_allocated = Some(start);
        self.pending += frame_len;
        self.cursor.advance(frame_len, self.segment_len);

        let payload =
            unsafe { self.mapping.view_mut(start + frame::LEN_FIELD_BYTES as u64, payload_size)? };
        Ok(payload)
    }

    /// Publishes every allocation since the previous commit.
    ///
    /// Performs a single release store of the header's `size` word; a no-op
    /// when nothing is pending.
    pub fn commit(&mut self) -> Result<(), LogError> {
        self.ensure_open()?;
        if self.pending == 0 {
            return Ok(());
        }
        let new_size = self.committed + self.pending;
        header::publish_size(&self.mapping, new_size)?;
        self.committed = new_size;
        self.pending = 0;
        Ok(())
    }

    /// The absolute address of the most recent allocation's leading length
    /// field, or `None` if this writer instance has not allocated yet.
    #[must_use]
    pub fn last_allocated_address(&self) -> Option<u64> {
        self.last_allocated
    }

    /// Random-access view of a previously allocated (not necessarily
    /// committed) frame's payload by absolute address.
    pub fn buffer_at_address(
        &mut self,
        address: u64,
        payload_size: usize,
    ) -> Result<&mut [u8], LogError> {
        self.ensure_open()?;
        address::check_payload_bounds(address, payload_size, self.data_offset, self.capacity)?;
        let payload =
            unsafe { self.mapping.view_mut(address + frame::LEN_FIELD_BYTES as u64, payload_size)? };
        Ok(payload)
    }

    /// The committed watermark as last published by this writer (absolute).
    #[must_use]
    pub fn committed_size(&self) -> u64 {
        self.committed
    }

    /// Bytes allocated but not yet committed.
    #[must_use]
    pub fn pending_bytes(&self) -> u64 {
        self.pending
    }

    /// Closes the writer. Every later call fails with
    /// [`LogError::Closed`]; pending (unpublished) allocations are
    /// abandoned, which readers never observe.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending = 0;
    }

    /// Re-validates the frame immediately preceding `write_cursor`: its
    /// trailing length must be well-formed, point back past the data
    /// offset, and match the leading length. Catches writer-side smashes
    /// before they propagate; only runs with debug checks enabled.
    fn verify_previous_frame(&self, write_cursor: u64) -> Result<(), LogError> {
        if write_cursor < self.data_offset + frame::METADATA_BYTES as u64 {
            return Ok(());
        }
        let suffix = u64::from(self.read_len_at(write_cursor - frame::LEN_FIELD_BYTES as u64)?);
        if suffix < u64::from(frame::MIN_FRAME_LEN) || suffix > self.segment_len {
            return Err(LogError::FrameCorrupt {
                address: write_cursor,
                reason: format!(
                    "previous frame length {} outside [{}, {}]",
                    suffix,
                    frame::MIN_FRAME_LEN,
                    self.segment_len
                ),
            });
        }
        let prev_start = write_cursor - suffix;
        if prev_start < self.data_offset {
            return Err(LogError::FrameCorrupt {
                address: write_cursor,
                reason: "previous frame crosses the data offset".into(),
            });
        }
        let prefix = u64::from(self.read_len_at(prev_start)?);
        if prefix != suffix {
            return Err(LogError::FrameCorrupt {
                address: prev_start,
                reason: format!("prefix {prefix} != suffix {suffix}"),
            });
        }
        Ok(())
    }

    fn read_len_at(&self, address: u64) -> Result<u16, LogError> {
        let bytes = self.mapping.view(address, frame::LEN_FIELD_BYTES)?;
        Ok(frame::read_frame_len(bytes, 0))
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("committed", &self.committed)
            .field("pending", &self.pending)
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity)
            .field("debug_checks", &self.debug_checks)
            .field("closed", &self.closed)
            .finish()
    }
}
