//! Cursor-based, batched, corruption-aware frame iteration.
//!
//! Each iterator owns an independent cursor; any number of iterators (in
//! any number of processes) can walk the same log concurrently. Discovery
//! is by polling: every batch snapshots the committed watermark with an
//! acquire load and walks frames strictly below it. There is no blocking
//! and no notification; an iterator that catches up simply returns an
//! empty batch, and any wait-for-more policy lives with the caller.
//!
//! Errors never move the cursor: the walk happens on locals and the cursor
//! is stored only when a batch completes, so a caller that catches
//! [`LogError::FrameCorrupt`] can retry, diagnose, or abandon without
//! having skipped or double-read bytes.

use std::sync::Arc;

use mapping::SegmentedMapping;

use crate::address;
use crate::cursor::Cursor;
use crate::error::LogError;
use crate::header::{self, Header};

/// Default cap on frames per batch.
pub const DEFAULT_MAX_MESSAGES: u32 = 64;

/// Default cap on bytes per batch, counted including the 4 metadata bytes
/// of every frame.
pub const DEFAULT_MAX_BYTES: u32 = 256 * 1024;

/// Bounds for one [`LogIterator::next_batch`] call.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Upper bound on frames returned from a single batch.
    pub max_messages: u32,
    /// Upper bound on cumulative bytes consumed by a batch, metadata
    /// included. A batch stops early, without error, at either bound.
    pub max_bytes: u32,
    /// Also validate each frame's trailing length field against the
    /// leading one, failing with [`LogError::FrameCorrupt`] on mismatch.
    pub debug_checks: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_bytes: DEFAULT_MAX_BYTES,
            debug_checks: false,
        }
    }
}

/// A reader's view of the committed frame sequence.
pub struct LogIterator {
    mapping: Arc<SegmentedMapping>,
    data_offset: u64,
    segment_len: u64,
    cursor: Cursor,
    debug_checks: bool,
    closed: bool,
}

impl LogIterator {
    pub(crate) fn new(
        mapping: Arc<SegmentedMapping>,
        header: &Header,
        start: Option<u64>,
        debug_checks: bool,
    ) -> Result<Self, LogError> {
        let segment_len = mapping.segment_len();
        let data_offset = header.data_offset;
        let committed = header::committed_size(&mapping)?;
        let start = start.unwrap_or(data_offset);
        if start < data_offset || start > committed {
            return Err(LogError::CursorInvalid {
                address: start,
                reason: format!("start cursor outside [{data_offset}, {committed}]"),
            });
        }
        Ok(Self {
            data_offset,
            segment_len,
            cursor: Cursor::from_absolute(start, segment_len),
            debug_checks,
            closed: false,
            mapping,
        })
    }

    fn ensure_open(&self) -> Result<(), LogError> {
        if self.closed {
            return Err(LogError::IteratorClosed);
        }
        Ok(())
    }

    /// The next committed frame's payload, or `None` at the committed
    /// frontier. Advances the cursor by one frame.
    pub fn next(&mut self) -> Result<Option<&[u8]>, LogError> {
        self.ensure_open()?;
        let opts = BatchOptions {
            max_messages: 1,
            max_bytes: u32::MAX,
            debug_checks: self.debug_checks,
        };
        let (cursor, frames) = self.collect(&opts)?;
        self.cursor = cursor;
        match frames.first().copied() {
            Some((address, len)) => Ok(Some(address::resolve(&self.mapping, address, len)?)),
            None => Ok(None),
        }
    }

    /// Up to `max_messages`/`max_bytes` worth of committed frames, in write
    /// order. Stops early without error at either bound or at the
    /// committed frontier; never returns a partial frame.
    pub fn next_batch(&mut self, opts: &BatchOptions) -> Result<Vec<&[u8]>, LogError> {
        self.ensure_open()?;
        let (cursor, frames) = self.collect(opts)?;
        self.cursor = cursor;
        let mut out = Vec::with_capacity(frames.len());
        for (address, len) in frames {
            out.push(address::resolve(&self.mapping, address, len)?);
        }
        Ok(out)
    }

    /// The absolute logical address of this iterator's position.
    ///
    /// Stays readable after [`close`](LogIterator::close); it is purely
    /// local state.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor.absolute(self.segment_len)
    }

    /// Bytes consumed so far relative to the data offset
    /// (`cursor - data_offset`); a progress figure for callers.
    #[must_use]
    pub fn consumed_bytes(&self) -> u64 {
        self.cursor() - self.data_offset
    }

    /// Bytes committed to the whole log relative to the data offset
    /// (`size - data_offset`), regardless of this iterator's position.
    pub fn committed_bytes(&self) -> Result<u64, LogError> {
        self.ensure_open()?;
        Ok(self.committed()? - self.data_offset)
    }

    /// Repositions the iterator to an absolute address.
    ///
    /// Fail-fast validation: the target must lie within
    /// `[data_offset, committed]`, and unless it is exactly the committed
    /// frontier the bytes there must parse as an internally consistent
    /// frame (length in range, prefix matching suffix). A target that
    /// fails either test is rejected with [`LogError::CursorInvalid`] and
    /// the cursor stays put.
    pub fn seek(&mut self, address: u64) -> Result<(), LogError> {
        self.ensure_open()?;
        let committed = self.committed()?;
        if address < self.data_offset || address > committed {
            return Err(LogError::CursorInvalid {
                address,
                reason: format!("outside [{}, {committed}]", self.data_offset),
            });
        }
        if address < committed {
            let frame_len = u64::from(self.read_len_at(address)?);
            let well_formed = frame_len >= u64::from(frame::MIN_FRAME_LEN)
                && frame_len <= self.segment_len
                && address + frame_len <= committed;
            if !well_formed {
                return Err(LogError::CursorInvalid {
                    address,
                    reason: format!("no well-formed frame starts here (length {frame_len})"),
                });
            }
            let bytes = address::resolve(&self.mapping, address, frame_len as usize)
                .map_err(|_| LogError::CursorInvalid {
                    address,
                    reason: format!("{frame_len}-byte frame is not contiguously readable"),
                })?;
            if !frame::validate_symmetry(bytes, 0, frame_len as u16) {
                return Err(LogError::CursorInvalid {
                    address,
                    reason: format!("trailing length field does not match {frame_len}"),
                });
            }
        }
        self.cursor = Cursor::from_absolute(address, self.segment_len);
        Ok(())
    }

    /// Closes the iterator; later data calls fail with
    /// [`LogError::IteratorClosed`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Walks frames below the committed snapshot into `(payload address,
    /// payload length)` pairs without touching `self.cursor`.
    fn collect(&self, opts: &BatchOptions) -> Result<(Cursor, Vec<(u64, usize)>), LogError> {
        let committed = self.committed()?;
        let mut cursor = self.cursor;
        let mut absolute = cursor.absolute(self.segment_len);
        if absolute > committed {
            return Err(LogError::CursorInvalid {
                address: absolute,
                reason: format!("cursor beyond committed size {committed}"),
            });
        }

        let debug = opts.debug_checks || self.debug_checks;
        let mut frames: Vec<(u64, usize)> = Vec::new();
        let mut consumed: u64 = 0;

        while absolute < committed && (frames.len() as u32) < opts.max_messages {
            if absolute + frame::METADATA_BYTES as u64 > committed {
                break;
            }
            let frame_len = u64::from(self.read_len_at(absolute)?);
            if frame_len < u64::from(frame::MIN_FRAME_LEN) || frame_len > self.segment_len {
                return Err(LogError::FrameCorrupt {
                    address: absolute,
                    reason: format!(
                        "frame length {} outside [{}, {}]",
                        frame_len,
                        frame::MIN_FRAME_LEN,
                        self.segment_len
                    ),
                });
            }
            let end = absolute + frame_len;
            if end > committed {
                // Partial frame: stamped but not yet published. Not an
                // error; it will be complete after the writer's commit.
                break;
            }
            if consumed + frame_len > u64::from(opts.max_bytes) {
                break;
            }
            if debug {
                let bytes = address::resolve(&self.mapping, absolute, frame_len as usize)
                    .map_err(|_| LogError::FrameCorrupt {
                        address: absolute,
                        reason: format!("{frame_len}-byte frame is not contiguously readable"),
                    })?;
                if !frame::validate_symmetry(bytes, 0, frame_len as u16) {
                    return Err(LogError::FrameCorrupt {
                        address: absolute,
                        reason: format!("trailing length field does not match {frame_len}"),
                    });
                }
            }

            frames.push((
                absolute + frame::LEN_FIELD_BYTES as u64,
                frame_len as usize - frame::METADATA_BYTES,
            ));
            consumed += frame_len;
            cursor.advance(frame_len, self.segment_len);
            absolute = end;
        }

        Ok((cursor, frames))
    }

    fn committed(&self) -> Result<u64, LogError> {
        let size = header::committed_size(&self.mapping)?;
        if size < self.data_offset {
            return Err(LogError::Header(format!(
                "committed size {} precedes data offset {}",
                size, self.data_offset
            )));
        }
        Ok(size)
    }

    fn read_len_at(&self, address: u64) -> Result<u16, LogError> {
        let bytes = self.mapping.view(address, frame::LEN_FIELD_BYTES)?;
        Ok(frame::read_frame_len(bytes, 0))
    }
}

impl std::fmt::Debug for LogIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIterator")
            .field("cursor", &self.cursor)
            .field("data_offset", &self.data_offset)
            .field("debug_checks", &self.debug_checks)
            .field("closed", &self.closed)
            .finish()
    }
}
