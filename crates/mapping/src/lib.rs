//! # Mapping: segmented shared-memory file mapping
//!
//! Maps one backing file (a regular file or something under `/dev/shm/`) as
//! an array of equal-size logical **segments** whose views overlap into the
//! next segment. Consumers that need a contiguous byte run crossing a
//! segment boundary read it through the previous segment's overlap bytes.
//!
//! ## Layout
//!
//! ```text
//! file:       [segment 0][segment 1]...[segment N-1]       (N * segment_len bytes)
//! view 0:     [0, segment_len + overlap)
//! view 1:     [segment_len, 2*segment_len + overlap)
//! view N-1:   [(N-1)*segment_len, N*segment_len)           <- no overlap past EOF
//! ```
//!
//! The whole file is mapped once with `MAP_SHARED`; segment views are
//! overlapping slices of that single mapping, so the overlap bytes are not
//! extra storage: they alias the start of the next segment. A logical byte
//! address is therefore identical to its file offset.
//!
//! ## Cross-process visibility
//!
//! A `MAP_SHARED` mapping gives all processes the same physical pages.
//! Fields that coordinate between a writer and polling readers must go
//! through [`SegmentedMapping::atomic_u64`]: a release store on the writer
//! side paired with acquire loads on the reader side is what guarantees
//! that plain byte writes below the published watermark are visible before
//! the watermark itself. Platforms where `MAP_SHARED` does not provide
//! ordinary cache-coherent memory are not supported.

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use thiserror::Error;

/// Smallest permitted segment: leaves room for a 24-byte header plus at
/// least one minimal frame.
pub const MIN_SEGMENT_LEN: u64 = 32;

/// Errors that can occur while opening or addressing a mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Read-only open of a path that does not exist. Kept separate from
    /// [`MappingError::Io`] so callers can tell "no writer has created the
    /// log yet" apart from real I/O failures.
    #[error("mapping file does not exist: {0}")]
    NotFound(PathBuf),

    /// An underlying I/O error (open, metadata, set_len, mmap).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The requested geometry is invalid, or an existing file does not
    /// match it.
    #[error("bad mapping geometry: {0}")]
    Geometry(String),

    /// A requested range does not fit inside the mapping.
    #[error("range [{offset}, +{count}) exceeds mapping length {len}")]
    OutOfBounds { offset: u64, count: usize, len: u64 },

    /// A mutable view was requested from a read-only mapping.
    #[error("mapping is read-only")]
    ReadOnly,

    /// An atomic view was requested at an unaligned offset.
    #[error("offset {0} is not 8-byte aligned")]
    Misaligned(u64),
}

/// Segment geometry of a mapping.
///
/// `segment_len` is the *exclusive* logical capacity per segment; `overlap`
/// is how far each segment's view extends into the next segment. Total
/// logical capacity (= file size) is `segment_len * segment_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Logical bytes per segment.
    pub segment_len: u64,
    /// Number of segments.
    pub segment_count: u32,
    /// Bytes each segment view aliases from the next segment. Must be large
    /// enough for the biggest contiguous run a consumer will ever read
    /// across a boundary.
    pub overlap: u32,
}

impl Geometry {
    /// Validates the geometry invariants.
    pub fn validate(&self) -> Result<(), MappingError> {
        if self.segment_len < MIN_SEGMENT_LEN {
            return Err(MappingError::Geometry(format!(
                "segment_len {} is below the minimum of {} bytes",
                self.segment_len, MIN_SEGMENT_LEN
            )));
        }
        if self.segment_count == 0 {
            return Err(MappingError::Geometry("segment_count must be >= 1".into()));
        }
        if u64::from(self.overlap) >= self.segment_len {
            return Err(MappingError::Geometry(format!(
                "overlap {} must be smaller than segment_len {}",
                self.overlap, self.segment_len
            )));
        }
        self.segment_len
            .checked_mul(u64::from(self.segment_count))
            .filter(|&total| total <= isize::MAX as u64)
            .ok_or_else(|| MappingError::Geometry("total capacity overflows".into()))?;
        Ok(())
    }

    /// Total logical capacity in bytes.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.segment_len * u64::from(self.segment_count)
    }
}

enum MapKind {
    Ro(Mmap),
    Rw(MmapMut),
}

/// One file mapped as overlapping segment views.
///
/// The struct owns the mapping for its whole lifetime; byte regions handed
/// out by [`view`](SegmentedMapping::view) and
/// [`segment`](SegmentedMapping::segment) borrow it and alias the underlying
/// shared pages directly.
///
/// ## Sharing contract
///
/// The mapping itself is passive. Concurrent use is sound under the
/// single-writer discipline of the log built on top: at most one process
/// mutates bytes (and only beyond the published watermark), any number of
/// processes read bytes below it. [`view_mut`](SegmentedMapping::view_mut)
/// is `unsafe` because the type system cannot see that discipline.
pub struct SegmentedMapping {
    map: MapKind,
    base: *mut u8,
    len: u64,
    segment_len: u64,
    segment_count: u32,
    overlap: u32,
    writable: bool,
    path: PathBuf,
}

// The raw base pointer is derived from the owned mmap; access discipline is
// documented on the type.
unsafe impl Send for SegmentedMapping {}
unsafe impl Sync for SegmentedMapping {}

impl SegmentedMapping {
    /// Opens (writable) or maps (read-only) the backing file.
    ///
    /// Writable mode creates the file sized to `geometry.total_len()` when
    /// it does not exist. An existing file is never re-truncated: its real
    /// size wins and the segment count is re-derived from it. Read-only
    /// mode fails with [`MappingError::NotFound`] when the path is missing.
    pub fn open<P: AsRef<Path>>(
        path: P,
        geometry: &Geometry,
        writable: bool,
    ) -> Result<Self, MappingError> {
        geometry.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = if writable {
            match OpenOptions::new().read(true).write(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let f = OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .open(&path)?;
                    f.set_len(geometry.total_len())?;
                    f
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            match File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(MappingError::NotFound(path));
                }
                Err(e) => return Err(e.into()),
            }
        };

        let len = file.metadata()?.len();
        if len < geometry.segment_len {
            return Err(MappingError::Geometry(format!(
                "file is {} bytes, smaller than one segment of {}",
                len, geometry.segment_len
            )));
        }
        if len % geometry.segment_len != 0 {
            return Err(MappingError::Geometry(format!(
                "file length {} is not a whole number of {}-byte segments",
                len, geometry.segment_len
            )));
        }
        let segment_count = (len / geometry.segment_len) as u32;

        let map = if writable {
            MapKind::Rw(unsafe { MmapOptions::new().map_mut(&file)? })
        } else {
            MapKind::Ro(unsafe { MmapOptions::new().map(&file)? })
        };
        let base = match &map {
            MapKind::Ro(m) => m.as_ptr() as *mut u8,
            MapKind::Rw(m) => m.as_ptr() as *mut u8,
        };

        Ok(Self {
            map,
            base,
            len,
            segment_len: geometry.segment_len,
            segment_count,
            overlap: geometry.overlap,
            writable,
            path,
        })
    }

    /// Total mapped length in bytes (= file size = logical capacity).
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.len
    }

    /// Logical bytes per segment (excluding overlap).
    #[must_use]
    pub fn segment_len(&self) -> u64 {
        self.segment_len
    }

    /// Number of segments actually backed by the file.
    #[must_use]
    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    /// Overlap bytes per segment view.
    #[must_use]
    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Whether this mapping was opened writable.
    #[must_use]
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// The backing file path (kept for diagnostics).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, offset: u64, count: usize) -> Result<(), MappingError> {
        let end = offset.checked_add(count as u64);
        match end {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(MappingError::OutOfBounds {
                offset,
                count,
                len: self.len,
            }),
        }
    }

    /// A bounds-checked read view of `count` bytes at flat `offset`.
    pub fn view(&self, offset: u64, count: usize) -> Result<&[u8], MappingError> {
        self.check_range(offset, count)?;
        Ok(unsafe { std::slice::from_raw_parts(self.base.add(offset as usize), count) })
    }

    /// A bounds-checked write view of `count` bytes at flat `offset`.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the requested byte range for
    /// the lifetime of the returned slice: no other live view (mutable or
    /// not, in this process or another) may cover bytes that are being
    /// written. The log writer satisfies this by only ever handing out
    /// ranges beyond the published watermark.
    pub unsafe fn view_mut(&self, offset: u64, count: usize) -> Result<&mut [u8], MappingError> {
        if !self.writable {
            return Err(MappingError::ReadOnly);
        }
        self.check_range(offset, count)?;
        Ok(std::slice::from_raw_parts_mut(
            self.base.add(offset as usize),
            count,
        ))
    }

    /// The overlapping view of one segment.
    ///
    /// Every segment view is `segment_len + overlap` bytes, except the last
    /// one which is exactly `segment_len` (there is nothing past the end of
    /// the file to alias).
    pub fn segment(&self, index: u32) -> Result<&[u8], MappingError> {
        if index >= self.segment_count {
            return Err(MappingError::OutOfBounds {
                offset: u64::from(index) * self.segment_len,
                count: 0,
                len: self.len,
            });
        }
        let start = u64::from(index) * self.segment_len;
        let view_len = if index == self.segment_count - 1 {
            self.segment_len
        } else {
            self.segment_len + u64::from(self.overlap)
        };
        self.view(start, view_len as usize)
    }

    /// Flushes dirty pages back to the backing file. A no-op on a
    /// read-only mapping.
    pub fn flush(&self) -> Result<(), MappingError> {
        match &self.map {
            MapKind::Ro(_) => Ok(()),
            MapKind::Rw(m) => Ok(m.flush()?),
        }
    }

    /// An atomic view of the 8-byte word at `offset`.
    ///
    /// This is the coordination primitive for cross-process publication:
    /// the writer release-stores through it, readers acquire-load. `offset`
    /// must be 8-byte aligned (the mapping base is page aligned, so an
    /// aligned offset yields an aligned word).
    pub fn atomic_u64(&self, offset: u64) -> Result<&AtomicU64, MappingError> {
        if offset % 8 != 0 {
            return Err(MappingError::Misaligned(offset));
        }
        self.check_range(offset, 8)?;
        Ok(unsafe { &*(self.base.add(offset as usize) as *const AtomicU64) })
    }
}

impl std::fmt::Debug for SegmentedMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedMapping")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("segment_len", &self.segment_len)
            .field("segment_count", &self.segment_count)
            .field("overlap", &self.overlap)
            .field("writable", &self.writable)
            .finish()
    }
}
