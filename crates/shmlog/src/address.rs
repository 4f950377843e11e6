//! Absolute-address translation: from a logical byte address (as returned
//! by an allocation) back to a byte region, independent of any iteration
//! order.
//!
//! This is a pure translation, not a data structure: no caching, bounds
//! validated on every call. External code holding a previously returned
//! address (e.g. a secondary index pointing back into the log) resolves it
//! the same way the writer and the iterator do.

use frame::{LEN_FIELD_BYTES, METADATA_BYTES};
use mapping::SegmentedMapping;

use crate::error::LogError;

/// The segment an absolute logical address falls in.
#[must_use]
pub fn segment_index(address: u64, segment_len: u64) -> u32 {
    (address / segment_len) as u32
}

/// The offset of an absolute logical address within its segment.
#[must_use]
pub fn segment_offset(address: u64, segment_len: u64) -> u64 {
    address % segment_len
}

/// Validates that a frame at `address` carrying `payload_len` bytes lies
/// within the log's data region.
///
/// `address` points at the frame's leading length field; the frame occupies
/// `payload_len + 4` bytes from there.
pub fn check_payload_bounds(
    address: u64,
    payload_len: usize,
    data_offset: u64,
    capacity: u64,
) -> Result<(), LogError> {
    if address < data_offset {
        return Err(LogError::InvalidAddress {
            address,
            reason: format!("address precedes data offset {data_offset}"),
        });
    }
    let end = address
        .checked_add(METADATA_BYTES as u64)
        .and_then(|v| v.checked_add(payload_len as u64));
    match end {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(LogError::InvalidAddress {
            address,
            reason: format!(
                "frame of {payload_len}-byte payload ends past capacity {capacity}"
            ),
        }),
    }
}

/// Resolves `len` bytes at an absolute logical address to a view.
///
/// The slice is taken from the segment that owns the address's first byte,
/// so a range crossing into the next segment is served by the overlap
/// bytes. A range wider than the overlap window cannot be contiguous and is
/// rejected.
pub fn resolve(
    mapping: &SegmentedMapping,
    address: u64,
    len: usize,
) -> Result<&[u8], LogError> {
    let segment_len = mapping.segment_len();
    let segment = segment_index(address, segment_len);
    let offset = segment_offset(address, segment_len) as usize;
    let view = mapping.segment(segment)?;
    view.get(offset..offset + len).ok_or(LogError::InvalidAddress {
        address,
        reason: format!(
            "{len}-byte range crosses a segment boundary beyond the {}-byte overlap",
            mapping.overlap()
        ),
    })
}

/// Resolves the payload of the frame whose leading length field sits at
/// `address`.
pub fn resolve_payload(
    mapping: &SegmentedMapping,
    address: u64,
    payload_len: usize,
) -> Result<&[u8], LogError> {
    resolve(mapping, address + LEN_FIELD_BYTES as u64, payload_len)
}
