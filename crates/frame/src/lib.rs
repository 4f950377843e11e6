//! Frame codec: the self-describing message envelope stored in the log.
//!
//! ## Binary layout
//!
//! ```text
//! [frame_len: u16 LE][payload: frame_len - 4 bytes][frame_len: u16 LE]
//! ```
//!
//! `frame_len` counts the whole envelope: payload plus both 2-byte metadata
//! fields. The duplicated length is the format's self-check, and the
//! trailing copy makes backward traversal possible (step to `end - 2`, read
//! the length, jump to the start).
//!
//! Everything here is a pure function over byte slices; the codec holds no
//! state and knows nothing about segments or commit watermarks.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Width of one length field.
pub const LEN_FIELD_BYTES: usize = 2;

/// Metadata bytes per frame: leading plus trailing length field.
pub const METADATA_BYTES: usize = 2 * LEN_FIELD_BYTES;

/// Smallest well-formed frame: two length fields, empty of payload. Frames
/// this small are never produced (payloads must be non-empty) but the bound
/// is what corruption checks validate against.
pub const MIN_FRAME_LEN: u16 = METADATA_BYTES as u16;

/// Largest payload a frame can carry; the length field is a u16.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - METADATA_BYTES;

/// Errors from payload-to-frame length computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// A frame must carry at least one payload byte.
    #[error("frame payload must not be empty")]
    EmptyPayload,

    /// The payload does not fit a u16 frame length.
    #[error("payload of {0} bytes exceeds the maximum of {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(usize),
}

/// Computes the frame length for a payload, validating its size.
pub fn frame_len(payload_len: usize) -> Result<u16, FrameError> {
    if payload_len == 0 {
        return Err(FrameError::EmptyPayload);
    }
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge(payload_len));
    }
    Ok((payload_len + METADATA_BYTES) as u16)
}

/// Stamps both length fields of a frame.
///
/// `frame` must be exactly `len` bytes: the slice the envelope occupies.
/// The payload bytes in between are left untouched; the caller fills them
/// in afterwards (or already has).
pub fn write_frame_len(frame: &mut [u8], len: u16) {
    debug_assert_eq!(frame.len(), len as usize);
    LittleEndian::write_u16(&mut frame[..LEN_FIELD_BYTES], len);
    let tail = len as usize - LEN_FIELD_BYTES;
    LittleEndian::write_u16(&mut frame[tail..], len);
}

/// Writes a complete frame (both length fields plus payload) into `buf` at
/// `offset`, returning the frame length.
pub fn write_frame(buf: &mut [u8], offset: usize, payload: &[u8]) -> Result<u16, FrameError> {
    let len = frame_len(payload.len())?;
    let frame = &mut buf[offset..offset + len as usize];
    frame[LEN_FIELD_BYTES..LEN_FIELD_BYTES + payload.len()].copy_from_slice(payload);
    write_frame_len(frame, len);
    Ok(len)
}

/// Reads the leading length field of the frame at `offset`.
pub fn read_frame_len(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buf[offset..offset + LEN_FIELD_BYTES])
}

/// Checks that the trailing length field at `offset + len - 2` matches the
/// leading one.
pub fn validate_symmetry(buf: &[u8], offset: usize, len: u16) -> bool {
    if (len as usize) < METADATA_BYTES || offset + len as usize > buf.len() {
        return false;
    }
    let tail = offset + len as usize - LEN_FIELD_BYTES;
    LittleEndian::read_u16(&buf[tail..tail + LEN_FIELD_BYTES]) == len
}
