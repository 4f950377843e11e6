use mapping::{Geometry, SegmentedMapping};
use tempfile::TempDir;

use crate::writer::LogWriter;
use crate::LogConfig;

/// A config over a temp file with an explicit, usually tiny, geometry.
pub fn config(
    dir: &TempDir,
    name: &str,
    segment_len: u64,
    segment_count: u32,
    overlap: u32,
) -> LogConfig {
    let mut cfg = LogConfig::new(dir.path().join(name));
    cfg.segment_len = segment_len;
    cfg.segment_count = segment_count;
    cfg.overlap = overlap;
    cfg
}

/// Allocates a frame, fills it with `payload`, and returns the frame's
/// absolute address. Does not commit.
pub fn append(w: &mut LogWriter, payload: &[u8]) -> u64 {
    let buf = w.allocate(payload.len()).unwrap();
    buf.copy_from_slice(payload);
    w.last_allocated_address().unwrap()
}

/// A second writable mapping over the same backing file, for corrupting
/// bytes out from under the log.
pub fn raw_map(cfg: &LogConfig) -> SegmentedMapping {
    let geometry = Geometry {
        segment_len: cfg.segment_len,
        segment_count: cfg.segment_count,
        overlap: cfg.overlap,
    };
    SegmentedMapping::open(&cfg.path, &geometry, true).unwrap()
}

/// Overwrites `bytes` at an absolute offset through a raw mapping.
pub fn poke(map: &SegmentedMapping, offset: u64, bytes: &[u8]) {
    let view = unsafe { map.view_mut(offset, bytes.len()).unwrap() };
    view.copy_from_slice(bytes);
}
