//! Per-instance log position: a segment index plus an offset within that
//! segment's exclusive capacity.
//!
//! The writer and every iterator each own their cursor; cursors are never
//! shared or stored in the mapping. The offset is kept strictly below the
//! segment length; advancing past it rebases onto the following segment,
//! which is what lets frame arithmetic stay per-segment while the absolute
//! address keeps growing monotonically.

/// A `(segment, offset)` position. The derived absolute logical address is
/// `segment * segment_len + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Index of the segment the position falls in.
    pub segment: u32,
    /// Offset within the segment's exclusive capacity; always
    /// `< segment_len`.
    pub offset: u64,
}

impl Cursor {
    /// Splits an absolute logical address into a segment position.
    #[must_use]
    pub fn from_absolute(address: u64, segment_len: u64) -> Self {
        Self {
            segment: (address / segment_len) as u32,
            offset: address % segment_len,
        }
    }

    /// The absolute logical address of this position.
    #[must_use]
    pub fn absolute(&self, segment_len: u64) -> u64 {
        u64::from(self.segment) * segment_len + self.offset
    }

    /// Advances by `bytes`, rebasing onto following segments while the
    /// offset reaches the segment's exclusive capacity.
    pub fn advance(&mut self, bytes: u64, segment_len: u64) {
        self.offset += bytes;
        while self.offset >= segment_len {
            self.offset -= segment_len;
            self.segment += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_round_trip() {
        let c = Cursor::from_absolute(150, 64);
        assert_eq!(c, Cursor { segment: 2, offset: 22 });
        assert_eq!(c.absolute(64), 150);
    }

    #[test]
    fn advance_rebases_across_boundary() {
        let mut c = Cursor::from_absolute(61, 64);
        c.advance(16, 64);
        assert_eq!(c, Cursor { segment: 1, offset: 13 });
        assert_eq!(c.absolute(64), 77);
    }

    #[test]
    fn advance_stays_within_segment() {
        let mut c = Cursor { segment: 0, offset: 24 };
        c.advance(36, 64);
        assert_eq!(c, Cursor { segment: 0, offset: 60 });
    }

    #[test]
    fn advance_landing_exactly_on_boundary_moves_to_next_segment() {
        let mut c = Cursor { segment: 0, offset: 28 };
        c.advance(36, 64);
        assert_eq!(c, Cursor { segment: 1, offset: 0 });
        assert_eq!(c.absolute(64), 64);
    }
}
