use crate::models::{ClipGpsAssignment, ClipWindow, GpsRecord};

/// Assign time-sorted GPS records to time-sorted, non-overlapping windows.
///
/// Returns one assignment per window, in window order. Records before the
/// first window or at/after the last window's end are dropped. A record on a
/// window's end boundary belongs to the following window.
pub fn associate(records: &[GpsRecord], windows: &[ClipWindow]) -> Vec<ClipGpsAssignment> {
    let mut assignments = Vec::with_capacity(windows.len());
    let mut cursor = 0;

    for window in windows {
        while cursor < records.len() && records[cursor].timestamp < window.start {
            cursor += 1;
        }
        let first = cursor;
        while cursor < records.len() && records[cursor].timestamp < window.end {
            cursor += 1;
        }

        assignments.push(ClipGpsAssignment {
            clip_index: window.clip_index,
            records: records[first..cursor].to_vec(),
        });
    }

    assignments
}
