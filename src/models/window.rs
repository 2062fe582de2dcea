use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GpsRecord;

/// Half-open time range `[start, end)` covered by one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipWindow {
    pub clip_index: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ClipWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// GPS records that fell inside one clip window, in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipGpsAssignment {
    pub clip_index: u32,
    pub records: Vec<GpsRecord>,
}

impl ClipGpsAssignment {
    pub fn empty(clip_index: u32) -> Self {
        Self {
            clip_index,
            records: Vec::new(),
        }
    }
}
