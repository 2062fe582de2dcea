use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GpsRecord, StartTimeSource};

/// One fixed-length clip cut from a source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    pub id: String,
    pub video_id: String,
    pub source_file: String,
    pub clip_file: String,
    /// Position in the segmenter's output, counting discarded clips.
    pub clip_index: u32,
    pub duration_sec: f64,
    pub pothole: bool,
    /// Copied from the parent video so degraded timing travels with the clip.
    pub start_source: StartTimeSource,
    pub gps_data: Vec<GpsRecord>,
}

impl ClipRecord {
    pub fn new(
        video_id: String,
        source_file: String,
        clip_file: String,
        clip_index: u32,
        duration_sec: f64,
        start_source: StartTimeSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_id,
            source_file,
            clip_file,
            clip_index,
            duration_sec,
            pothole: false,
            start_source,
            gps_data: Vec::new(),
        }
    }

    pub fn first_point(&self) -> Option<&GpsRecord> {
        self.gps_data.first()
    }
}
