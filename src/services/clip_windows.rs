use crate::error::PipelineError;
use crate::models::{ClipWindow, GpsRecord, StartTimeSource, VideoTimeline};
use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use std::path::Path;

/// Build `count` contiguous windows of `segment_length`, starting at `start`.
///
/// Window `i` covers `[start + i*L, start + (i+1)*L)`.
pub fn build_windows(
    start: DateTime<Utc>,
    segment_length: TimeDelta,
    count: u32,
) -> Result<Vec<ClipWindow>, PipelineError> {
    if segment_length <= TimeDelta::zero() {
        return Err(PipelineError::InvalidSegmentLength(
            segment_length.num_milliseconds() as f64 / 1000.0,
        ));
    }

    let mut windows = Vec::with_capacity(count as usize);
    let mut window_start = start;
    for clip_index in 0..count {
        let window_end = window_start + segment_length;
        windows.push(ClipWindow {
            clip_index,
            start: window_start,
            end: window_end,
        });
        window_start = window_end;
    }

    Ok(windows)
}

/// Pick the start time clip windows are measured from.
///
/// A probed start time wins. Without one the earliest GPS record stands in
/// and the timeline is marked [`StartTimeSource::GpsFallback`].
pub fn resolve_timeline(
    video: &Path,
    probed_start: Option<DateTime<Utc>>,
    records: &[GpsRecord],
) -> Result<VideoTimeline, PipelineError> {
    if let Some(start) = probed_start {
        return Ok(VideoTimeline {
            start,
            source: StartTimeSource::Metadata,
        });
    }

    match records.iter().map(|r| r.timestamp).min() {
        Some(start) => {
            warn!(
                "No start time tag in {:?}; using first GPS fix {} (clip timing is approximate)",
                video, start
            );
            Ok(VideoTimeline {
                start,
                source: StartTimeSource::GpsFallback,
            })
        }
        None => Err(PipelineError::MissingStartTime {
            path: video.to_path_buf(),
        }),
    }
}
