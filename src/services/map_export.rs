use crate::models::ClipRecord;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Map center used when no clip carries a GPS point.
pub const DEFAULT_CENTER: (f64, f64) = (41.77, -88.12);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Blue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipMarker {
    pub clip_id: String,
    pub clip_file: String,
    pub latitude: f64,
    pub longitude: f64,
    pub pothole: bool,
    pub color: MarkerColor,
    /// Set when the clip's start was approximated from GPS
    pub approximate_timing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_data_url: Option<String>,
}

/// Everything a map front end needs to place clip markers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapExport {
    pub center: (f64, f64),
    pub markers: Vec<ClipMarker>,
}

/// Build one marker per clip at its first GPS point.
///
/// Clips without GPS data get no marker. With `embed_video` each marker
/// carries the clip as a base64 `data:` URL for an inline player.
pub fn build_map(clips: &[ClipRecord], embed_video: bool) -> MapExport {
    let center = clips
        .iter()
        .find_map(|c| c.first_point())
        .map(|p| (p.latitude, p.longitude))
        .unwrap_or(DEFAULT_CENTER);

    let markers = clips
        .iter()
        .filter_map(|clip| {
            let point = clip.first_point()?;
            Some(ClipMarker {
                clip_id: clip.id.clone(),
                clip_file: clip.clip_file.clone(),
                latitude: point.latitude,
                longitude: point.longitude,
                pothole: clip.pothole,
                color: if clip.pothole {
                    MarkerColor::Red
                } else {
                    MarkerColor::Blue
                },
                approximate_timing: clip.start_source.is_degraded(),
                video_data_url: if embed_video {
                    video_data_url(&clip.clip_file)
                } else {
                    None
                },
            })
        })
        .collect();

    MapExport { center, markers }
}

fn video_data_url<P: AsRef<Path>>(clip_file: P) -> Option<String> {
    match std::fs::read(clip_file.as_ref()) {
        Ok(bytes) => Some(format!("data:video/mp4;base64,{}", BASE64.encode(bytes))),
        Err(e) => {
            warn!("Failed to load video file {:?}: {}", clip_file.as_ref(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GpsRecord, StartTimeSource};
    use chrono::{TimeZone, Utc};

    fn clip(file: &str, pothole: bool, points: &[(f64, f64)]) -> ClipRecord {
        let mut clip = ClipRecord::new(
            "video".to_string(),
            "input_videos/drive.mp4".to_string(),
            file.to_string(),
            0,
            10.0,
            StartTimeSource::Metadata,
        );
        clip.pothole = pothole;
        let t = Utc.with_ymd_and_hms(2025, 3, 31, 23, 0, 30).unwrap();
        clip.gps_data = points
            .iter()
            .map(|&(lat, lon)| GpsRecord::new(t, lat, lon))
            .collect();
        clip
    }

    #[test]
    fn test_markers_use_first_point_and_pothole_color() {
        let clips = vec![
            clip("a.mp4", false, &[]),
            clip("b.mp4", true, &[(41.5, -88.5), (41.6, -88.6)]),
            clip("c.mp4", false, &[(41.7, -88.7)]),
        ];

        let map = build_map(&clips, false);

        assert_eq!(map.center, (41.5, -88.5));
        assert_eq!(map.markers.len(), 2);
        assert_eq!(map.markers[0].clip_file, "b.mp4");
        assert_eq!((map.markers[0].latitude, map.markers[0].longitude), (41.5, -88.5));
        assert_eq!(map.markers[0].color, MarkerColor::Red);
        assert_eq!(map.markers[1].color, MarkerColor::Blue);
        assert!(map.markers.iter().all(|m| m.video_data_url.is_none()));
    }

    #[test]
    fn test_default_center() {
        let map = build_map(&[clip("a.mp4", false, &[])], false);
        assert_eq!(map.center, DEFAULT_CENTER);
        assert!(map.markers.is_empty());
    }

    #[test]
    fn test_embedded_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"mp4").unwrap();
        let clips = vec![
            clip(&path.to_string_lossy(), false, &[(41.0, -88.0)]),
            clip("missing.mp4", false, &[(41.0, -88.0)]),
        ];

        let map = build_map(&clips, true);

        assert_eq!(
            map.markers[0].video_data_url.as_deref(),
            Some("data:video/mp4;base64,bXA0")
        );
        assert!(map.markers[1].video_data_url.is_none());
    }

    #[test]
    fn test_degraded_timing_flagged() {
        let mut degraded = clip("a.mp4", false, &[(41.0, -88.0)]);
        degraded.start_source = StartTimeSource::GpsFallback;

        let map = build_map(&[degraded], false);
        assert!(map.markers[0].approximate_timing);
    }
}
