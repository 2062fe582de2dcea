use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Where a video's start time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTimeSource {
    /// Read from the container's `encoded_date` / `creation_time` tags.
    Metadata,
    /// Approximated by the earliest GPS record. Clip windows may be offset
    /// from the real footage by however late the first fix arrived.
    GpsFallback,
}

impl StartTimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::GpsFallback => "gps_fallback",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::GpsFallback)
    }
}

impl fmt::Display for StartTimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartTimeSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(Self::Metadata),
            "gps_fallback" => Ok(Self::GpsFallback),
            other => Err(anyhow::anyhow!("unknown start time source: {other}")),
        }
    }
}

/// Resolved start of a source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTimeline {
    pub start: DateTime<Utc>,
    pub source: StartTimeSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVideo {
    pub id: String,
    pub source_path: String,
    pub start_time: DateTime<Utc>,
    pub start_source: StartTimeSource,
    pub gps_record_count: i64,
    pub processed_at: DateTime<Utc>,
}

impl SourceVideo {
    pub fn new(source_path: String, timeline: VideoTimeline, gps_record_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_path,
            start_time: timeline.start,
            start_source: timeline.source,
            gps_record_count: gps_record_count as i64,
            processed_at: Utc::now(),
        }
    }
}
