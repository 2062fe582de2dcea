use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPS sample recovered from a video's embedded metadata text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsRecord {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
        }
    }
}
