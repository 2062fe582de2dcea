use crate::models::GpsRecord;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeZone, Timelike, Utc};
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Extracts GPS samples from the text exiftool dumps for dashcam footage.
///
/// Records look like `2025:03:31 23:00:35Z41.7698047868907-88.120337175205329`:
/// a UTC timestamp, then latitude and longitude run together, each with an
/// optional sign.
pub struct GpsParser {
    record_pattern: Regex,
}

impl GpsParser {
    pub fn new() -> Self {
        Self {
            record_pattern: Regex::new(
                r"(\d{4}:\d{2}:\d{2} \d{2}:\d{2}:\d{2})Z\s*([+-]?\d+\.\d+)\s*([+-]?\d+\.\d+)",
            )
            .unwrap(),
        }
    }

    /// Parse a text file and return its GPS records sorted by time
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<GpsRecord>> {
        let bytes = fs::read(path.as_ref())
            .with_context(|| format!("Failed to read metadata file: {:?}", path.as_ref()))?;

        Ok(self.parse_content(&String::from_utf8_lossy(&bytes)))
    }

    /// Parse a raw metadata blob. Malformed records are logged and skipped.
    pub fn parse_content(&self, content: &str) -> Vec<GpsRecord> {
        let mut records: Vec<GpsRecord> = self
            .record_pattern
            .captures_iter(content)
            .filter_map(|caps| self.parse_record(&caps[1], &caps[2], &caps[3]))
            .collect();

        // Stable, so samples sharing a timestamp keep their encounter order
        records.sort_by_key(|r| r.timestamp);

        debug!("Parsed {} GPS records", records.len());
        records
    }

    fn parse_record(&self, ts: &str, lat: &str, lon: &str) -> Option<GpsRecord> {
        let timestamp = match NaiveDateTime::parse_from_str(ts, "%Y:%m:%d %H:%M:%S") {
            // Second 60 parses as a leap nanosecond; rejected like any other bad field
            Ok(dt) if dt.nanosecond() >= 1_000_000_000 => {
                warn!("Skipping GPS record ({ts}, {lat}, {lon}): second out of range");
                return None;
            }
            Ok(dt) => Utc.from_utc_datetime(&dt),
            Err(e) => {
                warn!("Skipping GPS record ({ts}, {lat}, {lon}): bad timestamp: {e}");
                return None;
            }
        };

        let (latitude, longitude) = match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Skipping GPS record ({ts}, {lat}, {lon}): bad coordinate: {e}");
                return None;
            }
        };

        Some(GpsRecord::new(timestamp, latitude, longitude))
    }
}

impl Default for GpsParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::io::Write;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_canonical_record() {
        let parser = GpsParser::new();
        let records =
            parser.parse_content("2025:03:31 23:00:35Z41.7698047868907-88.120337175205329");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.timestamp, utc(2025, 3, 31, 23, 0, 35));
        assert!((record.latitude - 41.7698047868907).abs() < 1e-12);
        assert!((record.longitude - -88.120337175205329).abs() < 1e-12);
    }

    #[test]
    fn test_no_matches() {
        let parser = GpsParser::new();
        assert!(parser.parse_content("").is_empty());
        assert!(parser
            .parse_content("Track1 mov_text 2025-03-31 23:00:35 speed 42km/h")
            .is_empty());
        // Integer coordinates do not match the decimal pattern
        assert!(parser.parse_content("2025:03:31 23:00:35Z41-88").is_empty());
    }

    #[test]
    fn test_records_embedded_in_noise() {
        let content = "\u{0}\u{1}ftypmp42 junk 2025:03:31 23:00:36Z41.7698-88.1203\u{0}\u{0}\
                       more junk 2025:03:31 23:00:37Z 41.7699 -88.1204 trailing";
        let records = GpsParser::new().parse_content(content);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp, utc(2025, 3, 31, 23, 0, 37));
        assert_eq!(records[1].latitude, 41.7699);
        assert_eq!(records[1].longitude, -88.1204);
    }

    #[test]
    fn test_signed_coordinates() {
        let records = GpsParser::new()
            .parse_content("2025:01:02 03:04:05Z-33.8688+151.2093 2025:01:02 03:04:06Z+51.5072-0.1276");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latitude, -33.8688);
        assert_eq!(records[0].longitude, 151.2093);
        assert_eq!(records[1].latitude, 51.5072);
        assert_eq!(records[1].longitude, -0.1276);
    }

    #[test]
    fn test_output_sorted_and_stable() {
        let content = "2025:03:31 23:00:40Z1.0-1.0 \
                       2025:03:31 23:00:35Z2.0-2.0 \
                       2025:03:31 23:00:40Z3.0-3.0 \
                       2025:03:31 23:00:35Z4.0-4.0";
        let records = GpsParser::new().parse_content(content);

        let lats: Vec<f64> = records.iter().map(|r| r.latitude).collect();
        assert_eq!(lats, vec![2.0, 4.0, 1.0, 3.0]);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_malformed_timestamp_skipped() {
        let content = "2025:13:31 23:00:35Z41.0-88.0 2025:03:31 25:00:00Z41.0-88.0 \
                       2025:03:31 23:00:35Z41.5-88.5";
        let records = GpsParser::new().parse_content(content);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latitude, 41.5);
    }

    #[test]
    fn test_leap_second_skipped() {
        let content = "2025:03:31 23:59:60Z41.0-88.0 2025:03:31 23:59:59Z41.5-88.5";
        let records = GpsParser::new().parse_content(content);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, utc(2025, 3, 31, 23, 59, 59));
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\xff\xfe2025:03:31 23:00:35Z41.7698-88.1203\n").unwrap();

        let records = GpsParser::new().parse_file(file.path()).unwrap();
        assert_eq!(records.len(), 1);

        assert!(GpsParser::new().parse_file("/nonexistent/gps.txt").is_err());
    }
}
