use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Settings for the Python sidecar that runs the pothole model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Interpreter to use; probed from common locations when unset.
    pub python_path: Option<String>,
    pub script_dir: PathBuf,
    pub module: String,
    pub model_path: PathBuf,
    pub frame_count: u32,
    /// Frames are scaled to `frame_size` x `frame_size` grayscale.
    pub frame_size: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            script_dir: PathBuf::from("python"),
            module: "pothole_classifier.cli".to_string(),
            model_path: PathBuf::from("sample.keras"),
            frame_count: 10,
            frame_size: 100,
        }
    }
}

/// Everything the pipeline needs, loaded once and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segment_length_sec: f64,
    /// Clips whose probed duration differs from the segment length by this
    /// much or more are discarded.
    pub duration_tolerance_sec: f64,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub database_path: PathBuf,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub exiftool_path: Option<String>,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_length_sec: 10.0,
            duration_tolerance_sec: 0.1,
            input_dir: PathBuf::from("input_videos"),
            output_dir: PathBuf::from("output_clips"),
            database_path: PathBuf::from("clips.db"),
            ffmpeg_path: None,
            ffprobe_path: None,
            exiftool_path: None,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.segment_length_sec > 0.0) || !self.segment_length_sec.is_finite() {
            return Err(PipelineError::InvalidSegmentLength(self.segment_length_sec));
        }
        if !(self.duration_tolerance_sec >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "duration_tolerance_sec must not be negative, got {}",
                self.duration_tolerance_sec
            )));
        }
        if self.classifier.frame_count == 0 || self.classifier.frame_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "classifier frame_count and frame_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Segment length as a chrono duration, millisecond precision.
    pub fn segment_length(&self) -> Result<TimeDelta, PipelineError> {
        let millis = (self.segment_length_sec * 1000.0).round();
        if !(millis >= 1.0) || millis >= i64::MAX as f64 {
            return Err(PipelineError::InvalidSegmentLength(self.segment_length_sec));
        }
        TimeDelta::try_milliseconds(millis as i64)
            .ok_or(PipelineError::InvalidSegmentLength(self.segment_length_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.segment_length_sec, 10.0);
        assert_eq!(config.segment_length().unwrap(), TimeDelta::seconds(10));
        assert_eq!(config.classifier.frame_count, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"segment_length_sec": 5, "classifier": {{"model_path": "models/road.keras"}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.segment_length_sec, 5.0);
        assert_eq!(config.duration_tolerance_sec, 0.1);
        assert_eq!(config.output_dir, PathBuf::from("output_clips"));
        assert_eq!(config.classifier.model_path, PathBuf::from("models/road.keras"));
        assert_eq!(config.classifier.frame_size, 100);
    }

    #[test]
    fn test_rejects_non_positive_segment_length() {
        let config = PipelineConfig {
            segment_length_sec: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidSegmentLength(_))
        ));
        assert!(config.segment_length().is_err());
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let config = PipelineConfig {
            duration_tolerance_sec: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
