use crate::config::PipelineConfig;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Container tags checked for the recording start, in order.
const START_TIME_TAGS: [&str; 2] = ["encoded_date", "creation_time"];

pub struct FFmpeg {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FFmpeg {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let ffmpeg_path = match &config.ffmpeg_path {
            Some(path) => path.clone(),
            None => which_command("ffmpeg")?,
        };
        let ffprobe_path = match &config.ffprobe_path {
            Some(path) => path.clone(),
            None => which_command("ffprobe")?,
        };

        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
        })
    }

    /// Split `input` into `segment_length_sec` clips with stream copy.
    ///
    /// Clips are written as `<file name>_clip_%03d.mp4` in `output_dir` and
    /// returned in segment order. The full file name keeps `a.mp4` and
    /// `a.MP4` apart. Clips left from an earlier run of the same file are
    /// removed first.
    pub fn segment<P: AsRef<Path>>(
        &self,
        input: P,
        output_dir: P,
        segment_length_sec: f64,
    ) -> Result<Vec<PathBuf>> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();
        let prefix = clip_prefix(input)?;
        let output_pattern = output_dir.join(format!("{prefix}%03d.mp4"));

        for stale in list_clips(output_dir, &prefix)? {
            debug!("Removing stale clip {:?}", stale);
            std::fs::remove_file(&stale)
                .with_context(|| format!("Failed to remove stale clip {:?}", stale))?;
        }

        info!("Segmenting {:?} into {}s clips", input, segment_length_sec);

        let output = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-y", "-i"])
            .arg(input)
            .args([
                "-c", "copy",
                "-map_metadata", "0",
                "-f", "segment",
                "-segment_time", &segment_length_sec.to_string(),
                "-reset_timestamps", "1",
            ])
            .arg(&output_pattern)
            .output()
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        list_clips(output_dir, &prefix)
    }

    /// Duration of a clip's container in seconds
    pub fn clip_duration<P: AsRef<Path>>(&self, clip: P) -> Result<f64> {
        let stdout = self.probe_entry(clip.as_ref(), "format=duration")?;
        parse_duration(&stdout).ok_or_else(|| {
            PipelineError::ToolFailed {
                tool: "ffprobe".to_string(),
                message: format!("unparseable duration {:?} for {:?}", stdout, clip.as_ref()),
            }
            .into()
        })
    }

    /// Recording start from the container tags, if any tag parses
    pub fn start_time<P: AsRef<Path>>(&self, input: P) -> Result<Option<DateTime<Utc>>> {
        for tag in START_TIME_TAGS {
            match self.probe_entry(input.as_ref(), &format!("format_tags={tag}")) {
                Ok(value) if !value.is_empty() => {
                    if let Some(start) = parse_tag_time(&value) {
                        debug!("Start time of {:?} from {tag}: {start}", input.as_ref());
                        return Ok(Some(start));
                    }
                    warn!("Unrecognized {tag} value {:?} in {:?}", value, input.as_ref());
                }
                Ok(_) => {}
                Err(e) => warn!("Error extracting {tag} from {:?}: {e:#}", input.as_ref()),
            }
        }

        Ok(None)
    }

    fn probe_entry(&self, input: &Path, entries: &str) -> Result<String> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", entries,
                "-of", "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                tool: "ffprobe".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub(crate) fn which_command(name: &str) -> Result<String> {
    let output = Command::new("which")
        .arg(name)
        .output()
        .context(format!("Failed to find {name}"))?;

    if !output.status.success() {
        return Err(PipelineError::ToolNotFound(name.to_string()).into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn clip_prefix(input: &Path) -> Result<String> {
    input
        .file_name()
        .map(|s| format!("{}_clip_", s.to_string_lossy()))
        .ok_or_else(|| anyhow::anyhow!("No file name in {:?}", input))
}

/// Clips named `<prefix><index>.mp4`, in index order.
fn list_clips(output_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut clips = Vec::new();

    for entry in std::fs::read_dir(output_dir)
        .with_context(|| format!("Failed to list clip directory {:?}", output_dir))?
    {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().to_string();
        let index = filename
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(".mp4"))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(index) = index {
            clips.push((index, entry.path()));
        }
    }
    clips.sort();

    Ok(clips.into_iter().map(|(_, path)| path).collect())
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Accepts `2025-03-31 23:00:30`, `UTC 2025-03-31 23:00:30` and RFC 3339.
fn parse_tag_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.replace("UTC", "");
    let value = value.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}
