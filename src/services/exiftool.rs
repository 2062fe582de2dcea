use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::services::ffmpeg::which_command;
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::process::Command;

/// Wrapper around `exiftool`, used to dump embedded GPS text tracks.
pub struct ExifTool {
    exiftool_path: String,
}

impl ExifTool {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let exiftool_path = match &config.exiftool_path {
            Some(path) => path.clone(),
            None => which_command("exiftool")?,
        };

        Ok(Self { exiftool_path })
    }

    /// Raw metadata including embedded streams (`-ee -b`), decoded lossily.
    pub fn extract_raw<P: AsRef<Path>>(&self, input: P) -> Result<String> {
        let output = Command::new(&self.exiftool_path)
            .args(["-ee", "-b"])
            .arg(input.as_ref())
            .output()
            .context("Failed to execute exiftool")?;

        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                tool: "exiftool".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        debug!(
            "exiftool returned {} bytes for {:?}",
            output.stdout.len(),
            input.as_ref()
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
