use crate::config::ClassifierConfig;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Verdict returned by the pothole model for one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub pothole: bool,
    /// Predicted class per sampled frame, in sampling order
    #[serde(default)]
    pub frame_classes: Vec<i64>,
}

/// Python sidecar running the pretrained pothole classifier.
///
/// Each request is a fresh interpreter reading one JSON command on stdin and
/// answering with `{"success": bool, "result" | "error": ...}` on stdout.
pub struct PotholeClassifier {
    python_path: String,
    script_dir: PathBuf,
    module: String,
    model_path: PathBuf,
    frame_count: u32,
    frame_size: u32,
}

impl PotholeClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let python_path = match &config.python_path {
            Some(path) => path.clone(),
            None => Self::find_python()?,
        };

        let script_dir = find_script_dir(&config.script_dir).ok_or_else(|| {
            PipelineError::Classifier(format!(
                "classifier scripts not found in {:?}",
                config.script_dir
            ))
        })?;
        debug!("Classifier scripts in {:?}", script_dir);

        Ok(Self {
            python_path,
            script_dir,
            module: config.module.clone(),
            model_path: config.model_path.clone(),
            frame_count: config.frame_count,
            frame_size: config.frame_size,
        })
    }

    fn find_python() -> Result<String> {
        let candidates = [
            "python3",
            "python",
            "/usr/bin/python3",
            "/usr/local/bin/python3",
            "/opt/homebrew/bin/python3",
        ];

        for candidate in candidates {
            let output = Command::new(candidate).arg("--version").output();

            if let Ok(output) = output {
                if output.status.success() {
                    return Ok(candidate.to_string());
                }
            }
        }

        Err(PipelineError::ToolNotFound("python3".to_string()).into())
    }

    fn run_command(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let request = serde_json::json!({
            "command": command,
            "args": args
        });

        let mut child = Command::new(&self.python_path)
            .arg("-m")
            .arg(&self.module)
            .current_dir(&self.script_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn classifier")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.to_string().as_bytes())
                .context("Failed to write classifier request")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for classifier")?;

        if !output.status.success() {
            return Err(PipelineError::Classifier(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )
            .into());
        }

        parse_response(&String::from_utf8_lossy(&output.stdout))
    }

    /// Sample frames from a clip and report whether any shows a pothole
    pub fn classify_clip<P: AsRef<Path>>(&self, clip_path: P) -> Result<ClassificationResult> {
        let clip_path = clip_path.as_ref();
        // The sidecar runs inside the script dir, so relative paths would move
        let args = serde_json::json!({
            "clip_path": absolute(clip_path)?.to_string_lossy(),
            "model_path": absolute(&self.model_path)?.to_string_lossy(),
            "frame_count": self.frame_count,
            "frame_size": self.frame_size
        });

        let result = self.run_command("classify_clip", args)?;
        debug!("Classifier result for {:?}: {}", clip_path, result);

        serde_json::from_value(result)
            .with_context(|| format!("Failed to parse classifier result for {:?}", clip_path))
    }

    /// Check that the interpreter can import the model's dependencies
    pub fn is_available(&self) -> bool {
        let result = Command::new(&self.python_path)
            .arg("-c")
            .arg("import cv2, tensorflow; print('ok')")
            .output();

        matches!(result, Ok(output) if output.status.success())
    }
}

/// Locate the sidecar package: as given, then next to the crate sources,
/// then next to the executable.
fn find_script_dir(configured: &Path) -> Option<PathBuf> {
    if configured.is_absolute() {
        return configured.is_dir().then(|| configured.to_path_buf());
    }

    let mut candidates = vec![configured.to_path_buf()];
    candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(configured));
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(configured));
        }
    }

    candidates
        .into_iter()
        .find(|path| path.is_dir())
        .map(|path| absolute(&path).unwrap_or(path))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to read current directory")?
        .join(path))
}

fn parse_response(stdout: &str) -> Result<serde_json::Value> {
    let response: serde_json::Value = serde_json::from_str(stdout.trim())
        .with_context(|| format!("Failed to parse classifier response: {stdout}"))?;

    if response.get("success").and_then(|v| v.as_bool()) == Some(true) {
        Ok(response["result"].clone())
    } else {
        Err(PipelineError::Classifier(
            response["error"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        )
        .into())
    }
}
