use crate::config::PipelineConfig;
use crate::models::{ClipRecord, GpsRecord, SourceVideo, StartTimeSource, VideoTimeline};
use crate::services::{
    associate, build_windows, resolve_timeline, Database, ExifTool, FFmpeg, GpsParser,
};
use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config and open clip store shared by every command
pub struct AppContext {
    pub config: PipelineConfig,
    pub db: Database,
}

impl AppContext {
    pub async fn open(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::new(&config.database_path).await?;
        Ok(Self { config, db })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub video_id: String,
    pub source_file: String,
    pub gps_records: usize,
    pub start_source: StartTimeSource,
    pub clips_kept: u32,
    pub clips_discarded: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub files_processed: u32,
    pub files_failed: u32,
    pub clips_kept: u32,
    pub clips_discarded: u32,
    pub results: Vec<IngestResult>,
}

/// A segmenter output file with its probed duration
#[derive(Debug, Clone)]
pub struct ProbedClip {
    pub path: PathBuf,
    pub duration_sec: f64,
}

/// Clips of one video split into those kept and those to delete
#[derive(Debug)]
pub struct AssembledClips {
    pub kept: Vec<ClipRecord>,
    pub discarded: Vec<PathBuf>,
}

/// Filter clips by duration and attach the GPS records of their windows.
///
/// Window `i` belongs to `probed[i]`, so dropping a short clip never shifts
/// the timing of the clips after it.
pub fn assemble_clips(
    video: &SourceVideo,
    probed: &[ProbedClip],
    records: &[GpsRecord],
    config: &PipelineConfig,
) -> Result<AssembledClips> {
    let windows = build_windows(
        video.start_time,
        config.segment_length()?,
        probed.len() as u32,
    )?;
    let assignments = associate(records, &windows);

    let mut kept = Vec::new();
    let mut discarded = Vec::new();

    for (clip, assignment) in probed.iter().zip(assignments) {
        if (clip.duration_sec - config.segment_length_sec).abs() >= config.duration_tolerance_sec {
            info!(
                "Discarding clip {:?} with duration {:.2} seconds",
                clip.path, clip.duration_sec
            );
            discarded.push(clip.path.clone());
            continue;
        }

        let mut record = ClipRecord::new(
            video.id.clone(),
            video.source_path.clone(),
            clip.path.to_string_lossy().to_string(),
            assignment.clip_index,
            clip.duration_sec,
            video.start_source,
        );
        record.gps_data = assignment.records;
        kept.push(record);
    }

    Ok(AssembledClips { kept, discarded })
}

/// External tools and parser needed to turn a source video into clips
pub struct VideoIngest<'a> {
    config: &'a PipelineConfig,
    ffmpeg: FFmpeg,
    exiftool: ExifTool,
    parser: GpsParser,
}

impl<'a> VideoIngest<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self> {
        Ok(Self {
            config,
            ffmpeg: FFmpeg::new(config)?,
            exiftool: ExifTool::new(config)?,
            parser: GpsParser::new(),
        })
    }

    /// Segment one video, tag its clips with GPS and store them.
    ///
    /// If anything after segmenting fails, the clips just written are
    /// removed so no unstored clip files are left in `output_dir`.
    pub async fn process_file(
        &self,
        db: &Database,
        input: &Path,
        output_dir: &Path,
    ) -> Result<IngestResult> {
        let clip_files = self
            .ffmpeg
            .segment(input, output_dir, self.config.segment_length_sec)?;

        match self.tag_and_store(db, input, &clip_files).await {
            Ok(result) => Ok(result),
            Err(e) => {
                for path in &clip_files {
                    if let Err(remove_err) = std::fs::remove_file(path) {
                        warn!("Failed to remove clip {:?}: {}", path, remove_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn tag_and_store(
        &self,
        db: &Database,
        input: &Path,
        clip_files: &[PathBuf],
    ) -> Result<IngestResult> {
        let raw = match self.exiftool.extract_raw(input) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Error extracting raw GPS data from {:?}: {e:#}", input);
                String::new()
            }
        };
        let records = self.parser.parse_content(&raw);
        info!("File {:?}: extracted {} GPS records", input, records.len());

        let probed_start = match self.ffmpeg.start_time(input) {
            Ok(start) => start,
            Err(e) => {
                warn!("Error probing start time of {:?}: {e:#}", input);
                None
            }
        };
        let timeline: VideoTimeline = resolve_timeline(input, probed_start, &records)?;
        info!(
            "File {:?}: video start time {} ({})",
            input, timeline.start, timeline.source
        );

        let probed: Vec<ProbedClip> = clip_files
            .iter()
            .map(|path| {
                let duration_sec = self.ffmpeg.clip_duration(path).unwrap_or_else(|e| {
                    warn!("Error getting duration for {:?}: {e:#}", path);
                    0.0
                });
                ProbedClip {
                    path: path.clone(),
                    duration_sec,
                }
            })
            .collect();

        let video = SourceVideo::new(input.to_string_lossy().to_string(), timeline, records.len());
        let assembled = assemble_clips(&video, &probed, &records, self.config)?;

        for path in &assembled.discarded {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove discarded clip {:?}: {}", path, e);
            }
        }

        db.replace_video(&video, &assembled.kept).await?;

        Ok(IngestResult {
            video_id: video.id,
            source_file: video.source_path,
            gps_records: records.len(),
            start_source: timeline.source,
            clips_kept: assembled.kept.len() as u32,
            clips_discarded: assembled.discarded.len() as u32,
        })
    }
}

/// Process every `.mp4` in `input_dir`. A failing file is logged and skipped.
pub async fn process_folder(
    ctx: &AppContext,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<IngestSummary> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let videos = scan_folder(input_dir)?;
    if videos.is_empty() {
        warn!("No .mp4 files found in {:?}", input_dir);
    }

    let ingest = VideoIngest::new(&ctx.config)?;
    let mut summary = IngestSummary::default();

    for input in videos {
        info!("Processing file: {:?}", input);
        match ingest.process_file(&ctx.db, &input, output_dir).await {
            Ok(result) => {
                summary.files_processed += 1;
                summary.clips_kept += result.clips_kept;
                summary.clips_discarded += result.clips_discarded;
                summary.results.push(result);
            }
            Err(e) => {
                error!("Error processing {:?}: {e:#}", input);
                summary.files_failed += 1;
            }
        }
    }

    info!("Total valid clips generated: {}", summary.clips_kept);
    Ok(summary)
}

/// Source videos in a folder, sorted by name
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    for entry in std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read input folder {:?}", folder))?
    {
        let path = entry?.path();
        let is_mp4 = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("mp4"))
            .unwrap_or(false);
        if is_mp4 && path.is_file() {
            videos.push(path);
        }
    }
    videos.sort();

    Ok(videos)
}

/// Parse a metadata text file into GPS records
pub fn parse_gps_file(path: &Path) -> Result<Vec<GpsRecord>> {
    GpsParser::new().parse_file(path)
}
