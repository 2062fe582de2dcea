use crate::commands::ingest::AppContext;
use crate::services::{ClassificationResult, Database, PotholeClassifier};
use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Anything that can give a pothole verdict for a clip file
pub trait ClipClassifier {
    fn classify(&self, clip_path: &Path) -> Result<ClassificationResult>;
}

impl ClipClassifier for PotholeClassifier {
    fn classify(&self, clip_path: &Path) -> Result<ClassificationResult> {
        self.classify_clip(clip_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictSummary {
    pub classified: u32,
    pub potholes: u32,
    pub missing_files: u32,
    pub failed: u32,
}

/// Run the pothole classifier over every stored clip
pub async fn predict_potholes(ctx: &AppContext) -> Result<PredictSummary> {
    let classifier = PotholeClassifier::new(&ctx.config.classifier)?;
    if !classifier.is_available() {
        warn!("Classifier dependencies (cv2, tensorflow) failed to import; predictions will likely fail");
    }

    classify_stored_clips(&ctx.db, &classifier).await
}

/// Classify each stored clip and write the verdict back.
///
/// Missing clip files and classifier failures are logged per clip and the
/// clip keeps its previous flag.
pub async fn classify_stored_clips(
    db: &Database,
    classifier: &dyn ClipClassifier,
) -> Result<PredictSummary> {
    let clips = db.list_clips().await?;
    let mut summary = PredictSummary::default();

    for clip in clips {
        let clip_path = Path::new(&clip.clip_file);
        if !clip_path.is_file() {
            warn!("Clip file not found: {:?}", clip_path);
            summary.missing_files += 1;
            continue;
        }

        info!("Processing clip: {:?}", clip_path);
        match classifier.classify(clip_path) {
            Ok(result) => {
                db.set_pothole(&clip.id, result.pothole).await?;
                summary.classified += 1;
                if result.pothole {
                    summary.potholes += 1;
                }
                info!("Pothole detected in {:?}: {}", clip_path, result.pothole);
            }
            Err(e) => {
                warn!("Failed to classify {:?}: {e:#}", clip_path);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
