use crate::commands::ingest::AppContext;
use crate::services::{build_map, MapExport};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Build the clip map from the store
pub async fn export_map(ctx: &AppContext, embed_video: bool) -> Result<MapExport> {
    let clips = ctx.db.list_clips().await?;
    let map = build_map(&clips, embed_video);
    info!(
        "Exported {} markers from {} clips",
        map.markers.len(),
        clips.len()
    );
    Ok(map)
}

pub fn write_map<P: AsRef<Path>>(map: &MapExport, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(map)?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write map export {:?}", path.as_ref()))
}
