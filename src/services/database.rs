use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite, SqliteConnection};
use std::path::Path;

use crate::error::PipelineError;
use crate::models::{ClipRecord, GpsRecord, SourceVideo};

const CLIP_COLUMNS: &str = "id, video_id, source_file, clip_file, clip_index, duration_sec, pothole, start_source, gps_data";

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if needed) the clip store
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .with_context(|| format!("Failed to open database {:?}", path.as_ref()))?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_videos (
                id TEXT PRIMARY KEY,
                source_path TEXT NOT NULL,
                start_time TEXT NOT NULL,
                start_source TEXT NOT NULL,
                gps_record_count INTEGER NOT NULL,
                processed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clips (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL REFERENCES source_videos(id),
                source_file TEXT NOT NULL,
                clip_file TEXT NOT NULL,
                clip_index INTEGER NOT NULL,
                duration_sec REAL NOT NULL,
                pothole INTEGER NOT NULL DEFAULT 0,
                start_source TEXT NOT NULL,
                gps_data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clips_video ON clips(video_id, clip_index)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Source video operations
    pub async fn insert_video(&self, video: &SourceVideo) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_video_row(&mut conn, video).await
    }

    pub async fn list_videos(&self) -> Result<Vec<SourceVideo>> {
        let rows = sqlx::query(
            "SELECT id, source_path, start_time, start_source, gps_record_count, processed_at FROM source_videos ORDER BY source_path"
        )
        .fetch_all(&self.pool)
        .await?;

        let mut videos = Vec::new();
        for row in rows {
            let start_time: String = row.get("start_time");
            let start_source: String = row.get("start_source");
            let processed_at: String = row.get("processed_at");
            videos.push(SourceVideo {
                id: row.get("id"),
                source_path: row.get("source_path"),
                start_time: parse_timestamp(&start_time)?,
                start_source: start_source.parse()?,
                gps_record_count: row.get("gps_record_count"),
                processed_at: parse_timestamp(&processed_at)?,
            });
        }

        Ok(videos)
    }

    /// Delete a video and its clips
    pub async fn delete_video(&self, video_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        delete_video_rows(&mut tx, video_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store a freshly processed video, replacing earlier runs on the same file.
    ///
    /// Runs in one transaction: if any insert fails the previous rows stay.
    pub async fn replace_video(&self, video: &SourceVideo, clips: &[ClipRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        match replace_video_rows(&mut tx, video, clips).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    // Clip operations
    pub async fn insert_clip(&self, clip: &ClipRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_clip_row(&mut conn, clip).await
    }

    pub async fn list_clips(&self) -> Result<Vec<ClipRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIP_COLUMNS} FROM clips ORDER BY source_file, clip_index"
        ))
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_clips(rows)
    }

    pub async fn get_clips_for_video(&self, video_id: &str) -> Result<Vec<ClipRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIP_COLUMNS} FROM clips WHERE video_id = ? ORDER BY clip_index"
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_clips(rows)
    }

    pub async fn set_pothole(&self, clip_id: &str, pothole: bool) -> Result<()> {
        sqlx::query("UPDATE clips SET pothole = ? WHERE id = ?")
            .bind(pothole)
            .bind(clip_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn rows_to_clips(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<ClipRecord>> {
        let mut clips = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let clip_index: i64 = row.get("clip_index");
            let pothole: i32 = row.get("pothole");
            let start_source: String = row.get("start_source");
            let gps_data: String = row.get("gps_data");

            // Strict decode: anything that is not a list of GPS records is rejected
            let gps_data: Vec<GpsRecord> = serde_json::from_str(&gps_data)
                .map_err(|source| PipelineError::CorruptGpsData {
                    clip_id: id.clone(),
                    source,
                })?;

            clips.push(ClipRecord {
                id,
                video_id: row.get("video_id"),
                source_file: row.get("source_file"),
                clip_file: row.get("clip_file"),
                clip_index: u32::try_from(clip_index)
                    .with_context(|| format!("Invalid clip_index {clip_index}"))?,
                duration_sec: row.get("duration_sec"),
                pothole: pothole != 0,
                start_source: start_source.parse()?,
                gps_data,
            });
        }

        Ok(clips)
    }
}

async fn insert_video_row(conn: &mut SqliteConnection, video: &SourceVideo) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO source_videos (id, source_path, start_time, start_source, gps_record_count, processed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&video.id)
    .bind(&video.source_path)
    .bind(video.start_time.to_rfc3339())
    .bind(video.start_source.as_str())
    .bind(video.gps_record_count)
    .bind(video.processed_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_clip_row(conn: &mut SqliteConnection, clip: &ClipRecord) -> Result<()> {
    let gps_data = serde_json::to_string(&clip.gps_data)?;

    sqlx::query(
        r#"
        INSERT INTO clips (id, video_id, source_file, clip_file, clip_index, duration_sec, pothole, start_source, gps_data)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&clip.id)
    .bind(&clip.video_id)
    .bind(&clip.source_file)
    .bind(&clip.clip_file)
    .bind(clip.clip_index as i64)
    .bind(clip.duration_sec)
    .bind(clip.pothole)
    .bind(clip.start_source.as_str())
    .bind(gps_data)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn delete_video_rows(conn: &mut SqliteConnection, video_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM clips WHERE video_id = ?")
        .bind(video_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM source_videos WHERE id = ?")
        .bind(video_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn replace_video_rows(
    conn: &mut SqliteConnection,
    video: &SourceVideo,
    clips: &[ClipRecord],
) -> Result<()> {
    let previous: Vec<String> =
        sqlx::query_scalar("SELECT id FROM source_videos WHERE source_path = ?")
            .bind(&video.source_path)
            .fetch_all(&mut *conn)
            .await?;

    for video_id in &previous {
        delete_video_rows(conn, video_id).await?;
    }

    insert_video_row(conn, video).await?;
    for clip in clips {
        insert_clip_row(conn, clip).await?;
    }

    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid stored timestamp {value:?}"))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StartTimeSource, VideoTimeline};
    use chrono::TimeZone;

    fn timeline() -> VideoTimeline {
        VideoTimeline {
            start: Utc.with_ymd_and_hms(2025, 3, 31, 23, 0, 30).unwrap(),
            source: StartTimeSource::Metadata,
        }
    }

    fn clip(video: &SourceVideo, index: u32, points: usize) -> ClipRecord {
        let mut clip = ClipRecord::new(
            video.id.clone(),
            video.source_path.clone(),
            format!("output_clips/drive_clip_{index:03}.mp4"),
            index,
            10.0,
            video.start_source,
        );
        clip.gps_data = (0..points)
            .map(|i| {
                GpsRecord::new(
                    video.start_time + chrono::TimeDelta::seconds(index as i64 * 10 + i as i64),
                    41.7698 + i as f64 * 1e-4,
                    -88.1203,
                )
            })
            .collect();
        clip
    }

    async fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("clips.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_clip_roundtrip_with_gps_data() {
        let (_dir, db) = open().await;
        let video = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 3);
        let clips = vec![clip(&video, 1, 0), clip(&video, 0, 3)];

        db.replace_video(&video, &clips).await.unwrap();

        let stored = db.get_clips_for_video(&video.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].clip_index, 0);
        assert_eq!(stored[0].gps_data, clips[1].gps_data);
        assert!(stored[1].gps_data.is_empty());
        assert!(!stored[0].pothole);

        let videos = db.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].start_time, video.start_time);
        assert_eq!(videos[0].start_source, StartTimeSource::Metadata);
    }

    #[tokio::test]
    async fn test_set_pothole() {
        let (_dir, db) = open().await;
        let video = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        let clips = vec![clip(&video, 0, 1)];
        db.replace_video(&video, &clips).await.unwrap();

        db.set_pothole(&clips[0].id, true).await.unwrap();

        let stored = db.list_clips().await.unwrap();
        assert!(stored[0].pothole);
    }

    #[tokio::test]
    async fn test_reprocessing_replaces_previous_rows() {
        let (_dir, db) = open().await;
        let first = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        db.replace_video(&first, &[clip(&first, 0, 1), clip(&first, 1, 1)])
            .await
            .unwrap();

        let second = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        db.replace_video(&second, &[clip(&second, 0, 2)]).await.unwrap();

        let videos = db.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, second.id);
        let clips = db.list_clips().await.unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].video_id, second.id);
    }

    #[tokio::test]
    async fn test_full_precision_coordinates_roundtrip() {
        let (_dir, db) = open().await;
        let video = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 2);
        let mut clip = clip(&video, 0, 0);
        clip.gps_data = vec![
            GpsRecord::new(video.start_time, 41.769999999999996, -88.120337175205329),
            GpsRecord::new(video.start_time, 41.7698047868907, -88.12033717520533),
        ];
        db.replace_video(&video, std::slice::from_ref(&clip)).await.unwrap();

        let stored = db.list_clips().await.unwrap();
        assert_eq!(stored[0].gps_data[0].latitude.to_bits(), 41.769999999999996f64.to_bits());
        assert_eq!(stored[0].gps_data, clip.gps_data);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_rows() {
        let (_dir, db) = open().await;
        let first = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        db.replace_video(&first, &[clip(&first, 0, 1), clip(&first, 1, 1)])
            .await
            .unwrap();

        // Same clip id twice violates the primary key on the second insert
        let second = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        let duplicate = clip(&second, 0, 1);
        let result = db
            .replace_video(&second, &[duplicate.clone(), duplicate])
            .await;
        assert!(result.is_err());

        let videos = db.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, first.id);
        let clips = db.list_clips().await.unwrap();
        assert_eq!(clips.len(), 2);
        assert!(clips.iter().all(|c| c.video_id == first.id));
    }

    #[tokio::test]
    async fn test_corrupt_gps_data_rejected() {
        let (_dir, db) = open().await;
        let video = SourceVideo::new("input_videos/drive.mp4".to_string(), timeline(), 0);
        let clips = vec![clip(&video, 0, 1)];
        db.replace_video(&video, &clips).await.unwrap();

        sqlx::query("UPDATE clips SET gps_data = ? WHERE id = ?")
            .bind("[{'timestamp': datetime.datetime(2025, 3, 31, 23, 0, 35)}]")
            .bind(&clips[0].id)
            .execute(&db.pool)
            .await
            .unwrap();

        let err = db.list_clips().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CorruptGpsData { .. })
        ));
    }
}
