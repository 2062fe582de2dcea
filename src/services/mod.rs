pub mod associator;
pub mod classifier;
pub mod clip_windows;
pub mod database;
pub mod exiftool;
pub mod ffmpeg;
pub mod gps_parser;
pub mod map_export;

pub use associator::associate;
pub use classifier::{ClassificationResult, PotholeClassifier};
pub use clip_windows::{build_windows, resolve_timeline};
pub use database::Database;
pub use exiftool::ExifTool;
pub use ffmpeg::FFmpeg;
pub use gps_parser::GpsParser;
pub use map_export::{build_map, ClipMarker, MapExport, MarkerColor};
