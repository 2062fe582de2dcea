mod clip;
mod gps;
mod video;
mod window;

pub use clip::ClipRecord;
pub use gps::GpsRecord;
pub use video::{SourceVideo, StartTimeSource, VideoTimeline};
pub use window::{ClipGpsAssignment, ClipWindow};
