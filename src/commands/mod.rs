mod analyze;
mod export;
mod ingest;

pub use analyze::*;
pub use export::*;
pub use ingest::*;
