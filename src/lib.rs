pub mod audio;
pub mod config;
pub mod error;
pub mod index;
pub mod materialize;
pub mod plan;
pub mod pool;
pub mod segment;
pub mod track;

pub use config::{AudioFormat, Config, SegmentConfig};
pub use error::{Result, YtsegError};
pub use segment::{
    create_segments, create_segments_with, print_summary, RunStatus, SegmentSummary,
};
pub use track::TranscriptSummary;
