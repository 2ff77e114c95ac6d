pub mod ffmpeg;

pub use ffmpeg::{build_cut_args, check_ffmpeg, FfmpegCutter};

use crate::config::AudioFormat;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// One audio window to extract from a source file.
#[derive(Debug, Clone)]
pub struct CutRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Seconds.
    pub start: f64,
    /// Seconds.
    pub duration: f64,
    pub format: AudioFormat,
    pub bitrate: String,
}

impl CutRequest {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Cuts `[start, start + duration)` of the source into `output`.
#[async_trait]
pub trait AudioCutter: Send + Sync {
    /// Returns the path of the written file.
    async fn cut(&self, request: &CutRequest) -> Result<PathBuf>;
    fn name(&self) -> &'static str;
}
