use crate::audio::{AudioCutter, CutRequest};
use crate::config::AudioFormat;
use crate::error::{Result, YtsegError};
use crate::index::{SegmentPaths, TranscriptBundle};
use crate::plan::{PlannedSegment, SegmentPlan};
use crate::pool::WorkerPool;
use crate::track::TrackKey;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactAction {
    Written,
    /// Already present and overwrite was off.
    Skipped,
}

/// A segment whose audio and bundle are both on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOutcome {
    pub segment_id: String,
    pub audio: ArtifactAction,
    pub bundle: ArtifactAction,
    pub audio_path: PathBuf,
    pub transcripts_path: PathBuf,
}

/// A segment that could not be materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFailure {
    pub segment_id: String,
    pub error: String,
}

pub type SegmentResult = std::result::Result<SegmentOutcome, SegmentFailure>;

/// Statistics from materializing a plan.
#[derive(Debug, Clone, Default)]
pub struct MaterializeStats {
    pub total_segments: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub audio_cut: usize,
    pub audio_skipped: usize,
    pub bundles_written: usize,
    pub total_time: Duration,
}

impl MaterializeStats {
    pub fn from_results(results: &[SegmentResult], total_time: Duration) -> Self {
        let mut stats = Self {
            total_segments: results.len(),
            total_time,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(outcome) => {
                    stats.succeeded += 1;
                    match outcome.audio {
                        ArtifactAction::Written => stats.audio_cut += 1,
                        ArtifactAction::Skipped => stats.audio_skipped += 1,
                    }
                    if outcome.bundle == ArtifactAction::Written {
                        stats.bundles_written += 1;
                    }
                }
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// Cuts audio and writes transcript bundles for every planned segment.
pub struct Materializer {
    cutter: Arc<dyn AudioCutter>,
    pool: WorkerPool,
    overwrite: bool,
    format: AudioFormat,
    bitrate: String,
    show_progress: bool,
    cancelled: Arc<AtomicBool>,
}

impl Materializer {
    pub fn new(cutter: Arc<dyn AudioCutter>, pool: WorkerPool) -> Self {
        Self {
            cutter,
            pool,
            overwrite: false,
            format: AudioFormat::default(),
            bitrate: "128k".to_string(),
            show_progress: true,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Redo artifacts that already exist.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_format(mut self, format: AudioFormat, bitrate: impl Into<String>) -> Self {
        self.format = format;
        self.bitrate = bitrate.into();
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Segments not yet started when the flag is set fail with [`YtsegError::Cancelled`].
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Materialize every segment of `plan`; results are in plan order.
    ///
    /// A failing segment is recorded and does not stop the others.
    pub async fn materialize(
        &self,
        plan: &SegmentPlan,
        source_audio: &Path,
        output_root: &Path,
    ) -> (Vec<SegmentResult>, MaterializeStats) {
        let start_time = Instant::now();
        let total = plan.segments.len();

        info!(
            "Materializing {} segments with {} workers using {}",
            total,
            self.pool.size(),
            self.cutter.name()
        );

        let progress_bar = if self.show_progress && total > 0 {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let segments: Vec<&PlannedSegment> = plan.segments.iter().collect();
        let results = self
            .pool
            .run(segments, |segment| {
                let pb = progress_bar.clone();
                async move {
                    let result = self
                        .materialize_segment(segment, &plan.base_track, source_audio, output_root)
                        .await
                        .map_err(|e| {
                            warn!("Segment {} failed: {}", segment.segment_id, e);
                            SegmentFailure {
                                segment_id: segment.segment_id.clone(),
                                error: e.to_string(),
                            }
                        });
                    if let Some(ref pb) = pb {
                        pb.inc(1);
                    }
                    result
                }
            })
            .await;

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Segmentation complete");
        }

        let stats = MaterializeStats::from_results(&results, start_time.elapsed());
        info!(
            "Materialized {}/{} segments in {:.2}s ({} cut, {} already present, {} failed)",
            stats.succeeded,
            stats.total_segments,
            stats.total_time.as_secs_f64(),
            stats.audio_cut,
            stats.audio_skipped,
            stats.failed
        );

        (results, stats)
    }

    async fn materialize_segment(
        &self,
        segment: &PlannedSegment,
        base_track: &TrackKey,
        source_audio: &Path,
        output_root: &Path,
    ) -> Result<SegmentOutcome> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(YtsegError::Cancelled);
        }

        let paths = SegmentPaths::new(output_root, &segment.segment_id, &self.format);
        tokio::fs::create_dir_all(&paths.dir).await?;

        let audio = if self.overwrite || !paths.audio.exists() {
            self.cut_audio(segment, source_audio, &paths).await?;
            ArtifactAction::Written
        } else {
            debug!("Audio for segment {} exists, skipping cut", segment.segment_id);
            ArtifactAction::Skipped
        };

        // A bundle left by a run with other thresholds is stale; only identical ones are kept.
        let json = TranscriptBundle::new(segment, base_track).to_json()?;
        let unchanged = !self.overwrite
            && tokio::fs::read(&paths.transcripts)
                .await
                .is_ok_and(|existing| existing == json.as_bytes());
        let bundle = if unchanged {
            ArtifactAction::Skipped
        } else {
            write_atomic(&paths.dir, &paths.transcripts, json.as_bytes())?;
            ArtifactAction::Written
        };

        Ok(SegmentOutcome {
            segment_id: segment.segment_id.clone(),
            audio,
            bundle,
            audio_path: paths.audio,
            transcripts_path: paths.transcripts,
        })
    }

    /// Cut into a scratch directory beside the target and move into place on success.
    async fn cut_audio(
        &self,
        segment: &PlannedSegment,
        source_audio: &Path,
        paths: &SegmentPaths,
    ) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix(".cut-")
            .tempdir_in(&paths.dir)?;

        let request = CutRequest {
            source: source_audio.to_path_buf(),
            output: scratch.path().join(format!("audio.{}", self.format.extension())),
            start: segment.start,
            duration: segment.duration,
            format: self.format.clone(),
            bitrate: self.bitrate.clone(),
        };

        let written = self.cutter.cut(&request).await?;
        tokio::fs::rename(&written, &paths.audio).await?;
        Ok(())
    }
}

fn write_atomic(dir: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.persist(target).map_err(|e| e.error)?;
    Ok(())
}
