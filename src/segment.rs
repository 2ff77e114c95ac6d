use crate::audio::{AudioCutter, FfmpegCutter};
use crate::config::SegmentConfig;
use crate::error::{Result, YtsegError};
use crate::index::{index_rows, write_index, INDEX_FILE};
use crate::materialize::{MaterializeStats, Materializer, SegmentFailure};
use crate::plan::{plan_segments, Thresholds};
use crate::pool::WorkerPool;
use crate::track::{load_tracks, TranscriptSummary};
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const NO_TRANSCRIPTS_ERROR: &str = "No transcript files available for segmentation.";

/// Overall outcome of one segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// Nothing to segment, or some segments failed.
    Partial,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Result of [`create_segments`].
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub base_track: Option<String>,
    pub index_path: Option<PathBuf>,
    pub segments_dir: PathBuf,
    /// Set when the run could not start, e.g. no transcripts were found.
    pub error: Option<String>,
    pub failures: Vec<SegmentFailure>,
    #[serde(skip)]
    pub total_time: Duration,
}

impl SegmentSummary {
    fn no_input(output_root: &Path) -> Self {
        Self {
            segment_count: 0,
            skipped_count: 0,
            failed_count: 0,
            base_track: None,
            index_path: None,
            segments_dir: output_root.to_path_buf(),
            error: Some(NO_TRANSCRIPTS_ERROR.to_string()),
            failures: Vec::new(),
            total_time: Duration::ZERO,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.error.is_none() && self.failed_count == 0 {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }
}

/// Cut transcript-aligned segments from `source_audio` using ffmpeg.
///
/// Layout under `output_root`:
/// - `index.jsonl`
/// - `<segment_id>/audio.<format>`
/// - `<segment_id>/transcripts.json`
///
/// Existing audio is reused unless `overwrite` is set; bundles are refreshed
/// whenever they differ from the current plan.
pub async fn create_segments(
    source_audio: &Path,
    summary: &TranscriptSummary,
    output_root: &Path,
    config: &SegmentConfig,
) -> Result<SegmentSummary> {
    let cutter =
        Arc::new(FfmpegCutter::new(config.ffmpeg_bin.clone()).with_timeout(config.cut_timeout));
    let cancelled = Arc::new(AtomicBool::new(false));
    create_segments_with(source_audio, summary, output_root, config, cutter, cancelled).await
}

/// [`create_segments`] with an injected cutter and cancellation flag.
pub async fn create_segments_with(
    source_audio: &Path,
    summary: &TranscriptSummary,
    output_root: &Path,
    config: &SegmentConfig,
    cutter: Arc<dyn AudioCutter>,
    cancelled: Arc<AtomicBool>,
) -> Result<SegmentSummary> {
    let start_time = Instant::now();

    config.validate()?;
    let pool = WorkerPool::new(config.workers)?;

    let sources = summary.track_sources();
    if sources.is_empty() {
        warn!("{}", NO_TRANSCRIPTS_ERROR);
        return Ok(SegmentSummary::no_input(output_root));
    }

    std::fs::create_dir_all(output_root)?;
    let tracks = load_tracks(&sources)?;
    let Some(plan) = plan_segments(&tracks, Thresholds::from(config)) else {
        return Ok(SegmentSummary::no_input(output_root));
    };

    let (failures, stats) = if plan.is_empty() {
        (Vec::new(), MaterializeStats::default())
    } else {
        if !source_audio.exists() {
            return Err(YtsegError::FileNotFound(source_audio.display().to_string()));
        }
        let materializer = Materializer::new(cutter, pool)
            .with_overwrite(config.overwrite)
            .with_format(config.audio_format.clone(), config.audio_bitrate.clone())
            .with_progress(config.show_progress)
            .with_cancel_flag(cancelled);
        let (results, stats) = materializer
            .materialize(&plan, source_audio, output_root)
            .await;
        let failures: Vec<SegmentFailure> = results.into_iter().filter_map(|r| r.err()).collect();
        (failures, stats)
    };

    // Every planned segment gets a row, including ones that failed above.
    let index_path = output_root.join(INDEX_FILE);
    let rows = index_rows(&plan, output_root, &config.audio_format);
    write_index(&index_path, &rows)?;

    if stats.failed > 0 {
        warn!(
            "{} of {} segments failed; their index rows point at missing audio",
            stats.failed, stats.total_segments
        );
    }

    let summary = SegmentSummary {
        segment_count: rows.len(),
        skipped_count: plan.skipped_count,
        failed_count: failures.len(),
        base_track: Some(plan.base_track.to_string()),
        index_path: Some(index_path),
        segments_dir: output_root.to_path_buf(),
        error: None,
        failures,
        total_time: start_time.elapsed(),
    };

    info!(
        "Segmentation {}: {} segments, {} skipped, {} failed",
        summary.status(),
        summary.segment_count,
        summary.skipped_count,
        summary.failed_count
    );

    Ok(summary)
}

/// Print a summary of a segmentation run.
pub fn print_summary(summary: &SegmentSummary) {
    let status = match summary.status() {
        RunStatus::Success => style(summary.status()).green(),
        RunStatus::Partial => style(summary.status()).yellow(),
    };

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                     Segmentation Complete                      ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Status:     {}", status);
    println!("  Output:     {}", summary.segments_dir.display());
    if let Some(ref index) = summary.index_path {
        println!("  Index:      {}", index.display());
    }
    if let Some(ref base) = summary.base_track {
        println!("  Base track: {}", base);
    }
    println!();
    println!("  Segments:   {}", summary.segment_count);
    println!("  Skipped:    {}", summary.skipped_count);
    println!("  Failed:     {}", summary.failed_count);
    println!("  Time:       {:.2}s", summary.total_time.as_secs_f64());
    if let Some(ref error) = summary.error {
        println!();
        println!("  {} {}", style("!").yellow(), error);
    }
    for failure in summary.failures.iter().take(10) {
        println!("  {} {}: {}", style("✗").red(), failure.segment_id, failure.error);
    }
    if summary.failures.len() > 10 {
        println!("  ... and {} more", summary.failures.len() - 10);
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
