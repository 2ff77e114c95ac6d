use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use ytseg::audio::{check_ffmpeg, FfmpegCutter};
use ytseg::config::{AudioFormat, Config, SegmentConfig};
use ytseg::{create_segments_with, print_summary, RunStatus, TranscriptSummary};

#[derive(Parser)]
#[command(name = "ytseg")]
#[command(version, about = "Cut transcript-aligned audio segments for ASR/TTS datasets")]
#[command(long_about = "Split a downloaded audio track into one clip per caption line, \
with every available caption track aligned into each clip's time window.")]
struct Cli {
    /// Source audio file
    audio: PathBuf,

    /// Output directory for segments and index.jsonl
    #[arg(short, long)]
    output: PathBuf,

    /// Transcript summary JSON (default_path, auto_language_path, available)
    #[arg(short, long, conflicts_with = "transcripts_dir", required_unless_present = "transcripts_dir")]
    transcripts: Option<PathBuf>,

    /// Transcripts directory (default.json, auto_<lang>.json, manual/, auto/)
    #[arg(long)]
    transcripts_dir: Option<PathBuf>,

    /// Segment audio format: mp3, wav, flac, opus, m4a, aac, ...
    #[arg(short, long)]
    format: Option<String>,

    /// Bitrate for compressed segment formats
    #[arg(short, long)]
    bitrate: Option<String>,

    /// Minimum caption duration in seconds
    #[arg(long)]
    min_duration: Option<f64>,

    /// Minimum caption length in characters
    #[arg(long)]
    min_chars: Option<usize>,

    /// Concurrent ffmpeg jobs (0 = auto)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Videos processed side by side, used to size automatic workers
    #[arg(long, default_value = "1")]
    video_workers: usize,

    /// ffmpeg binary path or name
    #[arg(long)]
    ffmpeg_bin: Option<String>,

    /// Per-cut timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Re-cut and rewrite segments that already exist
    #[arg(long)]
    overwrite: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn build_segment_config(cli: &Cli, config: &mut Config) -> Result<SegmentConfig> {
    if let Some(ref format) = cli.format {
        config.segment_format = format
            .parse::<AudioFormat>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(ref bitrate) = cli.bitrate {
        config.segment_bitrate = bitrate.clone();
    }
    if let Some(min_duration) = cli.min_duration {
        config.min_duration = min_duration;
    }
    if let Some(min_chars) = cli.min_chars {
        config.min_chars = min_chars;
    }
    if let Some(workers) = cli.workers {
        config.segment_workers = workers;
    }
    if let Some(ref bin) = cli.ffmpeg_bin {
        config.ffmpeg_bin = bin.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.cut_timeout_secs = timeout;
    }

    let mut segment_config = config.segment_config(cli.video_workers);
    segment_config.overwrite = cli.overwrite;
    segment_config.show_progress = !cli.no_progress && !cli.json;
    segment_config
        .validate()
        .context("Configuration validation failed")?;
    Ok(segment_config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.audio.exists() {
        anyhow::bail!("Audio file not found: {}", cli.audio.display());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    let segment_config = build_segment_config(&cli, &mut config)?;

    let summary = match (&cli.transcripts, &cli.transcripts_dir) {
        (Some(path), _) => TranscriptSummary::from_file(path)
            .with_context(|| format!("Failed to read transcript summary {}", path.display()))?,
        (None, Some(dir)) => TranscriptSummary::discover(dir)
            .with_context(|| format!("Failed to scan transcripts in {}", dir.display()))?,
        (None, None) => anyhow::bail!("Either --transcripts or --transcripts-dir is required"),
    };

    check_ffmpeg(&segment_config.ffmpeg_bin).context("ffmpeg is required for cutting segments")?;

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, finishing running cuts");
            cancelled.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    info!("Audio:    {}", cli.audio.display());
    info!("Output:   {}", cli.output.display());
    info!(
        "Format:   {} @ {}",
        segment_config.audio_format, segment_config.audio_bitrate
    );
    info!("Workers:  {}", segment_config.workers);

    let cutter = Arc::new(
        FfmpegCutter::new(segment_config.ffmpeg_bin.clone())
            .with_timeout(segment_config.cut_timeout),
    );
    let summary = create_segments_with(
        &cli.audio,
        &summary,
        &cli.output,
        &segment_config,
        cutter,
        cancelled.clone(),
    )
    .await
    .context("Segmentation failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if cancelled.load(Ordering::Relaxed) {
        anyhow::bail!("Interrupted; rerun to resume the remaining segments");
    }
    if summary.status() == RunStatus::Partial {
        warn!(
            "Finished with status partial after {:.1}s",
            summary.total_time.as_secs_f64()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_requires_transcripts() {
        assert!(Cli::try_parse_from(["ytseg", "a.mp3", "-o", "out"]).is_err());
        assert!(Cli::try_parse_from([
            "ytseg", "a.mp3", "-o", "out", "-t", "s.json", "--transcripts-dir", "t"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = parse(&[
            "ytseg", "a.mp3", "-o", "out", "--transcripts-dir", "t", "-f", "flac", "-w", "3",
            "--min-chars", "2", "--timeout", "0", "--overwrite",
        ]);
        let mut config = Config::default();
        let segment = build_segment_config(&cli, &mut config).unwrap();

        assert_eq!(segment.audio_format, AudioFormat::Flac);
        assert_eq!(segment.workers, 3);
        assert_eq!(segment.min_chars, 2);
        assert!(segment.cut_timeout.is_none());
        assert!(segment.overwrite);
    }

    #[test]
    fn test_cli_rejects_negative_min_duration() {
        let cli = parse(&[
            "ytseg", "a.mp3", "-o", "out", "-t", "s.json", "--min-duration=-1",
        ]);
        let mut config = Config::default();
        assert!(build_segment_config(&cli, &mut config).is_err());
    }
}
