use crate::error::{Result, YtsegError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Audio container/codec for segment cuts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
    Opus,
    M4a,
    Aac,
    /// Any other extension; ffmpeg picks the codec from the extension.
    Other(String),
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if name.is_empty() {
            return Err("Audio format must not be empty".to_string());
        }
        Ok(match name.as_str() {
            "mp3" => AudioFormat::Mp3,
            "wav" | "wave" => AudioFormat::Wav,
            "flac" => AudioFormat::Flac,
            "opus" => AudioFormat::Opus,
            "m4a" => AudioFormat::M4a,
            "aac" => AudioFormat::Aac,
            _ => AudioFormat::Other(name),
        })
    }
}

impl TryFrom<String> for AudioFormat {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AudioFormat> for String {
    fn from(value: AudioFormat) -> Self {
        value.extension().to_string()
    }
}

impl AudioFormat {
    /// File extension used for `audio.<ext>`.
    pub fn extension(&self) -> &str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Opus => "opus",
            AudioFormat::M4a => "m4a",
            AudioFormat::Aac => "aac",
            AudioFormat::Other(ext) => ext,
        }
    }

    /// Encoder arguments passed to ffmpeg for this format.
    ///
    /// Unrecognized formats return no arguments and leave codec selection to ffmpeg.
    pub fn codec_args(&self, bitrate: &str) -> Vec<String> {
        let args: &[&str] = match self {
            AudioFormat::Mp3 => &["-c:a", "libmp3lame", "-b:a", bitrate],
            AudioFormat::Wav => &["-c:a", "pcm_s16le"],
            AudioFormat::Flac => &["-c:a", "flac"],
            AudioFormat::Opus => &["-c:a", "libopus", "-b:a", bitrate],
            AudioFormat::M4a | AudioFormat::Aac => &["-c:a", "aac", "-b:a", bitrate],
            AudioFormat::Other(_) => &[],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

/// Settings for a single segmentation run.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Re-cut audio and rewrite bundles even when they already exist.
    pub overwrite: bool,
    /// Base entries shorter than this (seconds) are skipped.
    pub min_duration: f64,
    /// Base entries with fewer trimmed characters are skipped.
    pub min_chars: usize,
    pub audio_format: AudioFormat,
    pub audio_bitrate: String,
    /// Number of segments materialized concurrently.
    pub workers: usize,
    pub ffmpeg_bin: String,
    /// Upper bound for a single ffmpeg invocation. `None` waits forever.
    pub cut_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            min_duration: 0.25,
            min_chars: 1,
            audio_format: AudioFormat::default(),
            audio_bitrate: "128k".to_string(),
            workers: 1,
            ffmpeg_bin: "ffmpeg".to_string(),
            cut_timeout: Some(Duration::from_secs(300)),
            show_progress: true,
        }
    }
}

impl SegmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 {
            return Err(YtsegError::Config("workers must be >= 1".to_string()));
        }
        if !self.min_duration.is_finite() || self.min_duration < 0.0 {
            return Err(YtsegError::Config(format!(
                "min_duration must be a non-negative number, got {}",
                self.min_duration
            )));
        }
        if self.audio_bitrate.trim().is_empty() {
            return Err(YtsegError::Config(
                "Segment bitrate must not be empty".to_string(),
            ));
        }
        if self.ffmpeg_bin.trim().is_empty() {
            return Err(YtsegError::Config(
                "ffmpeg binary must not be empty".to_string(),
            ));
        }
        if self.cut_timeout.is_some_and(|t| t.is_zero()) {
            return Err(YtsegError::Config(
                "Cut timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persistent defaults, read from `config.toml` and the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ffmpeg_bin: String,
    pub segment_format: AudioFormat,
    pub segment_bitrate: String,
    /// 0 means auto.
    pub segment_workers: usize,
    pub min_duration: f64,
    pub min_chars: usize,
    /// 0 disables the timeout.
    pub cut_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            segment_format: AudioFormat::default(),
            segment_bitrate: "128k".to_string(),
            segment_workers: 0,
            min_duration: 0.25,
            min_chars: 1,
            cut_timeout_secs: 300,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!("Ignoring invalid config file {}: {}", config_path.display(), e),
                }
            }
        }

        // Override with environment variables
        if let Ok(bin) = std::env::var("YTSEG_FFMPEG_BIN") {
            config.ffmpeg_bin = bin;
        }
        if let Ok(format) = std::env::var("YTSEG_SEGMENT_FORMAT") {
            if let Ok(f) = format.parse() {
                config.segment_format = f;
            }
        }
        if let Ok(bitrate) = std::env::var("YTSEG_SEGMENT_BITRATE") {
            config.segment_bitrate = bitrate;
        }
        if let Ok(workers) = std::env::var("YTSEG_SEGMENT_WORKERS") {
            if let Ok(w) = workers.parse() {
                config.segment_workers = w;
            }
        }

        Ok(config)
    }

    /// Build run settings, resolving automatic worker counts.
    pub fn segment_config(&self, video_workers: usize) -> SegmentConfig {
        SegmentConfig {
            min_duration: self.min_duration,
            min_chars: self.min_chars,
            audio_format: self.segment_format.clone(),
            audio_bitrate: self.segment_bitrate.clone(),
            workers: resolve_workers(self.segment_workers, video_workers),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            cut_timeout: (self.cut_timeout_secs > 0)
                .then(|| Duration::from_secs(self.cut_timeout_secs)),
            ..SegmentConfig::default()
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ytseg").join("config.toml"))
    }
}

/// Resolve a requested segment worker count, where 0 means auto.
///
/// Auto keeps the total number of concurrent ffmpeg processes near the CPU
/// count when `video_workers` videos are processed side by side.
pub fn resolve_workers(requested: usize, video_workers: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpu_count / video_workers.max(1)).max(1)
}
