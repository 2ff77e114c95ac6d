use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, YtsegError};

use super::{AudioCutter, CutRequest};

/// Check that the ffmpeg binary is installed and runnable.
pub fn check_ffmpeg(bin: &str) -> Result<()> {
    let output = Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            YtsegError::AudioCut(format!(
                "{bin} not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.success() {
        return Err(YtsegError::AudioCut(format!("{bin} -version check failed")));
    }

    debug!("{} is available", bin);
    Ok(())
}

/// Arguments for a single-threaded, re-encoding cut.
pub fn build_cut_args(request: &CutRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-threads",
        "1",
        "-ss",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.push(format!("{:.3}", request.start).into());
    args.push("-t".into());
    args.push(format!("{:.3}", request.duration).into());
    args.push("-i".into());
    args.push(request.source.clone().into_os_string());
    args.push("-vn".into());
    args.extend(
        request
            .format
            .codec_args(&request.bitrate)
            .into_iter()
            .map(OsString::from),
    );
    args.push(request.output.clone().into_os_string());
    args
}

/// [`AudioCutter`] backed by an ffmpeg subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegCutter {
    bin: String,
    timeout: Option<Duration>,
}

impl FfmpegCutter {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeout: None,
        }
    }

    /// Kill ffmpeg if a single cut takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AudioCutter for FfmpegCutter {
    async fn cut(&self, request: &CutRequest) -> Result<PathBuf> {
        debug!(
            "Cutting {:.3}s..{:.3}s into {}",
            request.start,
            request.end(),
            request.output.display()
        );

        let child = tokio::process::Command::new(&self.bin)
            .args(build_cut_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                YtsegError::AudioCut(format!(
                    "{} timed out after {}s",
                    self.bin,
                    limit.as_secs_f64()
                ))
            })?,
            None => child.await,
        }
        .map_err(|e| YtsegError::AudioCut(format!("Failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(YtsegError::AudioCut(format!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                stderr.trim()
            )));
        }

        if !request.output.exists() {
            return Err(YtsegError::AudioCut(
                "Output file was not created".to_string(),
            ));
        }

        Ok(request.output.clone())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioFormat;
    use tempfile::TempDir;

    fn ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn request(dir: &TempDir, format: AudioFormat) -> CutRequest {
        CutRequest {
            source: dir.path().join("source.wav"),
            output: dir.path().join(format!("out.{}", format.extension())),
            start: 1.0,
            duration: 0.5,
            format,
            bitrate: "64k".to_string(),
        }
    }

    #[test]
    fn test_build_cut_args() {
        let dir = TempDir::new().unwrap();
        let req = request(&dir, AudioFormat::Mp3);
        let args: Vec<String> = build_cut_args(&req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(&args[..7], &["-hide_banner", "-loglevel", "error", "-y", "-threads", "1", "-ss"]);
        assert_eq!(args[7], "1.000");
        assert_eq!(args[8], "-t");
        assert_eq!(args[9], "0.500");
        assert_eq!(args[10], "-i");
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"64k".to_string()));
        assert!(args.last().unwrap().ends_with("out.mp3"));
    }

    #[test]
    fn test_build_cut_args_unknown_format_has_no_codec() {
        let dir = TempDir::new().unwrap();
        let req = request(&dir, AudioFormat::Other("ogg".to_string()));
        let args: Vec<String> = build_cut_args(&req)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(!args.contains(&"-c:a".to_string()));
        assert_eq!(args[args.len() - 2], "-vn");
    }

    #[test]
    fn test_check_missing_binary() {
        assert!(check_ffmpeg("definitely-not-a-real-ffmpeg-binary").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_cut() {
        let dir = TempDir::new().unwrap();
        let cutter = FfmpegCutter::new("definitely-not-a-real-ffmpeg-binary");
        let result = cutter.cut(&request(&dir, AudioFormat::Wav)).await;
        assert!(matches!(result, Err(YtsegError::AudioCut(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_cut_times_out() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("hanging-ffmpeg");
        std::fs::write(&bin, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cutter = FfmpegCutter::new(bin.to_string_lossy())
            .with_timeout(Some(Duration::from_millis(300)));
        let started = Instant::now();
        let result = cutter.cut(&request(&dir, AudioFormat::Wav)).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        match result {
            Err(YtsegError::AudioCut(msg)) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cut_real_audio() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = TempDir::new().unwrap();
        let req = request(&dir, AudioFormat::Wav);
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
            .arg("sine=frequency=440:duration=3")
            .arg(&req.source)
            .status()
            .unwrap();
        assert!(status.success());

        let cutter = FfmpegCutter::new("ffmpeg").with_timeout(Some(Duration::from_secs(30)));
        let path = cutter.cut(&req).await.unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 44);
    }

    #[tokio::test]
    async fn test_cut_missing_source_fails() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = TempDir::new().unwrap();
        let cutter = FfmpegCutter::new("ffmpeg");
        let result = cutter.cut(&request(&dir, AudioFormat::Wav)).await;
        assert!(result.is_err());
    }
}
