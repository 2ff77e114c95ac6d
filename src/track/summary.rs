use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, YtsegError};

use super::{TrackKey, DEFAULT_TRACK};

/// Caption files available for one video, as written by the transcript fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSummary {
    pub default_path: Option<PathBuf>,
    pub auto_language_path: Option<PathBuf>,
    pub auto_language_code: Option<String>,
    #[serde(deserialize_with = "lenient_available")]
    pub available: Vec<AvailableTranscript>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailableTranscript {
    pub language: Option<String>,
    pub language_code: Option<String>,
    #[serde(deserialize_with = "null_as_false")]
    pub is_generated: bool,
    pub path: Option<PathBuf>,
}

/// Keep the `available` items that parse; anything else is dropped.
fn lenient_available<'de, D>(deserializer: D) -> std::result::Result<Vec<AvailableTranscript>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                debug!("Ignoring malformed available transcript: {}", e);
                None
            }
        })
        .collect())
}

fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// A caption file selected for segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    pub key: TrackKey,
    pub path: PathBuf,
    pub language_code: Option<String>,
    pub is_generated: Option<bool>,
}

impl TranscriptSummary {
    /// Read a summary JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(YtsegError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build a summary from a transcripts directory.
    ///
    /// Layout: `default.json`, `auto_<code>.json` or `auto_detected_<code>.json`,
    /// `manual/<code>.json` and `auto/<code>.json`.
    pub fn discover(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(YtsegError::FileNotFound(dir.display().to_string()));
        }

        let mut summary = Self::default();

        let default_path = dir.join(format!("{DEFAULT_TRACK}.json"));
        if default_path.is_file() {
            summary.default_path = Some(default_path);
        }

        for (stem, path) in json_files(dir)? {
            let code = stem
                .strip_prefix("auto_detected_")
                .or_else(|| stem.strip_prefix("auto_"));
            if let Some(code) = code.filter(|c| !c.is_empty()) {
                summary.auto_language_code = Some(code.to_string());
                summary.auto_language_path = Some(path);
                break;
            }
        }

        for (kind, is_generated) in [("manual", false), ("auto", true)] {
            let kind_dir = dir.join(kind);
            if !kind_dir.is_dir() {
                continue;
            }
            for (code, path) in json_files(&kind_dir)? {
                summary.available.push(AvailableTranscript {
                    language: None,
                    language_code: Some(code),
                    is_generated,
                    path: Some(path),
                });
            }
        }

        debug!(
            "Discovered transcripts in {}: default={}, auto={:?}, available={}",
            dir.display(),
            summary.default_path.is_some(),
            summary.auto_language_code,
            summary.available.len()
        );

        Ok(summary)
    }

    /// Select the caption files that exist on disk, with unique track keys.
    ///
    /// Order: default, designated auto-language track, then `available` in order.
    pub fn track_sources(&self) -> Vec<TrackSource> {
        let mut sources: Vec<TrackSource> = Vec::new();

        let mut add = |raw_key: String,
                       path: Option<&PathBuf>,
                       language_code: Option<String>,
                       is_generated: Option<bool>| {
            let Some(path) = path else {
                return;
            };
            if !path.exists() {
                debug!("Transcript {} missing on disk, skipping", path.display());
                return;
            }
            let key = TrackKey::unique(&raw_key, |k| sources.iter().any(|s| &s.key == k));
            sources.push(TrackSource {
                key,
                path: path.clone(),
                language_code,
                is_generated,
            });
        };

        add(DEFAULT_TRACK.to_string(), self.default_path.as_ref(), None, None);
        add(
            format!(
                "auto_target_{}",
                self.auto_language_code.as_deref().unwrap_or("unknown")
            ),
            self.auto_language_path.as_ref(),
            self.auto_language_code.clone(),
            Some(true),
        );

        for item in &self.available {
            let code = item
                .language_code
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            let kind = if item.is_generated { "auto" } else { "manual" };
            add(
                format!("{kind}_{code}"),
                item.path.as_ref(),
                Some(code),
                Some(item.is_generated),
            );
        }

        sources
    }
}

/// `(file stem, path)` of every `*.json` file in `dir`, sorted by name.
fn json_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}
