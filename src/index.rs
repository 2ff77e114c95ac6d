use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::AudioFormat;
use crate::error::{Result, YtsegError};
use crate::plan::{PlannedSegment, SegmentPlan, TrackText};
use crate::track::TrackKey;

pub const INDEX_FILE: &str = "index.jsonl";
pub const BUNDLE_FILE: &str = "transcripts.json";

/// Output locations of one segment under the segments root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPaths {
    pub dir: PathBuf,
    pub audio: PathBuf,
    pub transcripts: PathBuf,
}

impl SegmentPaths {
    pub fn new(output_root: &Path, segment_id: &str, format: &AudioFormat) -> Self {
        let dir = output_root.join(segment_id);
        Self {
            audio: dir.join(format!("audio.{}", format.extension())),
            transcripts: dir.join(BUNDLE_FILE),
            dir,
        }
    }
}

/// One line of `index.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub segment_id: String,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
    pub base_track: String,
    pub audio_path: String,
    pub transcripts_path: String,
    pub base_text: String,
}

/// Contents of a segment's `transcripts.json`.
#[derive(Debug, Serialize)]
pub struct TranscriptBundle<'a> {
    pub segment_id: &'a str,
    pub timing: BundleTiming<'a>,
    pub tracks: BundleTracks<'a>,
}

#[derive(Debug, Serialize)]
pub struct BundleTiming<'a> {
    pub start: f64,
    pub duration: f64,
    pub end: f64,
    pub base_track: &'a TrackKey,
    pub base_entry_index: usize,
}

/// Per-track texts, serialized as an object in track order.
#[derive(Debug)]
pub struct BundleTracks<'a>(&'a [(TrackKey, TrackText)]);

#[derive(Serialize)]
struct BundleTrack<'a> {
    text: &'a str,
    entry_indices: &'a [usize],
    language_code: Option<&'a str>,
    is_generated: Option<bool>,
}

impl Serialize for BundleTracks<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, track) in self.0 {
            map.serialize_entry(
                key,
                &BundleTrack {
                    text: &track.text,
                    entry_indices: &track.entry_indices,
                    language_code: track.language_code.as_deref(),
                    is_generated: track.is_generated,
                },
            )?;
        }
        map.end()
    }
}

impl<'a> TranscriptBundle<'a> {
    pub fn new(segment: &'a PlannedSegment, base_track: &'a TrackKey) -> Self {
        Self {
            segment_id: &segment.segment_id,
            timing: BundleTiming {
                start: segment.start,
                duration: segment.duration,
                end: segment.end,
                base_track,
                base_entry_index: segment.base_entry_index,
            },
            tracks: BundleTracks(&segment.tracks),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One row per planned segment, in plan order.
pub fn index_rows(plan: &SegmentPlan, output_root: &Path, format: &AudioFormat) -> Vec<IndexRow> {
    plan.segments
        .iter()
        .map(|segment| {
            let paths = SegmentPaths::new(output_root, &segment.segment_id, format);
            IndexRow {
                segment_id: segment.segment_id.clone(),
                start: segment.start,
                duration: segment.duration,
                end: segment.end,
                base_track: plan.base_track.to_string(),
                audio_path: paths.audio.to_string_lossy().into_owned(),
                transcripts_path: paths.transcripts.to_string_lossy().into_owned(),
                base_text: segment.base_text.clone(),
            }
        })
        .collect()
}

/// Write rows as JSON lines, replacing any previous index.
pub fn write_index(path: &Path, rows: &[IndexRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!("Wrote {} index rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_index(path: &Path) -> Result<Vec<IndexRow>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(YtsegError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan_segments, Thresholds};
    use crate::track::{TimedEntry, Track, TrackSet};
    use serde_json::Value;
    use tempfile::TempDir;

    fn sample_plan() -> SegmentPlan {
        let mut tracks = TrackSet::new();
        tracks.insert(
            "default",
            Track::new(vec![
                TimedEntry::new("héllo wörld", 0.0, 1.0),
                TimedEntry::new("second", 1.0, 1.5),
            ]),
        );
        tracks.insert(
            "manual_en",
            Track::new(vec![TimedEntry::new("hello world", 0.2, 0.5)])
                .with_language(Some("en".to_string()), Some(false)),
        );
        plan_segments(&tracks, Thresholds::default()).unwrap()
    }

    #[test]
    fn test_segment_paths() {
        let paths = SegmentPaths::new(Path::new("/data/segments"), "000003", &AudioFormat::Flac);
        assert_eq!(paths.dir, PathBuf::from("/data/segments/000003"));
        assert_eq!(paths.audio, PathBuf::from("/data/segments/000003/audio.flac"));
        assert_eq!(
            paths.transcripts,
            PathBuf::from("/data/segments/000003/transcripts.json")
        );
    }

    #[test]
    fn test_bundle_schema() {
        let plan = sample_plan();
        let bundle = TranscriptBundle::new(&plan.segments[0], &plan.base_track);
        let value: Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();

        assert_eq!(value["segment_id"], "000000");
        assert_eq!(value["timing"]["start"], 0.0);
        assert_eq!(value["timing"]["end"], 1.0);
        assert_eq!(value["timing"]["base_track"], "default");
        assert_eq!(value["timing"]["base_entry_index"], 0);
        assert_eq!(value["tracks"]["default"]["text"], "héllo wörld");
        assert_eq!(value["tracks"]["default"]["language_code"], Value::Null);
        assert_eq!(value["tracks"]["manual_en"]["entry_indices"][0], 0);
        assert_eq!(value["tracks"]["manual_en"]["language_code"], "en");
        assert_eq!(value["tracks"]["manual_en"]["is_generated"], false);
    }

    #[test]
    fn test_bundle_tracks_keep_track_order() {
        let plan = sample_plan();
        let json = TranscriptBundle::new(&plan.segments[0], &plan.base_track)
            .to_json()
            .unwrap();
        let default_pos = json.find("\"default\": {").unwrap();
        let manual_pos = json.find("\"manual_en\": {").unwrap();
        assert!(default_pos < manual_pos);
    }

    #[test]
    fn test_write_and_read_index() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan();
        let rows = index_rows(&plan, dir.path(), &AudioFormat::Mp3);
        let path = dir.path().join(INDEX_FILE);

        write_index(&path, &rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("héllo wörld"));
        assert_eq!(read_index(&path).unwrap(), rows);
        assert!(rows[1].audio_path.ends_with("000001/audio.mp3"));
        assert_eq!(rows[1].base_track, "default");
    }

    #[test]
    fn test_write_index_replaces_previous() {
        let dir = TempDir::new().unwrap();
        let plan = sample_plan();
        let rows = index_rows(&plan, dir.path(), &AudioFormat::Mp3);
        let path = dir.path().join(INDEX_FILE);

        write_index(&path, &rows).unwrap();
        write_index(&path, &rows[..1]).unwrap();

        assert_eq!(read_index(&path).unwrap().len(), 1);
    }
}
