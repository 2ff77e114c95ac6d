use tracing::{debug, info};

use crate::config::SegmentConfig;
use crate::track::{TimedEntry, TrackKey, TrackSet};

/// Keep/drop thresholds applied to base-track entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum entry duration in seconds.
    pub min_duration: f64,
    /// Minimum number of characters after trimming.
    pub min_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_duration: 0.25,
            min_chars: 1,
        }
    }
}

impl From<&SegmentConfig> for Thresholds {
    fn from(config: &SegmentConfig) -> Self {
        Self {
            min_duration: config.min_duration,
            min_chars: config.min_chars,
        }
    }
}

/// Text of one track inside a segment window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackText {
    pub text: String,
    /// Indices into the track's entry list.
    pub entry_indices: Vec<usize>,
    pub language_code: Option<String>,
    pub is_generated: Option<bool>,
}

/// One kept base-track entry with its aligned multi-track text.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    pub segment_id: String,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
    pub base_entry_index: usize,
    pub base_text: String,
    /// Every loaded track (base included) in track order.
    pub tracks: Vec<(TrackKey, TrackText)>,
}

/// Full segmentation plan, computed before any audio is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub base_track: TrackKey,
    pub segments: Vec<PlannedSegment>,
    pub skipped_count: usize,
}

impl SegmentPlan {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Zero-padded six digit segment identifier.
pub fn format_segment_id(index: usize) -> String {
    format!("{:06}", index)
}

/// Concatenate trimmed, non-empty texts of entries overlapping `[start, end)`.
///
/// Entries are scanned in full; ordering is not assumed.
pub fn collect_text_in_window(entries: &[TimedEntry], start: f64, end: f64) -> (String, Vec<usize>) {
    let mut texts = Vec::new();
    let mut indices = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        if !entry.overlaps(start, end) {
            continue;
        }
        let text = entry.text.trim();
        if text.is_empty() {
            continue;
        }
        texts.push(text);
        indices.push(idx);
    }

    (texts.join(" "), indices)
}

/// Build the segment plan from the loaded tracks.
///
/// Returns `None` when no tracks are available. Segment IDs are dense and
/// follow base-track order; dropped entries never leave a gap.
pub fn plan_segments(tracks: &TrackSet, thresholds: Thresholds) -> Option<SegmentPlan> {
    let base_track = tracks.base_key()?.clone();
    let base_entries = tracks.get(&base_track).map(|t| t.entries.as_slice())?;

    let mut segments = Vec::new();
    let mut skipped_count = 0;

    for (base_entry_index, entry) in base_entries.iter().enumerate() {
        let text = entry.text.trim();
        if entry.duration < thresholds.min_duration || text.chars().count() < thresholds.min_chars {
            debug!(
                "Skipping base entry {} ({:.3}s, {} chars)",
                base_entry_index,
                entry.duration,
                text.chars().count()
            );
            skipped_count += 1;
            continue;
        }

        let start = entry.start.max(0.0);
        let duration = entry.duration;
        let end = start + duration;

        let aligned = tracks
            .iter()
            .map(|(key, track)| {
                let (text, entry_indices) = collect_text_in_window(&track.entries, start, end);
                (
                    key.clone(),
                    TrackText {
                        text,
                        entry_indices,
                        language_code: track.language_code.clone(),
                        is_generated: track.is_generated,
                    },
                )
            })
            .collect();

        segments.push(PlannedSegment {
            segment_id: format_segment_id(segments.len()),
            start,
            duration,
            end,
            base_entry_index,
            base_text: text.to_string(),
            tracks: aligned,
        });
    }

    info!(
        "Planned {} segments from base track '{}' ({} entries skipped)",
        segments.len(),
        base_track,
        skipped_count
    );

    Some(SegmentPlan {
        base_track,
        segments,
        skipped_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;

    fn track(entries: &[(&str, f64, f64)]) -> Track {
        Track::new(
            entries
                .iter()
                .map(|(text, start, duration)| TimedEntry::new(*text, *start, *duration))
                .collect(),
        )
    }

    #[test]
    fn test_format_segment_id() {
        assert_eq!(format_segment_id(0), "000000");
        assert_eq!(format_segment_id(42), "000042");
        assert_eq!(format_segment_id(1_234_567), "1234567");
    }

    #[test]
    fn test_empty_track_set_has_no_plan() {
        assert!(plan_segments(&TrackSet::new(), Thresholds::default()).is_none());
    }

    #[test]
    fn test_short_and_empty_entries_skipped() {
        let mut tracks = TrackSet::new();
        tracks.insert(
            "default",
            track(&[("hello world", 0.0, 1.0), ("x", 1.0, 0.1)]),
        );

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.skipped_count, 1);
        assert_eq!(plan.segments[0].segment_id, "000000");
        assert_eq!(plan.segments[0].base_text, "hello world");
    }

    #[test]
    fn test_empty_text_skipped() {
        let mut tracks = TrackSet::new();
        tracks.insert("default", track(&[("   ", 0.0, 1.0), ("hi", 1.0, 0.1)]));

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.skipped_count, 2);
    }

    #[test]
    fn test_ids_are_dense_after_skips() {
        let mut tracks = TrackSet::new();
        tracks.insert(
            "default",
            track(&[
                ("a", 0.0, 1.0),
                ("", 1.0, 1.0),
                ("b", 2.0, 0.1),
                ("c", 3.0, 1.0),
                ("d", 4.0, 1.0),
            ]),
        );

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        let ids: Vec<&str> = plan.segments.iter().map(|s| s.segment_id.as_str()).collect();
        let base_indices: Vec<usize> = plan.segments.iter().map(|s| s.base_entry_index).collect();
        assert_eq!(ids, vec!["000000", "000001", "000002"]);
        assert_eq!(base_indices, vec![0, 3, 4]);
        assert_eq!(plan.len() + plan.skipped_count, 5);
    }

    #[test]
    fn test_min_chars_counts_characters() {
        let mut tracks = TrackSet::new();
        tracks.insert("default", track(&[("日本", 0.0, 1.0)]));

        let thresholds = Thresholds {
            min_duration: 0.25,
            min_chars: 3,
        };
        let plan = plan_segments(&tracks, thresholds).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_negative_start_clamped() {
        let mut tracks = TrackSet::new();
        tracks.insert("default", track(&[("early", -0.5, 1.0)]));

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        let segment = &plan.segments[0];
        assert_eq!(segment.start, 0.0);
        assert_eq!(segment.end, 1.0);
    }

    #[test]
    fn test_cross_track_overlap() {
        let mut tracks = TrackSet::new();
        tracks.insert("default", track(&[("base", 2.0, 1.0)]));
        tracks.insert(
            "manual_de",
            track(&[("before", 1.5, 1.0), ("after", 3.0, 0.5), ("inside", 2.2, 0.3)]),
        );

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        let segment = &plan.segments[0];
        let (key, other) = &segment.tracks[1];
        assert_eq!(key.as_str(), "manual_de");
        assert_eq!(other.text, "before inside");
        assert_eq!(other.entry_indices, vec![0, 2]);

        let (base_key, base) = &segment.tracks[0];
        assert_eq!(base_key.as_str(), "default");
        assert_eq!(base.text, "base");
        assert_eq!(base.entry_indices, vec![0]);
    }

    #[test]
    fn test_base_track_falls_back_to_first() {
        let mut tracks = TrackSet::new();
        tracks.insert("manual_en", track(&[("one", 0.0, 1.0)]));
        tracks.insert("auto_en", track(&[("uno", 0.0, 1.0)]));

        let plan = plan_segments(&tracks, Thresholds::default()).unwrap();
        assert_eq!(plan.base_track.as_str(), "manual_en");
    }

    #[test]
    fn test_collect_skips_blank_text() {
        let entries = vec![
            TimedEntry::new("  a ", 0.0, 1.0),
            TimedEntry::new("", 0.5, 1.0),
            TimedEntry::new("b", 0.9, 1.0),
        ];
        let (text, indices) = collect_text_in_window(&entries, 0.0, 1.0);
        assert_eq!(text, "a b");
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let mut tracks = TrackSet::new();
        tracks.insert("default", track(&[("a", 0.0, 1.0), ("b", 1.0, 1.0)]));
        tracks.insert("auto_en", track(&[("x", 0.5, 1.0)]));

        let first = plan_segments(&tracks, Thresholds::default());
        let second = plan_segments(&tracks, Thresholds::default());
        assert_eq!(first, second);
    }
}
