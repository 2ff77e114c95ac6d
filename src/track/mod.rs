pub mod load;
pub mod summary;

pub use load::{load_track, load_tracks, parse_entries};
pub use summary::{AvailableTranscript, TrackSource, TranscriptSummary};

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Key of the track that is preferred as segmentation base.
pub const DEFAULT_TRACK: &str = "default";

/// One timed caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEntry {
    pub text: String,
    /// Seconds from the start of the source audio. Not clamped.
    pub start: f64,
    /// Seconds, never negative.
    pub duration: f64,
}

impl TimedEntry {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration: duration.max(0.0),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Open-interval overlap with `[start, end)`; touching intervals do not overlap.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.end() > start && self.start < end
    }
}

/// A caption stream: ordered entries plus language metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub entries: Vec<TimedEntry>,
    pub language_code: Option<String>,
    /// `None` when unknown (the default track).
    pub is_generated: Option<bool>,
}

impl Track {
    pub fn new(entries: Vec<TimedEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language_code: Option<String>, is_generated: Option<bool>) -> Self {
        self.language_code = language_code;
        self.is_generated = is_generated;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("Invalid regex"))
}

/// Sanitized track identifier, safe to use as a JSON key and file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrackKey(String);

impl TrackKey {
    /// Replace runs of unsafe characters with `_` and strip surrounding underscores.
    pub fn sanitize(raw: &str) -> Self {
        let replaced = unsafe_chars().replace_all(raw.trim(), "_");
        let key = replaced.trim_matches('_');
        if key.is_empty() {
            TrackKey("track".to_string())
        } else {
            TrackKey(key.to_string())
        }
    }

    /// Sanitize `raw`, appending `_2`, `_3`, ... until the key is not taken.
    pub fn unique(raw: &str, is_taken: impl Fn(&TrackKey) -> bool) -> Self {
        let base = Self::sanitize(raw);
        let mut key = base.clone();
        let mut counter = 2;
        while is_taken(&key) {
            key = TrackKey(format!("{}_{}", base.0, counter));
            counter += 1;
        }
        key
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracks keyed by [`TrackKey`], iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: Vec<(TrackKey, Track)>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track under a unique key derived from `raw_key` and return that key.
    pub fn insert(&mut self, raw_key: &str, track: Track) -> TrackKey {
        let key = TrackKey::unique(raw_key, |k| self.contains_key(k.as_str()));
        self.tracks.push((key.clone(), track));
        key
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tracks.iter().any(|(k, _)| k.as_str() == key)
    }

    pub fn get(&self, key: &TrackKey) -> Option<&Track> {
        self.tracks.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrackKey, &Track)> {
        self.tracks.iter().map(|(k, t)| (k, t))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The `default` track if present, otherwise the first inserted track.
    pub fn base_key(&self) -> Option<&TrackKey> {
        self.tracks
            .iter()
            .map(|(k, _)| k)
            .find(|k| k.as_str() == DEFAULT_TRACK)
            .or_else(|| self.tracks.first().map(|(k, _)| k))
    }
}
