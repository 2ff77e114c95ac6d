use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;

use super::summary::TrackSource;
use super::{TimedEntry, Track, TrackSet};

/// Read a caption file (a JSON array of `{text, start, duration}` objects).
///
/// A top-level value that is not an array yields an empty track.
pub fn load_track(path: &Path) -> Result<Track> {
    let contents = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    let entries = parse_entries(&value);
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(Track::new(entries))
}

/// Normalize raw caption records.
///
/// Non-object elements are skipped. Missing fields default to `""` / `0.0`,
/// text is trimmed and negative durations become zero.
pub fn parse_entries(value: &Value) -> Vec<TimedEntry> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let text = match obj.get("text") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.trim().to_string(),
                Some(other) => other.to_string(),
            };
            TimedEntry::new(
                text,
                number_field(obj.get("start")),
                number_field(obj.get("duration")),
            )
        })
        .collect()
}

fn number_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Load every source into a [`TrackSet`], preserving source order.
pub fn load_tracks(sources: &[TrackSource]) -> Result<TrackSet> {
    let mut set = TrackSet::new();
    for source in sources {
        let track = load_track(&source.path)?
            .with_language(source.language_code.clone(), source.is_generated);
        set.insert(source.key.as_str(), track);
    }
    info!(
        "Loaded {} transcript tracks ({} entries total)",
        set.len(),
        set.iter().map(|(_, t)| t.len()).sum::<usize>()
    );
    Ok(set)
}
