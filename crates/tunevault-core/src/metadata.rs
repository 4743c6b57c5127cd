//! Parsing of fetch-tool metadata output into song records.
//!
//! The fetch tool emits one JSON object per line (`--dump-json`). Each line
//! describes a single track; a playlist URL produces many lines. Lines that
//! fail to parse are skipped with a warning so one corrupt entry never sinks
//! the rest of the batch.

use serde::Deserialize;
use tracing::warn;

use crate::song::Song;

/// Placeholder title for tracks whose metadata lacks one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Placeholder artist for tracks whose metadata lacks one.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Arguments for a metadata-only invocation of the fetch tool.
#[must_use]
pub fn build_metadata_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-warnings".to_string(),
        "--ignore-errors".to_string(),
        url.to_string(),
    ]
}

/// One track object as emitted by the fetch tool.
#[derive(Debug, Deserialize)]
struct RawTrack {
    title: Option<String>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
}

/// Parse newline-delimited JSON metadata output into songs.
///
/// Order is preserved. Malformed lines and records without a usable URL are
/// skipped with a warning.
#[must_use]
pub fn parse_song_lines(raw: &str) -> Vec<Song> {
    let mut songs = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<RawTrack>(trimmed) {
            Ok(track) => {
                if let Some(song) = song_from_track(track) {
                    songs.push(song);
                } else {
                    warn!(line = index + 1, "Metadata entry has no usable URL, skipping");
                }
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed metadata line");
            }
        }
    }

    songs
}

fn song_from_track(track: RawTrack) -> Option<Song> {
    let url = track
        .webpage_url
        .filter(|u| !u.is_empty())
        .or_else(|| track.url.filter(|u| !u.is_empty()))?;

    let title = track
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let artist = track
        .uploader
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let duration_secs = track.duration.map_or(0, |d| d.max(0.0) as u64);

    Some(Song::new(url, title, artist, duration_secs))
}
