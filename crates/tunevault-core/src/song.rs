//! Song records and video id extraction.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single song tracked by the library.
///
/// The lifecycle flags (`downloading`, `downloaded`, `download_failed`) are
/// mutually exclusive; the transition helpers keep them that way. Serde
/// defaults let playlist files written by older versions still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Song {
    /// Source page URL for the song.
    pub url: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Artist or uploader name.
    #[serde(default)]
    pub artist: String,
    /// Duration in whole seconds (0 when unknown).
    #[serde(default)]
    pub duration_secs: u64,
    /// True once the media file has been fetched into the cache.
    #[serde(default)]
    pub downloaded: bool,
    /// True when the last fetch attempt failed.
    #[serde(default)]
    pub download_failed: bool,
    /// True while a fetch is in flight.
    #[serde(default)]
    pub downloading: bool,
    /// Path of the cached media file, set when `downloaded` is true.
    #[serde(default)]
    pub cached_path: Option<PathBuf>,
}

impl Song {
    /// Create a song with no download state.
    #[must_use]
    pub const fn new(url: String, title: String, artist: String, duration_secs: u64) -> Self {
        Self {
            url,
            title,
            artist,
            duration_secs,
            downloaded: false,
            download_failed: false,
            downloading: false,
            cached_path: None,
        }
    }

    /// Video id extracted from this song's URL, if the URL has a
    /// recognizable shape.
    #[must_use]
    pub fn video_id(&self) -> Option<String> {
        extract_video_id(&self.url)
    }

    /// Key used to deduplicate songs within a playlist.
    ///
    /// The video id when extractable, otherwise the full URL.
    #[must_use]
    pub fn identity_key(&self) -> String {
        self.video_id().unwrap_or_else(|| self.url.clone())
    }

    /// Mark a fetch as in flight.
    pub fn mark_downloading(&mut self) {
        self.downloading = true;
        self.downloaded = false;
        self.download_failed = false;
    }

    /// Mark the song as fetched, recording the cached file location.
    pub fn mark_fetched(&mut self, path: PathBuf) {
        self.downloading = false;
        self.downloaded = true;
        self.download_failed = false;
        self.cached_path = Some(path);
    }

    /// Mark the last fetch attempt as failed. Terminal until the caller
    /// explicitly retries.
    pub fn mark_failed(&mut self) {
        self.downloading = false;
        self.downloaded = false;
        self.download_failed = true;
        self.cached_path = None;
    }
}

/// Extract a video id from a watch URL.
///
/// Recognizes the `?v=ID` query parameter form and the `youtu.be/ID` short
/// form. Returns `None` for anything else.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    let query_form = Regex::new(r"[?&]v=([A-Za-z0-9_-]+)").ok()?;
    if let Some(captures) = query_form.captures(url) {
        return Some(captures.get(1)?.as_str().to_string());
    }

    let short_form = Regex::new(r"youtu\.be/([A-Za-z0-9_-]+)").ok()?;
    if let Some(captures) = short_form.captures(url) {
        return Some(captures.get(1)?.as_str().to_string());
    }

    None
}
