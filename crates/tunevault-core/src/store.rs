//! Playlist persistence: one JSON file per playlist plus a single index.
//!
//! Layout under the store directory:
//! - `<id>.json` — full playlist, pretty-printed.
//! - `playlists.json` — a JSON object mapping id to a summary entry, used
//!   for cheap enumeration without opening every playlist file.
//!
//! A save writes the playlist file first, then the index. The pair is not
//! atomic; on disagreement the playlist file is authoritative for content
//! and the index only for enumeration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, FileSystemError, PlaylistError, Result};
use crate::song::Song;

/// File name of the playlist index inside the store directory.
pub const INDEX_FILE_NAME: &str = "playlists.json";

/// How long an in-memory copy of the index is trusted before re-reading.
pub const INDEX_CACHE_TTL: Duration = Duration::from_secs(120);

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// A named, persisted collection of songs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    /// Stable identifier, also the file stem on disk.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Creation time, epoch seconds.
    #[serde(default)]
    pub created_at: u64,
    /// Last modification time, epoch seconds.
    #[serde(default)]
    pub modified_at: u64,
    /// Songs in playlist order.
    #[serde(default)]
    pub songs: Vec<Song>,
}

impl Playlist {
    /// Create an empty playlist with a fresh v4 uuid.
    #[must_use]
    pub fn new(name: String, description: String) -> Self {
        let now = epoch_secs();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            created_at: now,
            modified_at: now,
            songs: Vec::new(),
        }
    }

    /// Add a song, rejecting duplicates by identity key.
    ///
    /// Returns false and leaves the playlist untouched when a song with the
    /// same key is already present.
    pub fn add_song(&mut self, song: Song) -> bool {
        let key = song.identity_key();
        if self.songs.iter().any(|s| s.identity_key() == key) {
            debug!(playlist = %self.name, key = %key, "Duplicate song rejected");
            return false;
        }
        self.songs.push(song);
        self.touch();
        true
    }

    /// Remove the song with the given identity key. Returns false when no
    /// song matched.
    pub fn remove_song(&mut self, key: &str) -> bool {
        let before = self.songs.len();
        self.songs.retain(|s| s.identity_key() != key);
        let removed = self.songs.len() < before;
        if removed {
            self.touch();
        }
        removed
    }

    /// True when a song with the given identity key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.songs.iter().any(|s| s.identity_key() == key)
    }

    fn touch(&mut self) {
        self.modified_at = epoch_secs();
    }
}

/// Summary entry for a playlist, stored in the index file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistIndexEntry {
    /// Playlist identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Creation time, epoch seconds.
    #[serde(default)]
    pub created_at: u64,
    /// Last modification time, epoch seconds.
    #[serde(default)]
    pub modified_at: u64,
    /// Number of songs in the playlist.
    #[serde(default)]
    pub song_count: usize,
}

impl PlaylistIndexEntry {
    fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
            description: playlist.description.clone(),
            created_at: playlist.created_at,
            modified_at: playlist.modified_at,
            song_count: playlist.songs.len(),
        }
    }
}

#[derive(Debug)]
struct CachedIndex {
    entries: Vec<PlaylistIndexEntry>,
    fetched_at: Instant,
}

/// Disk-backed playlist store with a TTL-cached index.
#[derive(Debug)]
pub struct PlaylistStore {
    dir: PathBuf,
    cache_ttl: Duration,
    cache: Option<CachedIndex>,
}

impl PlaylistStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })
        })?;
        Ok(Self {
            dir,
            cache_ttl: INDEX_CACHE_TTL,
            cache: None,
        })
    }

    /// Override the index cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Directory this store persists into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create, persist, and return a new empty playlist.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::EmptyName`] when the trimmed name is empty,
    /// or a file system error when persistence fails.
    pub fn create_playlist(&mut self, name: &str, description: &str) -> Result<Playlist> {
        if name.trim().is_empty() {
            return Err(Error::Playlist(PlaylistError::EmptyName));
        }

        let playlist = Playlist::new(name.trim().to_string(), description.to_string());
        self.save_playlist(&playlist)?;
        info!(id = %playlist.id, name = %playlist.name, "Created playlist");
        Ok(playlist)
    }

    /// Persist a playlist and refresh its index entry.
    ///
    /// The playlist file is written first so it is always at least as new as
    /// its index entry.
    pub fn save_playlist(&mut self, playlist: &Playlist) -> Result<()> {
        let path = self.playlist_path(&playlist.id);
        let content = serde_json::to_string_pretty(playlist)?;
        std::fs::write(&path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })
        })?;

        let mut index = self.read_index();
        index.insert(
            playlist.id.clone(),
            PlaylistIndexEntry::from_playlist(playlist),
        );
        self.write_index(index)
    }

    /// Load a playlist by id.
    ///
    /// Missing, empty, or malformed files all yield `None` with a warning;
    /// a bad file never takes the caller down.
    #[must_use]
    pub fn load_playlist(&self, id: &str) -> Option<Playlist> {
        let path = self.playlist_path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to read playlist file");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(playlist) => Some(playlist),
            Err(e) => {
                warn!(id = %id, path = %path.display(), error = %e, "Malformed playlist file");
                None
            }
        }
    }

    /// Delete a playlist file and drop its index entry.
    ///
    /// Idempotent: deleting an id with no file still succeeds and still
    /// scrubs the index.
    pub fn delete_playlist(&mut self, id: &str) -> Result<()> {
        let path = self.playlist_path(id);
        if let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(Error::FileSystem(FileSystemError::DeleteFailed {
                path,
                reason: e.to_string(),
            }));
        }

        let mut index = self.read_index();
        if index.remove(id).is_some() {
            info!(id = %id, "Deleted playlist");
        }
        self.write_index(index)
    }

    /// Enumerate playlists, sorted by name.
    ///
    /// Served from the in-memory cache while it is younger than the TTL;
    /// every save and delete refreshes the cache. An unreadable index yields
    /// an empty list, never an error.
    pub fn playlists(&mut self) -> Vec<PlaylistIndexEntry> {
        if let Some(cached) = &self.cache
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            return cached.entries.clone();
        }

        let entries = Self::sorted_entries(self.read_index());
        self.cache = Some(CachedIndex {
            entries: entries.clone(),
            fetched_at: Instant::now(),
        });
        entries
    }

    fn sorted_entries(index: HashMap<String, PlaylistIndexEntry>) -> Vec<PlaylistIndexEntry> {
        let mut entries: Vec<PlaylistIndexEntry> = index.into_values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    fn playlist_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    fn read_index(&self) -> HashMap<String, PlaylistIndexEntry> {
        let path = self.index_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "Failed to read playlist index");
                }
                return HashMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Malformed playlist index, treating as empty");
                HashMap::new()
            }
        }
    }

    fn write_index(&mut self, index: HashMap<String, PlaylistIndexEntry>) -> Result<()> {
        let path = self.index_path();
        let content = serde_json::to_string_pretty(&index)?;
        std::fs::write(&path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })
        })?;

        self.cache = Some(CachedIndex {
            entries: Self::sorted_entries(index),
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PlaylistStore {
        PlaylistStore::new(dir.path().to_path_buf()).expect("should open store")
    }

    fn song(url: &str) -> Song {
        Song::new(url.to_string(), "T".to_string(), "A".to_string(), 0)
    }

    #[test]
    fn create_rejects_empty_name() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir);
        assert!(matches!(
            s.create_playlist("", "desc"),
            Err(Error::Playlist(PlaylistError::EmptyName))
        ));
        assert!(matches!(
            s.create_playlist("   ", "desc"),
            Err(Error::Playlist(PlaylistError::EmptyName))
        ));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir);
        let mut playlist = s
            .create_playlist("Road Trip", "long drives")
            .expect("should create");
        assert!(playlist.add_song(song("https://youtu.be/AAA111")));
        assert!(playlist.add_song(song("https://youtu.be/BBB222")));
        s.save_playlist(&playlist).expect("should save");

        let loaded = s.load_playlist(&playlist.id).expect("should load");
        assert_eq!(loaded, playlist);
        assert_eq!(loaded.songs.len(), 2);
    }

    #[test]
    fn duplicate_add_returns_false() {
        let mut playlist = Playlist::new("P".to_string(), String::new());
        assert!(playlist.add_song(song("https://youtu.be/AAA111")));
        // Same video id through a different URL shape.
        assert!(!playlist.add_song(song("https://youtube.com/watch?v=AAA111")));
        assert_eq!(playlist.songs.len(), 1);
    }

    #[test]
    fn remove_song_by_key() {
        let mut playlist = Playlist::new("P".to_string(), String::new());
        playlist.add_song(song("https://youtu.be/AAA111"));
        assert!(playlist.remove_song("AAA111"));
        assert!(!playlist.remove_song("AAA111"));
        assert!(playlist.songs.is_empty());
    }

    #[test]
    fn delete_drops_file_and_index_entry() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir);
        let playlist = s.create_playlist("Gone", "").expect("should create");
        let id = playlist.id.clone();

        s.delete_playlist(&id).expect("should delete");
        assert!(s.load_playlist(&id).is_none());
        assert!(s.playlists().iter().all(|e| e.id != id));

        // Idempotent.
        s.delete_playlist(&id).expect("second delete should succeed");
    }

    #[test]
    fn malformed_playlist_file_loads_as_none() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(&dir);
        std::fs::write(dir.path().join("bad-id.json"), "{not json").expect("should write");
        assert!(s.load_playlist("bad-id").is_none());
    }

    #[test]
    fn missing_playlist_loads_as_none() {
        let dir = TempDir::new().expect("tempdir");
        let s = store(&dir);
        assert!(s.load_playlist("no-such-id").is_none());
    }

    #[test]
    fn enumeration_is_sorted_by_name() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir);
        s.create_playlist("Zeta", "").expect("create");
        s.create_playlist("Alpha", "").expect("create");
        s.create_playlist("Mid", "").expect("create");

        let names: Vec<String> = s.playlists().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn index_cache_skips_disk_within_ttl() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir);
        s.create_playlist("Cached", "").expect("create");
        assert_eq!(s.playlists().len(), 1);

        // Remove the index behind the store's back; the cached answer holds.
        std::fs::remove_file(dir.path().join(INDEX_FILE_NAME)).expect("should remove index");
        assert_eq!(s.playlists().len(), 1);
    }

    #[test]
    fn expired_index_cache_rereads_disk() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir).with_cache_ttl(Duration::ZERO);
        s.create_playlist("Short Lived", "").expect("create");
        assert_eq!(s.playlists().len(), 1);

        std::fs::remove_file(dir.path().join(INDEX_FILE_NAME)).expect("should remove index");
        assert!(s.playlists().is_empty());
    }

    #[test]
    fn malformed_index_enumerates_empty() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir).with_cache_ttl(Duration::ZERO);
        std::fs::write(dir.path().join(INDEX_FILE_NAME), "][").expect("should write");
        assert!(s.playlists().is_empty());
    }

    #[test]
    fn save_updates_index_entry_counts() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = store(&dir).with_cache_ttl(Duration::ZERO);
        let mut playlist = s.create_playlist("Counts", "").expect("create");
        playlist.add_song(song("https://youtu.be/AAA111"));
        s.save_playlist(&playlist).expect("save");

        let entries = s.playlists();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].song_count, 1);
    }
}
