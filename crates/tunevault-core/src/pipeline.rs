//! The media pipeline: collaborator-facing API over a cooperative scheduler.
//!
//! The host owns a [`MediaPipeline`] on its main thread and calls
//! [`MediaPipeline::tick`] from its update loop. Requests launch external
//! processes and register an in-flight task; each tick drains fresh output
//! lines into progress callbacks and polls completion without blocking.
//! Failures never cross this boundary as errors: callers see sentinel
//! values (`None`, `false`, an empty `Vec`) and the details go to the log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache_dir::resolve_cache_dir;
use crate::config::AppConfig;
use crate::decoder::{AudioDecoder, DecoderRegistry};
use crate::download::{DownloadProgress, build_fetch_args, complete_fetch, find_cached_file, parse_progress_line};
use crate::metadata::{build_metadata_args, parse_song_lines};
use crate::process::{CommandRunner, ProcessHandle, SystemCommandRunner};
use crate::song::{Song, extract_video_id};
use crate::store::{Playlist, PlaylistIndexEntry, PlaylistStore};
use crate::tools::{Tool, ToolLocator};

/// Callback invoked with the parsed metadata for a details request.
pub type SongDetailsCallback = Box<dyn FnOnce(Vec<Song>)>;

/// Callback invoked with the final song state for a download request.
pub type DownloadCallback = Box<dyn FnOnce(Song)>;

/// Callback invoked with each progress update during a download.
pub type ProgressCallback = Box<dyn FnMut(DownloadProgress)>;

enum Task {
    Details {
        handle: ProcessHandle,
        on_done: Option<SongDetailsCallback>,
    },
    Download {
        song: Option<Song>,
        cache_dir: PathBuf,
        handle: ProcessHandle,
        on_progress: Option<ProgressCallback>,
        on_done: Option<DownloadCallback>,
    },
}

/// Coordinates tool location, external processes, the playlist store, and
/// decoder capabilities behind one single-threaded API.
pub struct MediaPipeline {
    locator: ToolLocator,
    runner: Arc<dyn CommandRunner>,
    store: PlaylistStore,
    cache_dir: Option<PathBuf>,
    decoders: DecoderRegistry,
    tasks: Vec<Task>,
}

impl MediaPipeline {
    /// Create a pipeline over an existing playlist store with default tool
    /// location and a lazily resolved cache directory.
    #[must_use]
    pub fn new(store: PlaylistStore) -> Self {
        Self {
            locator: ToolLocator::default(),
            runner: Arc::new(SystemCommandRunner),
            store,
            cache_dir: None,
            decoders: DecoderRegistry::new(),
            tasks: Vec::new(),
        }
    }

    /// Build a pipeline from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the playlists directory cannot be created.
    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let store = PlaylistStore::new(config.playlists_directory.clone())?;
        let locator =
            ToolLocator::new(config.tools_directory.clone()).with_path_probe(config.probe_path);
        let cache_dir = config
            .cache_directory
            .clone()
            .unwrap_or_else(resolve_cache_dir);
        Ok(Self {
            locator,
            runner: Arc::new(SystemCommandRunner),
            store,
            cache_dir: Some(cache_dir),
            decoders: DecoderRegistry::new(),
            tasks: Vec::new(),
        })
    }

    /// Override the tools directory.
    #[must_use]
    pub fn with_tools_dir(mut self, tools_dir: PathBuf) -> Self {
        self.locator = ToolLocator::new(tools_dir);
        self
    }

    /// Enable or disable the `PATH` probe for tool lookup.
    #[must_use]
    pub fn with_path_probe(mut self, probe_path: bool) -> Self {
        let tools_dir = self.locator.tools_dir().to_path_buf();
        self.locator = ToolLocator::new(tools_dir).with_path_probe(probe_path);
        self
    }

    /// Override the media cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = Some(cache_dir);
        self
    }

    /// Replace the process runner. Test seam.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Advance all in-flight tasks: feed fresh output to progress callbacks
    /// and fire completion callbacks for finished processes. Never blocks.
    pub fn tick(&mut self) {
        let mut index = 0;
        while index < self.tasks.len() {
            if Self::advance(&mut self.tasks[index]) {
                self.tasks.swap_remove(index);
            } else {
                index += 1;
            }
        }
    }

    fn advance(task: &mut Task) -> bool {
        match task {
            Task::Details { handle, on_done } => {
                let Some(output) = handle.try_complete() else {
                    return false;
                };
                let songs = if output.success() {
                    parse_song_lines(&output.output)
                } else {
                    warn!(exit_code = output.exit_code, "Metadata fetch failed");
                    Vec::new()
                };
                if let Some(callback) = on_done.take() {
                    callback(songs);
                }
                true
            }
            Task::Download {
                song,
                cache_dir,
                handle,
                on_progress,
                on_done,
            } => {
                // Completion is checked first: once set, all output has been
                // captured, so this tick's drain is the final one.
                let completion = handle.try_complete();

                let fresh = handle.drain_lines();
                if let Some(callback) = on_progress {
                    for line in &fresh {
                        if let Some(progress) = parse_progress_line(line) {
                            callback(progress);
                        }
                    }
                }

                let Some(output) = completion else {
                    return false;
                };
                if let Some(mut finished) = song.take() {
                    complete_fetch(&mut finished, &output, cache_dir);
                    if let Some(callback) = on_done.take() {
                        callback(finished);
                    }
                }
                true
            }
        }
    }

    /// Number of in-flight tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Fetch metadata for a URL (a single video or a whole playlist).
    ///
    /// `on_done` fires from a later [`tick`](Self::tick) with the parsed
    /// songs, or with an empty list on any failure. An empty URL or a
    /// missing fetch tool fails immediately.
    pub fn request_song_details<F>(&mut self, url: &str, on_done: F)
    where
        F: FnOnce(Vec<Song>) + 'static,
    {
        if url.trim().is_empty() {
            warn!("Rejecting metadata request for empty URL");
            on_done(Vec::new());
            return;
        }

        let Some(fetcher) = self.locator.locate(Tool::Fetcher) else {
            warn!(url = %url, "Fetch tool unavailable, metadata request fails");
            on_done(Vec::new());
            return;
        };

        let handle = self.runner.run(&fetcher, &build_metadata_args(url), None);
        self.tasks.push(Task::Details {
            handle,
            on_done: Some(Box::new(on_done)),
        });
    }

    /// Download a song's audio into the media cache.
    ///
    /// `on_done` fires from a later [`tick`](Self::tick) with the song
    /// marked either fetched (with its cached path) or failed. A song whose
    /// URL has no extractable video id fails immediately, as does a missing
    /// fetch tool.
    pub fn request_download<F>(
        &mut self,
        mut song: Song,
        on_progress: Option<ProgressCallback>,
        on_done: F,
    ) where
        F: FnOnce(Song) + 'static,
    {
        let Some(video_id) = song.video_id() else {
            warn!(url = %song.url, "Cannot download song without an extractable video id");
            song.mark_failed();
            on_done(song);
            return;
        };

        let Some(fetcher) = self.locator.locate(Tool::Fetcher) else {
            warn!(url = %song.url, "Fetch tool unavailable, download fails");
            song.mark_failed();
            on_done(song);
            return;
        };

        let cache_dir = self.ensure_cache_dir();
        let args = build_fetch_args(&song.url, &cache_dir, &video_id);
        info!(url = %song.url, video_id = %video_id, "Starting download");

        song.mark_downloading();
        let handle = self.runner.run(&fetcher, &args, None);
        self.tasks.push(Task::Download {
            song: Some(song),
            cache_dir,
            handle,
            on_progress,
            on_done: Some(Box::new(on_done)),
        });
    }

    /// Synchronously look up the cached media file for a URL.
    pub fn find_downloaded_file(&mut self, url: &str) -> Option<PathBuf> {
        let video_id = extract_video_id(url)?;
        let cache_dir = self.ensure_cache_dir();
        find_cached_file(&cache_dir, &video_id)
    }

    /// Forget memoized tool locations, e.g. after the user installs a tool.
    pub fn refresh_tools(&mut self) {
        self.locator.reinitialize();
    }

    /// Register an audio decoder capability.
    pub fn register_decoder(&mut self, decoder: Box<dyn AudioDecoder>) {
        self.decoders.register(decoder);
    }

    /// Decoder able to handle the given media file, if any.
    #[must_use]
    pub fn decoder_for(&self, path: &Path) -> Option<&dyn AudioDecoder> {
        self.decoders.decoder_for(path)
    }

    /// Create a playlist. `None` (plus a log entry) on invalid name or
    /// persistence failure.
    pub fn create_playlist(&mut self, name: &str, description: &str) -> Option<Playlist> {
        match self.store.create_playlist(name, description) {
            Ok(playlist) => Some(playlist),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to create playlist");
                None
            }
        }
    }

    /// Persist a playlist. False (plus a log entry) on failure.
    pub fn save_playlist(&mut self, playlist: &Playlist) -> bool {
        match self.store.save_playlist(playlist) {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %playlist.id, error = %e, "Failed to save playlist");
                false
            }
        }
    }

    /// Load a playlist by id; `None` when missing or unreadable.
    #[must_use]
    pub fn load_playlist(&self, id: &str) -> Option<Playlist> {
        self.store.load_playlist(id)
    }

    /// Delete a playlist. False (plus a log entry) only on an actual file
    /// system failure; deleting a missing playlist succeeds.
    pub fn delete_playlist(&mut self, id: &str) -> bool {
        match self.store.delete_playlist(id) {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to delete playlist");
                false
            }
        }
    }

    /// Enumerate playlists, sorted by name.
    pub fn playlists(&mut self) -> Vec<PlaylistIndexEntry> {
        self.store.playlists()
    }

    /// Direct access to the playlist store.
    #[must_use]
    pub fn store(&self) -> &PlaylistStore {
        &self.store
    }

    /// Mutable access to the playlist store.
    pub fn store_mut(&mut self) -> &mut PlaylistStore {
        &mut self.store
    }

    fn ensure_cache_dir(&mut self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        let dir = resolve_cache_dir();
        self.cache_dir = Some(dir.clone());
        dir
    }
}
