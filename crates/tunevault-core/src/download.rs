//! Download orchestration: fetch arguments, cached-file lookup, and
//! progress-line parsing.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use crate::process::ProcessOutput;
use crate::song::Song;

/// Audio file extensions the fetch tool may produce, in preference order.
///
/// Lookup checks every name for the first extension before moving to the
/// next, so an `mp3` always beats an `m4a` for the same video id.
pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "m4a", "webm", "opus"];

/// Per-song fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    /// No fetch has been attempted.
    #[default]
    NotFetched,
    /// A fetch is in flight.
    Fetching,
    /// The media file is in the cache.
    Fetched,
    /// The last attempt failed. Terminal until the caller retries.
    Failed,
}

impl FetchState {
    /// True for states that end a fetch attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fetched | Self::Failed)
    }
}

/// Arguments for an audio fetch of a single video.
///
/// Audio-extraction mode at best quality, one line per progress update, and
/// an output template keyed on the video id so the artifact can be found
/// again regardless of which container the tool picked.
#[must_use]
pub fn build_fetch_args(url: &str, cache_dir: &Path, video_id: &str) -> Vec<String> {
    let template = cache_dir.join(format!("{video_id}.%(ext)s"));
    vec![
        "-x".to_string(),
        "--audio-quality".to_string(),
        "0".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

/// Find the cached media file for `video_id`, if any.
///
/// Deterministic: for each extension in [`AUDIO_EXTENSIONS`] order, the
/// exact `<id>.<ext>` name wins, then the lexicographically smallest file
/// name starting with `<id>.` and ending with that extension.
#[must_use]
pub fn find_cached_file(cache_dir: &Path, video_id: &str) -> Option<PathBuf> {
    for ext in AUDIO_EXTENSIONS {
        let exact = cache_dir.join(format!("{video_id}.{ext}"));
        if exact.is_file() {
            return Some(exact);
        }
    }

    let prefix = format!("{video_id}.");
    let mut candidates: Vec<String> = WalkDir::new(cache_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with(&prefix).then_some(name)
        })
        .collect();
    candidates.sort();

    for ext in AUDIO_EXTENSIONS {
        let suffix = format!(".{ext}");
        if let Some(name) = candidates.iter().find(|name| name.ends_with(&suffix)) {
            return Some(cache_dir.join(name));
        }
    }

    None
}

/// Resolve a finished fetch against the song and the cache.
///
/// Success requires both a zero exit code and an artifact on disk; a clean
/// exit without a file is still a failure.
pub fn complete_fetch(song: &mut Song, output: &ProcessOutput, cache_dir: &Path) -> FetchState {
    let cached = if output.success() {
        song.video_id()
            .and_then(|id| find_cached_file(cache_dir, &id))
    } else {
        None
    };

    match cached {
        Some(path) => {
            song.mark_fetched(path);
            FetchState::Fetched
        }
        None => {
            if output.success() {
                warn!(url = %song.url, "Fetch exited cleanly but produced no media file");
            } else {
                warn!(url = %song.url, exit_code = output.exit_code, "Fetch failed");
            }
            song.mark_failed();
            FetchState::Failed
        }
    }
}

/// A progress update parsed from one fetch-tool output line.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Completion percentage, 0.0 to 100.0.
    pub percent: f64,
    /// Transfer speed as reported, e.g. `120.50KiB/s`.
    pub speed: Option<String>,
    /// Estimated time remaining as reported, e.g. `00:12`.
    pub eta: Option<String>,
}

/// Parse a `[download]  42.7% of 3.40MiB at 120.50KiB/s ETA 00:12` line.
///
/// Informational only; lines that do not match are ignored by the caller.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let pattern = Regex::new(
        r"^\[download\]\s+([0-9.]+)%(?:\s+of\s+\S+)?(?:\s+at\s+(\S+))?(?:\s+ETA\s+(\S+))?",
    )
    .ok()?;
    let captures = pattern.captures(line.trim())?;

    let percent = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let speed = captures.get(2).map(|m| m.as_str().to_string());
    let eta = captures.get(3).map(|m| m.as_str().to_string());

    Some(DownloadProgress { percent, speed, eta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"x").expect("should write file");
    }

    fn song(url: &str) -> Song {
        Song::new(url.to_string(), "T".to_string(), "A".to_string(), 0)
    }

    #[test]
    fn fetch_args_carry_output_template() {
        let args = build_fetch_args(
            "https://youtu.be/ABC123",
            Path::new("/cache"),
            "ABC123",
        );
        assert_eq!(args[0], "-x");
        let template = &args[args.len() - 2];
        assert!(template.contains("ABC123.%(ext)s"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/ABC123"));
    }

    #[test]
    fn exact_name_wins_in_extension_order() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "ABC123.m4a");
        touch(&dir, "ABC123.mp3");
        let found = find_cached_file(dir.path(), "ABC123").expect("should find file");
        assert_eq!(found, dir.path().join("ABC123.mp3"));
    }

    #[test]
    fn prefix_match_is_deterministic() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "ABC123.b.m4a");
        touch(&dir, "ABC123.a.m4a");
        let found = find_cached_file(dir.path(), "ABC123").expect("should find file");
        assert_eq!(found, dir.path().join("ABC123.a.m4a"));
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "XYZ789.mp3");
        touch(&dir, "ABC123x.mp3");
        assert_eq!(find_cached_file(dir.path(), "ABC123"), None);
    }

    #[test]
    fn clean_exit_with_file_is_fetched() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "ABC123.m4a");
        let mut s = song("https://youtu.be/ABC123");
        let output = ProcessOutput {
            exit_code: 0,
            output: String::new(),
        };
        assert_eq!(complete_fetch(&mut s, &output, dir.path()), FetchState::Fetched);
        assert!(s.downloaded);
        assert_eq!(s.cached_path, Some(dir.path().join("ABC123.m4a")));
    }

    #[test]
    fn clean_exit_without_file_is_failed() {
        let dir = TempDir::new().expect("tempdir");
        let mut s = song("https://youtu.be/ABC123");
        let output = ProcessOutput {
            exit_code: 0,
            output: String::new(),
        };
        assert_eq!(complete_fetch(&mut s, &output, dir.path()), FetchState::Failed);
        assert!(s.download_failed);
    }

    #[test]
    fn nonzero_exit_is_failed_even_with_file() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "ABC123.m4a");
        let mut s = song("https://youtu.be/ABC123");
        let output = ProcessOutput {
            exit_code: 1,
            output: String::new(),
        };
        assert_eq!(complete_fetch(&mut s, &output, dir.path()), FetchState::Failed);
    }

    #[test]
    fn parses_full_progress_line() {
        let progress =
            parse_progress_line("[download]  42.7% of 3.40MiB at 120.50KiB/s ETA 00:12")
                .expect("should parse");
        assert!((progress.percent - 42.7).abs() < f64::EPSILON);
        assert_eq!(progress.speed.as_deref(), Some("120.50KiB/s"));
        assert_eq!(progress.eta.as_deref(), Some("00:12"));
    }

    #[test]
    fn parses_bare_percent_line() {
        let progress = parse_progress_line("[download] 100% of 3.40MiB").expect("should parse");
        assert!((progress.percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(progress.speed, None);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn non_progress_lines_are_rejected() {
        assert_eq!(parse_progress_line("[info] Extracting URL"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn terminal_states() {
        assert!(FetchState::Fetched.is_terminal());
        assert!(FetchState::Failed.is_terminal());
        assert!(!FetchState::Fetching.is_terminal());
        assert!(!FetchState::NotFetched.is_terminal());
    }
}
