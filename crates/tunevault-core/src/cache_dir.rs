//! Media cache directory resolution.
//!
//! The cache lives under the working directory so a portable install keeps
//! its media next to the executable. Resolution never fails: when the
//! working directory is unusable it falls back to a directory under the
//! system temp path.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Name of the media cache directory under the working directory.
pub const CACHE_DIR_NAME: &str = "media-cache";

const FALLBACK_DIR_NAME: &str = "tunevault-media-cache";

/// Resolve the media cache directory, creating it if needed.
///
/// `<cwd>/media-cache` when possible, otherwise a temp-dir fallback. Always
/// returns a path; the fallback path is returned even if it could not be
/// created, and downstream file operations surface the problem.
#[must_use]
pub fn resolve_cache_dir() -> PathBuf {
    match std::env::current_dir() {
        Ok(cwd) => resolve_cache_dir_under(&cwd),
        Err(e) => {
            warn!(error = %e, "Working directory unavailable, using temp cache");
            fallback_cache_dir()
        }
    }
}

/// Resolve the cache directory under an explicit base directory.
#[must_use]
pub fn resolve_cache_dir_under(base: &Path) -> PathBuf {
    let dir = base.join(CACHE_DIR_NAME);
    if dir.is_dir() {
        return dir;
    }
    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot create media cache, using temp cache");
            fallback_cache_dir()
        }
    }
}

fn fallback_cache_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(FALLBACK_DIR_NAME);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %e, "Cannot create temp media cache");
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_cache_under_base() {
        let base = TempDir::new().expect("tempdir");
        let dir = resolve_cache_dir_under(base.path());
        assert_eq!(dir, base.path().join(CACHE_DIR_NAME));
        assert!(dir.is_dir());
    }

    #[test]
    fn reuses_existing_cache_dir() {
        let base = TempDir::new().expect("tempdir");
        let first = resolve_cache_dir_under(base.path());
        let second = resolve_cache_dir_under(base.path());
        assert_eq!(first, second);
    }

    #[test]
    fn unusable_base_falls_back_to_temp() {
        let base = TempDir::new().expect("tempdir");
        // A file where the base directory should be forces the fallback.
        let blocked = base.path().join("blocked");
        std::fs::write(&blocked, b"x").expect("should write");

        let dir = resolve_cache_dir_under(&blocked);
        assert_eq!(dir, std::env::temp_dir().join(FALLBACK_DIR_NAME));
    }
}
