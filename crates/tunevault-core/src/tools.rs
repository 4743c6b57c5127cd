//! Locating the external tools the pipeline shells out to.
//!
//! Resolution order: a bundled executable under the tools directory, then a
//! bounded probe of the bare command on `PATH`. Results (including negative
//! ones) are memoized until [`ToolLocator::reinitialize`] is called, so a
//! tool installed mid-session is picked up after an explicit refresh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};

/// Maximum time spent waiting for a `PATH` probe to exit.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// External tools the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// The media/metadata fetch tool (yt-dlp).
    Fetcher,
    /// The audio transcoder the fetch tool invokes for extraction (ffmpeg).
    Transcoder,
}

impl Tool {
    /// Base command name without any platform suffix.
    #[must_use]
    pub const fn command_name(self) -> &'static str {
        match self {
            Self::Fetcher => "yt-dlp",
            Self::Transcoder => "ffmpeg",
        }
    }

    /// Flag that makes the tool print its version and exit quickly.
    #[must_use]
    pub const fn version_flag(self) -> &'static str {
        match self {
            Self::Fetcher => "--version",
            Self::Transcoder => "-version",
        }
    }

    /// Executable file name on the current platform.
    #[must_use]
    pub fn executable_name(self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.command_name())
        } else {
            self.command_name().to_string()
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command_name())
    }
}

/// Resolves and memoizes external tool locations.
#[derive(Debug)]
pub struct ToolLocator {
    tools_dir: PathBuf,
    probe_path: bool,
    resolved: HashMap<Tool, Option<PathBuf>>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self::new(PathBuf::from("tools"))
    }
}

impl ToolLocator {
    /// Create a locator that looks for bundled tools under `tools_dir`.
    #[must_use]
    pub fn new(tools_dir: PathBuf) -> Self {
        Self {
            tools_dir,
            probe_path: true,
            resolved: HashMap::new(),
        }
    }

    /// Enable or disable the `PATH` probe fallback.
    ///
    /// Hermetic deployments that ship every tool in the tools directory can
    /// turn the probe off.
    #[must_use]
    pub fn with_path_probe(mut self, probe_path: bool) -> Self {
        self.probe_path = probe_path;
        self
    }

    /// Directory searched for bundled tools.
    #[must_use]
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Create the tools directory if it does not exist.
    pub fn ensure_tools_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.tools_dir).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: self.tools_dir.clone(),
                reason: e.to_string(),
            })
        })
    }

    /// Resolve the location of `tool`.
    ///
    /// Returns the bundled path when present, the bare command name when the
    /// `PATH` probe succeeds, or `None`. The answer is memoized until
    /// [`reinitialize`](Self::reinitialize).
    pub fn locate(&mut self, tool: Tool) -> Option<PathBuf> {
        if let Some(cached) = self.resolved.get(&tool) {
            return cached.clone();
        }

        let location = self.resolve(tool);
        match &location {
            Some(path) => info!(tool = %tool, path = %path.display(), "Resolved external tool"),
            None => warn!(tool = %tool, "External tool not found"),
        }
        self.resolved.insert(tool, location.clone());
        location
    }

    /// Forget all memoized resolutions so the next lookup probes again.
    pub fn reinitialize(&mut self) {
        debug!("Clearing memoized tool locations");
        self.resolved.clear();
    }

    fn resolve(&self, tool: Tool) -> Option<PathBuf> {
        let bundled = self.tools_dir.join(tool.executable_name());
        if bundled.is_file() {
            return Some(bundled);
        }

        if self.probe_path && probe_on_path(tool) {
            return Some(PathBuf::from(tool.executable_name()));
        }

        None
    }
}

/// Run `<tool> <version-flag>` and report whether it exits zero within
/// [`PROBE_TIMEOUT`]. A hung probe is killed and reaped.
fn probe_on_path(tool: Tool) -> bool {
    let mut child = match Command::new(tool.executable_name())
        .arg(tool.version_flag())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            debug!(tool = %tool, error = %e, "PATH probe failed to launch");
            return false;
        }
    };

    let deadline = Instant::now() + PROBE_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(tool = %tool, "PATH probe timed out, killing probe process");
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(PROBE_POLL_INTERVAL);
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "PATH probe wait failed");
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
    }
}
