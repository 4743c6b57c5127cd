//! Error types for the tunevault core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our custom error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for all tunevault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// External tool resolution errors.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Playlist management errors.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// File system operation errors.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while locating or probing external tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool was found neither in the tools directory nor on `PATH`.
    #[error("Tool not found: {tool}")]
    NotFound {
        /// Name of the tool executable.
        tool: String,
    },

    /// Probing the tool on `PATH` failed or timed out.
    #[error("Failed to probe tool {tool}: {reason}")]
    ProbeFailed {
        /// Name of the tool executable.
        tool: String,
        /// Reason for the failure.
        reason: String,
    },
}

/// Errors raised by playlist operations.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// Playlist name validation failed.
    #[error("Playlist name cannot be empty")]
    EmptyName,

    /// No playlist exists with the given id.
    #[error("Playlist not found: {id}")]
    NotFound {
        /// Playlist identifier.
        id: String,
    },
}

/// Errors raised by file system operations.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Reading a file failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Writing a file failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Creating a directory failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Deleting a file failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path that could not be deleted.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}
