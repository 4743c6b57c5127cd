//! Tunevault Core Library
//!
//! This crate provides the core functionality for the Tunevault application:
//! - Locating and driving the external media fetch tool
//! - Song metadata extraction and audio downloads into a local cache
//! - Persistent, queryable playlists

pub mod cache_dir;
pub mod config;
pub mod decoder;
pub mod download;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod process;
pub mod song;
pub mod store;
pub mod tools;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use pipeline::MediaPipeline;
pub use song::Song;
pub use store::{Playlist, PlaylistStore};
