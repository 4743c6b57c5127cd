//! Optional audio decoder capabilities.
//!
//! Decoders are registered explicitly by the host; nothing is discovered at
//! runtime. The registry only answers capability questions (which decoder,
//! if any, handles a given file) — decoding itself happens outside this
//! crate.

use std::path::Path;

use tracing::debug;

/// A decoder capability the host has made available.
pub trait AudioDecoder: Send + Sync {
    /// Human-readable decoder name.
    fn name(&self) -> &str;

    /// True when this decoder can handle files with the given extension
    /// (lowercase, without the leading dot).
    fn supports_extension(&self, extension: &str) -> bool;
}

/// Registry of explicitly registered decoders.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn AudioDecoder>>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.decoders.iter().map(|d| d.name()).collect();
        f.debug_struct("DecoderRegistry").field("decoders", &names).finish()
    }
}

impl DecoderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder. Registration order is lookup order.
    pub fn register(&mut self, decoder: Box<dyn AudioDecoder>) {
        debug!(decoder = decoder.name(), "Registered audio decoder");
        self.decoders.push(decoder);
    }

    /// First registered decoder that supports the file's extension.
    #[must_use]
    pub fn decoder_for(&self, path: &Path) -> Option<&dyn AudioDecoder> {
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        self.decoders
            .iter()
            .map(Box::as_ref)
            .find(|decoder| decoder.supports_extension(&extension))
    }

    /// Number of registered decoders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// True when no decoder has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct StubDecoder {
        name: &'static str,
        extensions: &'static [&'static str],
    }

    impl AudioDecoder for StubDecoder {
        fn name(&self) -> &str {
            self.name
        }

        fn supports_extension(&self, extension: &str) -> bool {
            self.extensions.contains(&extension)
        }
    }

    #[test]
    fn empty_registry_matches_nothing() {
        let registry = DecoderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.decoder_for(&PathBuf::from("a.mp3")).is_none());
    }

    #[test]
    fn finds_decoder_by_extension() {
        let mut registry = DecoderRegistry::new();
        registry.register(Box::new(StubDecoder {
            name: "mp3-stub",
            extensions: &["mp3"],
        }));
        registry.register(Box::new(StubDecoder {
            name: "opus-stub",
            extensions: &["opus", "webm"],
        }));

        let found = registry
            .decoder_for(&PathBuf::from("/cache/ABC123.opus"))
            .expect("should find decoder");
        assert_eq!(found.name(), "opus-stub");
        assert!(registry.decoder_for(&PathBuf::from("x.flac")).is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let mut registry = DecoderRegistry::new();
        registry.register(Box::new(StubDecoder {
            name: "mp3-stub",
            extensions: &["mp3"],
        }));
        assert!(registry.decoder_for(&PathBuf::from("SONG.MP3")).is_some());
    }

    #[test]
    fn registration_order_breaks_ties() {
        let mut registry = DecoderRegistry::new();
        registry.register(Box::new(StubDecoder {
            name: "first",
            extensions: &["mp3"],
        }));
        registry.register(Box::new(StubDecoder {
            name: "second",
            extensions: &["mp3"],
        }));
        let found = registry
            .decoder_for(&PathBuf::from("a.mp3"))
            .expect("should find decoder");
        assert_eq!(found.name(), "first");
    }
}
