//! Tuning for [`FsPlacer`](super::FsPlacer).

/// How relocations of scripts, voice artifacts, overlays and rendered
/// videos are carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacerConfig {
    /// Copy buffer, also used when hashing for verification.
    pub buffer_size: usize,
    /// Try `rename` first; the copy path is then only taken across
    /// filesystems (render output on a separate volume, for instance).
    pub prefer_atomic_moves: bool,
    /// Compare SHA-256 of source and destination after a copy.
    pub verify_checksums: bool,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            // Rendered videos run to hundreds of MB.
            buffer_size: 1024 * 1024,
            prefer_atomic_moves: true,
            verify_checksums: true,
        }
    }
}

impl PlacerConfig {
    pub fn with_atomic_moves(mut self, enabled: bool) -> Self {
        self.prefer_atomic_moves = enabled;
        self
    }

    pub fn with_checksum_verification(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }
}
