//! Placer module for moving files to their final destinations.
//!
//! Every file the pipeline touches (scripts, voice artifacts, overlays,
//! rendered videos) changes state by being moved, so all moves go through
//! the `Placer` trait.
//!
//! # Features
//!
//! - Atomic rename when source and destination share a filesystem
//! - Copy with SHA-256 verification when they don't
//! - Automatic parent directory creation
//! - Bounded retry with a fixed backoff
//!
//! # Example
//!
//! ```ignore
//! use narrato_core::placer::{relocate_with_retry, FsPlacer, Relocation, RetryPolicy};
//!
//! let placer = FsPlacer::with_defaults();
//! let relocation = Relocation::into_dir("/wf/scripts/C1/s.txt", &processed_dir);
//! let placed = relocate_with_retry(&placer, &relocation, RetryPolicy::default()).await?;
//! println!("Placed {} ({} bytes)", placed.destination.display(), placed.size_bytes);
//! ```

mod config;
mod error;
mod fs_placer;
mod retry;
mod traits;
mod types;

pub use config::PlacerConfig;
pub use error::PlacerError;
pub use fs_placer::FsPlacer;
pub use retry::{relocate_with_retry, RetryPolicy};
pub use traits::Placer;
pub use types::{PlacedFile, PlacementMethod, Relocation};
