//! Trait definitions for the placer module.

use async_trait::async_trait;

use super::error::PlacerError;
use super::types::{PlacedFile, Relocation};

/// Moves files to their final locations.
#[async_trait]
pub trait Placer: Send + Sync {
    /// Returns the name of this placer implementation.
    fn name(&self) -> &str;

    /// Moves one file. The source no longer exists once this returns `Ok`.
    async fn relocate(&self, relocation: &Relocation) -> Result<PlacedFile, PlacerError>;
}
