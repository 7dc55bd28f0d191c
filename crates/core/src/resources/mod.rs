//! Shared resources: the execution slot, the overlay pools and the channel
//! configuration, reached through one explicitly constructed
//! [`ResourceCoordinator`].
//!
//! # Example
//!
//! ```ignore
//! use narrato_core::resources::{OverlayPool, ResourceCoordinator};
//!
//! let resources = ResourceCoordinator::new(layout, overlay_pool, config_cache);
//! let _slot = resources.acquire_slot(&job.id).await?;
//! let config = resources.channel_config(&job.channel).await?;
//! let overlay = resources.acquire_next_overlay(&job.channel, &config).await?;
//! // ... render ...
//! resources.consume_overlay(&overlay, &final_path).await?;
//! // slot released when `_slot` goes out of scope
//! ```

mod coordinator;
mod error;
mod overlay_pool;
mod slot;

pub use coordinator::ResourceCoordinator;
pub use error::ResourceError;
pub use overlay_pool::{OverlayPool, OverlayReservation};
pub use slot::{ExecutionSlot, SlotGuard, SlotStatus};
