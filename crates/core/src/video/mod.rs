//! Video stage: asynchronous rendering with status polling.

mod adapter;
mod client;
mod error;

pub use adapter::{PollPolicy, RenderTask, VideoAdapter, VideoOutput};
pub use client::{RenderRequest, RenderServiceClient, RenderStatus, VideoClient};
pub use error::VideoError;
