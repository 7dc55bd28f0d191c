//! Voice stage: speech synthesis of a script into audio and subtitles.

mod adapter;
mod client;
mod error;

pub use adapter::{VoiceAdapter, VoiceOutput};
pub use client::{PandratorClient, VoiceClient, VoiceRequest};
pub use error::VoiceError;
