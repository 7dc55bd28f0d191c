//! Ingestion: per-channel filesystem watchers, the startup scan and the
//! dispatcher that turns scripts into queued jobs.

mod channel_watcher;
mod dispatcher;
mod error;
mod scan;

pub use channel_watcher::{is_script, ChannelWatcher, ChannelWatcherConfig};
pub use dispatcher::{DispatchOrigin, Dispatcher, ScriptEvent};
pub use error::{DispatchError, WatcherError};
pub use scan::scan_existing;
