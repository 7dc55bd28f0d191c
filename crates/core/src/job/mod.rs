//! Script jobs: the record of one script moving through the pipeline,
//! its status machine and its persistent store.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{ErrorStage, JobStatus, JobUpdate, NewJob, ScriptJob};
