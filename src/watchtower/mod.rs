//! Scheduled holdings collection and change reporting

pub mod backfill;
pub mod changes;
pub mod job;
pub mod scheduler;

pub use backfill::{backfill_directory, BackfillReport};
pub use changes::{ChangeService, EtfChangeSet};
pub use job::{ingest_file, JobConfig, JobReport, StoredSnapshot, WatchtowerJob};
pub use scheduler::Scheduler;
