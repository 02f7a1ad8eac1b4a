//! Background batch processing with a polled job queue

mod job_queue;
mod worker;

pub use job_queue::{
    FileData, FileOutcome, FileResult, Job, JobProgress, JobQueue, JobStatus, ProcessingOptions,
};
pub use worker::{derive_file_id, load_directory, IngestWorker};
