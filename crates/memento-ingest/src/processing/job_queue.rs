//! In-memory job queue for background batch ingestion.
//!
//! Jobs and their progress live in a concurrent map polled by the caller;
//! nothing is persisted. Cancellation is cooperative: a job can only be
//! marked, and the worker drains it at the next file boundary.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Cancelled,
    Failed,
}

/// Outcome for one file within a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Completed,
    Skipped,
    Failed,
}

/// Per-file result recorded independently of every other file in the job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub outcome: FileOutcome,
    pub chunks: usize,
    pub images: usize,
    pub error: Option<String>,
}

/// Progress snapshot polled by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<FileResult>,
    pub cancel_requested: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobProgress {
    pub fn new(job_id: Uuid, total: usize) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            total,
            processed: 0,
            failed: 0,
            results: Vec::new(),
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// File data for processing
#[derive(Debug, Clone)]
pub struct FileData {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Per-job processing options
#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

/// A batch ingestion job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub files: Vec<FileData>,
    pub options: ProcessingOptions,
}

impl Job {
    pub fn new(files: Vec<FileData>) -> Self {
        Self {
            id: Uuid::new_v4(),
            files,
            options: ProcessingOptions::default(),
        }
    }
}

/// Queue of background ingestion jobs with polled progress
pub struct JobQueue {
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                jobs: Arc::new(DashMap::new()),
                sender,
            },
            receiver,
        )
    }

    /// Submit a job for processing
    pub async fn submit(&self, job: Job) -> Uuid {
        let job_id = job.id;
        self.jobs.insert(job_id, JobProgress::new(job_id, job.files.len()));

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("failed to submit job {}: {}", job_id, e);
            self.update_status(job_id, JobStatus::Failed);
        }
        job_id
    }

    /// Request cooperative cancellation; returns false for unknown or
    /// already-finished jobs. In-flight files are drained, not aborted.
    pub fn request_cancel(&self, job_id: Uuid) -> bool {
        match self.jobs.get_mut(&job_id) {
            Some(mut progress)
                if matches!(progress.status, JobStatus::Pending | JobStatus::Processing) =>
            {
                progress.cancel_requested = true;
                progress.updated_at = chrono::Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn is_cancel_requested(&self, job_id: Uuid) -> bool {
        self.jobs
            .get(&job_id)
            .map(|progress| progress.cancel_requested)
            .unwrap_or(false)
    }

    /// Get a progress snapshot
    pub fn get_progress(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|progress| progress.clone())
    }

    /// All jobs, newest first
    pub fn list_jobs(&self) -> Vec<JobProgress> {
        let mut jobs: Vec<JobProgress> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Update job status
    pub fn update_status(&self, job_id: Uuid, status: JobStatus) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = status;
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Record one file's outcome; failures in one file never touch another
    pub fn record_file_result(&self, job_id: Uuid, result: FileResult) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            match result.outcome {
                FileOutcome::Completed => progress.processed += 1,
                FileOutcome::Failed => progress.failed += 1,
                FileOutcome::Skipped => {}
            }
            progress.results.push(result);
            progress.updated_at = chrono::Utc::now();
        }
    }
}
