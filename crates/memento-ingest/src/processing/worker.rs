//! Background worker driving the per-file ingestion pipeline.
//!
//! Files inside a job run concurrently behind a semaphore; each file's
//! outcome is recorded on its own, so one failure never aborts the batch.
//! Parsing is synchronous and CPU-bound, so it runs on the blocking pool.

use futures_util::future::join_all;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::{FormatSniffer, IngestPipeline};
use crate::providers::{
    apply_section_titles, caption_images, generate_section_titles, LlmProvider, VectorSink,
};
use crate::types::Chunk;

use super::job_queue::{FileData, FileOutcome, FileResult, Job, JobQueue, JobStatus};

/// Worker processing ingestion jobs in the background
pub struct IngestWorker {
    pipeline: Arc<IngestPipeline>,
    sink: Arc<dyn VectorSink>,
    llm: Option<Arc<dyn LlmProvider>>,
    job_queue: Arc<JobQueue>,
    parallel_files: usize,
    caption_concurrency: usize,
    file_timeout: Duration,
}

impl IngestWorker {
    pub fn new(
        config: &IngestConfig,
        job_queue: Arc<JobQueue>,
        sink: Arc<dyn VectorSink>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let parallel_files = config
            .processing
            .parallel_files
            .unwrap_or_else(|| num_cpus::get().min(8));

        tracing::info!(
            "worker configured: {} parallel files, {}s file timeout, captions {}",
            parallel_files,
            config.processing.file_timeout_secs,
            if llm.is_some() { "on" } else { "off" }
        );

        Self {
            pipeline: Arc::new(IngestPipeline::new(config)),
            sink,
            llm,
            job_queue,
            parallel_files,
            caption_concurrency: config.captioning.max_concurrency,
            file_timeout: Duration::from_secs(config.processing.file_timeout_secs),
        }
    }

    /// Process jobs from the queue until the channel closes
    pub async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        while let Some(job) = receiver.recv().await {
            let job_id = job.id;
            tracing::info!("processing job {} with {} files", job_id, job.files.len());
            self.job_queue.update_status(job_id, JobStatus::Processing);

            self.process_job(job).await;

            let status = if self.job_queue.is_cancel_requested(job_id) {
                JobStatus::Cancelled
            } else {
                JobStatus::Complete
            };
            self.job_queue.update_status(job_id, status);
            tracing::info!("job {} finished as {:?}", job_id, status);
        }
    }

    /// Run every file in the job behind the concurrency gate.
    ///
    /// Cancellation is checked at the file boundary: files not yet started
    /// are recorded as skipped, files already running finish normally.
    async fn process_job(&self, job: Job) {
        let job_id = job.id;
        let semaphore = Arc::new(Semaphore::new(self.parallel_files));

        let file_futures: Vec<_> = job
            .files
            .into_iter()
            .map(|file| {
                let pipeline = self.pipeline.clone();
                let sink = self.sink.clone();
                let llm = self.llm.clone();
                let job_queue = self.job_queue.clone();
                let semaphore = semaphore.clone();
                let caption_concurrency = self.caption_concurrency;
                let file_timeout = self.file_timeout;

                async move {
                    let filename = file.filename.clone();
                    if job_queue.is_cancel_requested(job_id) {
                        job_queue.record_file_result(
                            job_id,
                            FileResult {
                                filename,
                                outcome: FileOutcome::Skipped,
                                chunks: 0,
                                images: 0,
                                error: Some("job cancelled before start".to_string()),
                            },
                        );
                        return;
                    }

                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    let work = process_single_file(
                        pipeline,
                        sink,
                        llm,
                        file,
                        caption_concurrency,
                    );

                    let result = match timeout(file_timeout, work).await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::error!(
                                "[{}] timeout after {}s",
                                filename,
                                file_timeout.as_secs()
                            );
                            FileResult {
                                filename: filename.clone(),
                                outcome: FileOutcome::Failed,
                                chunks: 0,
                                images: 0,
                                error: Some(format!(
                                    "processing timeout after {}s",
                                    file_timeout.as_secs()
                                )),
                            }
                        }
                    };
                    job_queue.record_file_result(job_id, result);
                }
            })
            .collect();

        join_all(file_futures).await;
    }
}

/// Full per-file pipeline: parse, chunk, extract, caption, link, title, store
async fn process_single_file(
    pipeline: Arc<IngestPipeline>,
    sink: Arc<dyn VectorSink>,
    llm: Option<Arc<dyn LlmProvider>>,
    file: FileData,
    caption_concurrency: usize,
) -> FileResult {
    let filename = file.filename.clone();

    let skipped = |reason: String| FileResult {
        filename: filename.clone(),
        outcome: FileOutcome::Skipped,
        chunks: 0,
        images: 0,
        error: Some(reason),
    };
    let failed = |error: String| FileResult {
        filename: filename.clone(),
        outcome: FileOutcome::Failed,
        chunks: 0,
        images: 0,
        error: Some(error),
    };

    match ingest_file(pipeline, llm, &file, caption_concurrency).await {
        Ok((chunks, image_count)) => match sink.embed_and_store(&chunks).await {
            Ok(true) => FileResult {
                filename,
                outcome: FileOutcome::Completed,
                chunks: chunks.len(),
                images: image_count,
                error: None,
            },
            Ok(false) => failed("vector store rejected chunk batch".to_string()),
            Err(e) => failed(format!("store failed: {}", e)),
        },
        // Unsupported and password-protected files are skips, not failures
        Err(e @ (Error::Unsupported(_) | Error::PasswordProtected(_))) => skipped(e.to_string()),
        Err(e) => failed(e.to_string()),
    }
}

/// Parse through to linked, titled chunks ready for storage
async fn ingest_file(
    pipeline: Arc<IngestPipeline>,
    llm: Option<Arc<dyn LlmProvider>>,
    file: &FileData,
    caption_concurrency: usize,
) -> Result<(Vec<Chunk>, usize)> {
    let filename = file.filename.clone();
    let data = file.data.clone();
    let file_id = derive_file_id(&data);

    // Parse, chunk and extract images on the blocking pool; all CPU-bound
    let blocking_pipeline = pipeline.clone();
    let (mut chunks, images) = tokio::task::spawn_blocking(move || {
        let documents = blocking_pipeline.parse_file(&filename, &data)?;
        let chunks = blocking_pipeline.chunk(&documents);
        let images = blocking_pipeline
            .extract_images(&data, &filename, &file_id)
            .unwrap_or_else(|e| {
                tracing::warn!("[{}] image extraction failed: {}", filename, e);
                Vec::new()
            });
        Ok::<_, Error>((chunks, images))
    })
    .await
    .map_err(|e| Error::internal(format!("parse task panicked: {}", e)))??;

    let image_count = images.len();
    let captions = match &llm {
        Some(llm) if !images.is_empty() => {
            caption_images(llm.clone(), &images, caption_concurrency).await
        }
        _ => std::collections::HashMap::new(),
    };
    // Always link: tokens must be consumed even when captioning is off
    pipeline.link_images(&mut chunks, &images, &captions);

    if let Some(llm) = &llm {
        let titles = generate_section_titles(llm.clone(), &chunks, caption_concurrency).await;
        apply_section_titles(&mut chunks, &titles);
    }

    Ok((chunks, image_count))
}

/// Deterministic file id from content bytes, so image ids and captions stay
/// stable across re-runs of the same file
pub fn derive_file_id(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(&hasher.finalize()[..8])
}

/// Collect supported files under a directory into job file data.
///
/// Unsupported extensions and unreadable files are skipped with a log line;
/// a bad file never sinks the folder.
pub async fn load_directory(dir: &Path) -> Vec<FileData> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        if !FormatSniffer::sniff(&filename).is_supported() {
            tracing::debug!("skipping unsupported file {}", entry.path().display());
            continue;
        }
        match tokio::fs::read(entry.path()).await {
            Ok(data) => files.push(FileData { filename, data }),
            Err(e) => {
                tracing::warn!("cannot read {}: {}", entry.path().display(), e);
            }
        }
    }
    files
}
