//! Job dispatcher.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use lectern_models::VideoStatus;
use lectern_queue::ProcessVideoJob;

use crate::config::{AdmissionPolicy, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::VideoPipeline;

pub const METRIC_JOBS_SUBMITTED: &str = "lectern_jobs_submitted_total";
pub const METRIC_JOBS_REJECTED: &str = "lectern_jobs_rejected_total";
pub const METRIC_JOBS_FAILED: &str = "lectern_jobs_failed_total";

/// Something that can run a submitted job to completion.
#[async_trait]
pub trait PipelineRunner: Send + Sync + 'static {
    async fn run(&self, job: &ProcessVideoJob) -> WorkerResult<Option<VideoStatus>>;
}

#[async_trait]
impl PipelineRunner for VideoPipeline {
    async fn run(&self, job: &ProcessVideoJob) -> WorkerResult<Option<VideoStatus>> {
        VideoPipeline::run(self, &job.video_id, &job.source_path).await
    }
}

/// Decrements the in-flight count when a job task ends, however it ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool running pipeline jobs in the background.
///
/// `submit` never waits for a run to finish. Whether it waits for capacity
/// depends on the [`AdmissionPolicy`].
pub struct JobDispatcher {
    runner: Arc<dyn PipelineRunner>,
    max_concurrent_jobs: usize,
    admission: AdmissionPolicy,
    /// Running jobs
    workers: Arc<Semaphore>,
    /// Running plus waiting jobs, when the queue is bounded
    admitted: Option<Arc<Semaphore>>,
    in_flight: Arc<AtomicUsize>,
    accepting: AtomicBool,
}

impl JobDispatcher {
    pub fn new(
        runner: Arc<dyn PipelineRunner>,
        max_concurrent_jobs: usize,
        admission: AdmissionPolicy,
    ) -> Self {
        let max_concurrent_jobs = max_concurrent_jobs.max(1);
        let admitted = admission
            .max_queued()
            .map(|max_queued| Arc::new(Semaphore::new(max_concurrent_jobs + max_queued)));

        info!(
            "Job dispatcher started with {} workers, admission {:?}",
            max_concurrent_jobs, admission
        );

        Self {
            runner,
            max_concurrent_jobs,
            admission,
            workers: Arc::new(Semaphore::new(max_concurrent_jobs)),
            admitted,
            in_flight: Arc::new(AtomicUsize::new(0)),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn from_config(runner: Arc<dyn PipelineRunner>, config: &WorkerConfig) -> Self {
        Self::new(runner, config.max_concurrent_jobs, config.admission)
    }

    /// Hand a job to the pool.
    ///
    /// Fails with [`WorkerError::Rejected`] under `Reject` when the queue is
    /// full, and with [`WorkerError::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn submit(&self, job: ProcessVideoJob) -> WorkerResult<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(WorkerError::ShuttingDown);
        }

        let slot = self.admit().await?;
        counter!(METRIC_JOBS_SUBMITTED).increment(1);
        debug!(video_id = %job.video_id, "Job submitted");

        let guard = InFlightGuard::new(Arc::clone(&self.in_flight));
        let workers = Arc::clone(&self.workers);
        let runner = Arc::clone(&self.runner);

        tokio::spawn(async move {
            let _guard = guard;
            let _slot = slot;
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(video_id = %job.video_id, "Worker pool closed, dropping job");
                    return;
                }
            };
            Self::execute_job(runner.as_ref(), &job).await;
        });

        Ok(())
    }

    async fn admit(&self) -> WorkerResult<Option<OwnedSemaphorePermit>> {
        let Some(admitted) = &self.admitted else {
            return Ok(None);
        };

        match self.admission {
            AdmissionPolicy::Reject { max_queued } => {
                match Arc::clone(admitted).try_acquire_owned() {
                    Ok(permit) => Ok(Some(permit)),
                    Err(_) => {
                        counter!(METRIC_JOBS_REJECTED).increment(1);
                        warn!("Rejecting job: {} jobs already waiting", max_queued);
                        Err(WorkerError::Rejected { queued: max_queued })
                    }
                }
            }
            AdmissionPolicy::Block { .. } => Arc::clone(admitted)
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| WorkerError::ShuttingDown),
            AdmissionPolicy::Unbounded => Ok(None),
        }
    }

    async fn execute_job(runner: &dyn PipelineRunner, job: &ProcessVideoJob) {
        let video_id = &job.video_id;
        info!(video_id = %video_id, queued_secs = job.queued_secs(), "Executing job");

        match runner.run(job).await {
            Ok(Some(status)) => {
                info!(video_id = %video_id, status = %status, "Job completed");
            }
            Ok(None) => {
                info!(video_id = %video_id, "Job had nothing to process");
            }
            Err(e) => {
                counter!(METRIC_JOBS_FAILED).increment(1);
                error!(video_id = %video_id, "Job failed: {}", e);
            }
        }
    }

    /// Jobs currently running.
    pub fn running(&self) -> usize {
        self.max_concurrent_jobs - self.workers.available_permits()
    }

    /// Jobs running or waiting for a worker.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Stop admitting jobs and wait up to `timeout` for in-flight ones.
    ///
    /// Returns whether every job finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.accepting.store(false, Ordering::SeqCst);
        if let Some(admitted) = &self.admitted {
            admitted.close();
        }

        info!("Waiting for {} in-flight jobs to complete...", self.in_flight());
        let drained = tokio::time::timeout(timeout, self.wait_for_jobs())
            .await
            .is_ok();
        if drained {
            info!("Job dispatcher stopped");
        } else {
            warn!(
                "Shutdown timed out with {} jobs still in flight",
                self.in_flight()
            );
        }
        drained
    }

    async fn wait_for_jobs(&self) {
        while self.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("admission", &self.admission)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
