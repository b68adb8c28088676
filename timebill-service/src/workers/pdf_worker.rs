use crate::billing::PdfCache;
use crate::config::PdfConfig;
use crate::error::BillingError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfJob {
    pub user_id: String,
    pub invoice_id: String,
}

/// Sending side of the render queue, handed to the billing engine.
#[derive(Clone)]
pub struct PdfQueue {
    job_tx: mpsc::Sender<PdfJob>,
}

impl PdfQueue {
    /// Never waits; a full queue drops the job since the PDF is rendered on
    /// demand anyway.
    pub fn enqueue(&self, job: PdfJob) -> Result<(), BillingError> {
        self.job_tx
            .try_send(job)
            .map_err(|e| BillingError::Render(format!("PDF queue rejected job: {}", e)))
    }
}

pub struct PdfWorker {
    config: PdfConfig,
    cache: PdfCache,
    job_rx: Option<mpsc::Receiver<PdfJob>>,
    shutdown_token: CancellationToken,
    max_retry_elapsed: Duration,
}

impl PdfWorker {
    pub fn new(config: PdfConfig, cache: PdfCache) -> (Self, PdfQueue) {
        let (job_tx, job_rx) = mpsc::channel(config.queue_size.max(1));

        let worker = Self {
            config,
            cache,
            job_rx: Some(job_rx),
            shutdown_token: CancellationToken::new(),
            max_retry_elapsed: Duration::from_secs(120),
        };

        (worker, PdfQueue { job_tx })
    }

    /// Cap on the time spent retrying one job.
    pub fn with_max_retry_elapsed(mut self, max: Duration) -> Self {
        self.max_retry_elapsed = max;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn start(mut self) {
        if !self.config.worker_enabled {
            tracing::info!("PDF worker pool disabled by configuration");
            return;
        }

        let Some(mut job_rx) = self.job_rx.take() else {
            tracing::warn!("PDF worker pool already started");
            return;
        };

        let worker_count = self.config.worker_count.max(1);
        tracing::info!(worker_count = worker_count, "Starting PDF worker pool");

        let workers: Vec<Worker> = (0..worker_count)
            .map(|id| Worker {
                id,
                cache: self.cache.clone(),
                max_retry_elapsed: self.max_retry_elapsed,
            })
            .collect();

        let shutdown = self.shutdown_token.clone();

        tokio::spawn(async move {
            let mut next_worker = 0;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("PDF job distributor shutting down");
                        break;
                    }
                    job = job_rx.recv() => {
                        match job {
                            Some(job) => {
                                let worker = workers[next_worker].clone();
                                next_worker = (next_worker + 1) % workers.len();

                                tracing::debug!(
                                    worker_id = worker.id,
                                    invoice_id = %job.invoice_id,
                                    "Dispatching PDF job"
                                );
                                tokio::spawn(async move {
                                    worker.process_job(job).await;
                                });
                            }
                            None => {
                                tracing::info!("PDF queue closed, distributor exiting");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }
}

#[derive(Clone)]
struct Worker {
    id: usize,
    cache: PdfCache,
    max_retry_elapsed: Duration,
}

impl Worker {
    async fn process_job(&self, job: PdfJob) {
        let start = Instant::now();

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        // Only rendering and storage problems are worth another attempt.
        let result = retry(backoff, || async {
            self.cache
                .ensure(&job.user_id, &job.invoice_id)
                .await
                .map_err(|e| {
                    if e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await;

        match result {
            Ok(bytes) => tracing::info!(
                worker_id = self.id,
                invoice_id = %job.invoice_id,
                size = bytes.len(),
                duration_ms = start.elapsed().as_millis(),
                "PDF job finished"
            ),
            Err(e) => tracing::error!(
                worker_id = self.id,
                invoice_id = %job.invoice_id,
                error = %e,
                "PDF job failed after retries"
            ),
        }
    }
}
