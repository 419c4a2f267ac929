//! Segment assignment that continues after the response has been sent.
//!
//! Jobs go through a bounded channel to a single worker task, which runs them
//! one at a time in submission order. Nothing waits on a job's completion and
//! there is no ordering with respect to later, unrelated registrations.

use crate::config::BatchPolicy;
use crate::orchestrator::run_batch;
use crate::remote::MarketingApi;
use crate::segments::SegmentResolver;
use crate::types::{ContactId, SegmentName};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct BackgroundJob {
    pub contact: ContactId,
    pub segments: Vec<SegmentName>,
}

/// Submission side of the background worker.
#[derive(Clone)]
pub struct BackgroundQueue {
    tx: mpsc::Sender<BackgroundJob>,
    pending: Arc<AtomicUsize>,
}

/// Handle to the worker task. Hold it for as long as the service runs.
pub struct BackgroundWorker {
    handle: JoinHandle<()>,
    close: oneshot::Sender<()>,
}

impl BackgroundQueue {
    /// Spawns the worker on the current runtime.
    pub fn start(api: Arc<dyn MarketingApi>, policy: &BatchPolicy) -> (Self, BackgroundWorker) {
        let (tx, rx) = mpsc::channel::<BackgroundJob>(policy.background_queue_capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            resolver: SegmentResolver::new(api.clone()),
            api,
            delay: policy.background_delay(),
            pending: pending.clone(),
        };
        let handle = tokio::spawn(worker.run(rx, close_rx));

        (
            BackgroundQueue { tx, pending },
            BackgroundWorker {
                handle,
                close: close_tx,
            },
        )
    }

    /// Queues a job without waiting. Returns false, after logging, when the
    /// queue is full or already closed.
    pub fn submit(&self, job: BackgroundJob) -> bool {
        let contact = job.contact.clone();
        let count = job.segments.len();

        self.pending.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::info!(contact_id = %contact, segments = count, "segments queued for background processing");
                true
            }
            Err(err) => {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                let reason = match err {
                    TrySendError::Full(_) => "queue is full",
                    TrySendError::Closed(_) => "queue is closed",
                };
                tracing::error!(contact_id = %contact, segments = count, "dropping background segments: {reason}");
                false
            }
        }
    }

    /// Jobs submitted and not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

impl BackgroundWorker {
    /// Stops accepting new jobs and waits until the queued ones have run.
    pub async fn drain(self) {
        let _ = self.close.send(());
        if let Err(e) = self.handle.await {
            tracing::error!("background worker panicked: {e}");
        }
    }
}

struct Worker {
    api: Arc<dyn MarketingApi>,
    resolver: SegmentResolver,
    delay: Duration,
    pending: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<BackgroundJob>, mut close: oneshot::Receiver<()>) {
        let worker = Arc::new(self);
        let mut closing = false;

        loop {
            let job = tokio::select! {
                signal = &mut close, if !closing => {
                    closing = true;
                    // A dropped handle is not a close request
                    if signal.is_ok() {
                        rx.close();
                    }
                    continue;
                }
                job = rx.recv() => job,
            };

            let Some(job) = job else {
                break;
            };

            // Each job runs in its own task so a panic ends only that job.
            let runner = worker.clone();
            if let Err(e) = tokio::spawn(async move { runner.process(job).await }).await {
                tracing::error!("background job panicked: {e}");
            }
            worker.pending.fetch_sub(1, Ordering::Relaxed);
        }

        tracing::debug!("background worker stopped");
    }

    async fn process(&self, job: BackgroundJob) {
        tracing::info!(
            contact_id = %job.contact,
            segments = job.segments.len(),
            "processing background segments"
        );

        // Keep spacing from whatever ran right before this job.
        tokio::time::sleep(self.delay).await;

        let report = run_batch(
            &self.resolver,
            self.api.as_ref(),
            &job.contact,
            &job.segments,
            self.delay,
        )
        .await;

        if report.skipped.is_empty() {
            tracing::info!(
                contact_id = %job.contact,
                resolved = report.resolved.len(),
                subscribed = report.subscribed,
                "background segments done"
            );
        } else {
            tracing::warn!(
                contact_id = %job.contact,
                resolved = report.resolved.len(),
                skipped = ?report.skipped,
                subscribed = report.subscribed,
                "background segments done with failures"
            );
        }
    }
}
