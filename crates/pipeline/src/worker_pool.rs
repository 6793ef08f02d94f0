//! Worker pool draining the admission queue.
//!
//! Each worker takes one submission at a time and runs it to a terminal
//! state before dequeuing the next.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::executor::PipelineExecutor;
use crate::queue::AdmissionQueue;

pub struct WorkerPool {
    queue: AdmissionQueue,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers (at least one).
    pub fn start(
        worker_count: usize,
        queue: AdmissionQueue,
        executor: Arc<PipelineExecutor>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handles = (0..worker_count.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    queue.clone(),
                    Arc::clone(&executor),
                    cancel.clone(),
                ))
            })
            .collect::<Vec<_>>();
        tracing::info!(workers = handles.len(), "Worker pool started");
        Self {
            queue,
            cancel,
            handles,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Close the queue and wait until every queued submission has run.
    pub async fn drain(self) {
        self.queue.close();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
        tracing::info!("Worker pool drained");
    }

    /// Close the queue, stop idle workers and wait up to `timeout` for
    /// in-flight submissions. Returns `false` if the timeout elapsed first.
    ///
    /// Submissions still queued stay `Submitted` and are picked up again by
    /// start-up recovery.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.queue.close();
        self.cancel.cancel();
        let join_all = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Worker task failed");
                }
            }
        };
        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => {
                tracing::info!("Worker pool stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "Worker pool shutdown timed out with submissions still running"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    queue: AdmissionQueue,
    executor: Arc<PipelineExecutor>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker, "Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.dequeue() => next,
        };
        let Some((item, _slot)) = next else {
            break;
        };

        tracing::info!(
            worker,
            submission_id = %item.submission_id,
            priority = item.priority,
            "Worker picked up submission"
        );
        match executor.run(item.submission_id).await {
            Ok(status) => tracing::info!(
                worker,
                submission_id = %item.submission_id,
                status = %status,
                "Submission finished"
            ),
            Err(e) => tracing::error!(
                worker,
                submission_id = %item.submission_id,
                error = %e,
                "Submission could not be processed"
            ),
        }
    }
    tracing::debug!(worker, "Worker stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
