//! Retrying, rate-limited queue for outbound API calls.

use crate::error::ReverieCoreError;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use reverie_config::QueueSettings;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Factory producing a fresh attempt future for a queued task.
type TaskFactory<T> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, ReverieCoreError>> + Send>;

struct QueueItem<T> {
    factory: TaskFactory<T>,
    responder: oneshot::Sender<Result<T, ReverieCoreError>>,
    attempts: u32,
}

/// Single-worker queue that serializes outbound calls.
///
/// Tasks run strictly one at a time in FIFO order, except that a failed
/// task is requeued to the front for quick retry. A task exceeding the
/// hard timeout rejects its caller and is never re-executed. Transient
/// failures are retried with per-task exponential backoff and stay
/// invisible to the caller until attempts are exhausted. A short random
/// jitter separates consecutive tasks.
pub struct RequestQueue<T> {
    sender: mpsc::UnboundedSender<QueueItem<T>>,
    worker: JoinHandle<()>,
}

impl<T: Send + 'static> RequestQueue<T> {
    /// Spawn a queue worker with the given settings.
    pub fn new(settings: QueueSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(receiver, settings));
        Self { sender, worker }
    }

    /// Enqueue a task and await its final result.
    ///
    /// The factory is invoked once per attempt so retries run a fresh
    /// future. The returned future resolves with the task's success,
    /// its timeout, or the error from the final failed attempt.
    pub async fn enqueue<F, Fut>(&self, mut factory: F) -> Result<T, ReverieCoreError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ReverieCoreError>> + Send + 'static,
    {
        let (responder, receiver) = oneshot::channel();
        let item = QueueItem {
            factory: Box::new(move || {
                let attempt: BoxFuture<'static, Result<T, ReverieCoreError>> =
                    Box::pin(factory());
                attempt
            }),
            responder,
            attempts: 0,
        };
        if self.sender.send(item).is_err() {
            return Err(ReverieCoreError::QueueClosed);
        }
        receiver.await.unwrap_or(Err(ReverieCoreError::QueueClosed))
    }
}

impl<T> Drop for RequestQueue<T> {
    /// Stop the worker; pending tasks resolve as queue-closed.
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker<T>(mut receiver: mpsc::UnboundedReceiver<QueueItem<T>>, settings: QueueSettings) {
    let timeout = Duration::from_secs(settings.task_timeout_secs);
    let mut pending: VecDeque<QueueItem<T>> = VecDeque::new();

    loop {
        while let Ok(item) = receiver.try_recv() {
            pending.push_back(item);
        }
        let Some(mut item) = pending.pop_front() else {
            match receiver.recv().await {
                Some(item) => {
                    pending.push_back(item);
                    continue;
                }
                None => break,
            }
        };

        match tokio::time::timeout(timeout, (item.factory)()).await {
            Err(_) => {
                warn!(
                    "queued task timed out, not retrying (timeout_secs={})",
                    settings.task_timeout_secs
                );
                let _ = item.responder.send(Err(ReverieCoreError::QueueTimeout));
            }
            Ok(Ok(value)) => {
                let _ = item.responder.send(Ok(value));
            }
            Ok(Err(err)) => {
                item.attempts += 1;
                if item.attempts >= settings.max_attempts {
                    warn!(
                        "queued task failed permanently (attempts={}, error={})",
                        item.attempts, err
                    );
                    let _ = item.responder.send(Err(err));
                } else {
                    let backoff = backoff_delay(item.attempts, settings.backoff_cap_secs);
                    debug!(
                        "queued task failed, retrying (attempts={}, backoff_secs={}, error={})",
                        item.attempts,
                        backoff.as_secs(),
                        err
                    );
                    tokio::time::sleep(backoff).await;
                    pending.push_front(item);
                }
            }
        }

        let jitter = jitter_delay(settings.jitter_min_ms, settings.jitter_max_ms);
        tokio::time::sleep(jitter).await;
    }

    while let Some(item) = pending.pop_front() {
        let _ = item.responder.send(Err(ReverieCoreError::QueueClosed));
    }
}

/// Exponential backoff for the Nth attempt, capped.
fn backoff_delay(attempts: u32, cap_secs: u64) -> Duration {
    let secs = 2u64.saturating_pow(attempts).min(cap_secs);
    Duration::from_secs(secs)
}

/// Random inter-task delay to avoid thundering-herd against upstreams.
fn jitter_delay(min_ms: u64, max_ms: u64) -> Duration {
    use rand::Rng;
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}
