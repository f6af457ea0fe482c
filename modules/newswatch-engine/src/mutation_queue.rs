//! Single-consumer FIFO for read-modify-write tasks.
//!
//! Every task is run to completion, store I/O included, before the next one
//! is dequeued, so two queued writes never race on the same document. That
//! serializes all mutation traffic, including writes to unrelated documents.
//! Sharding the queue by document key would regain parallelism while keeping
//! per-document order.
//!
//! A task's result (or failure) goes back to its caller only. The consumer
//! keeps going after a task errors or panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use newswatch_common::NewsWatchError;

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A queued unit of work. The closure owns the caller's reply channel.
pub struct MutationTask {
    label: &'static str,
    seq: u64,
    enqueued_at: Instant,
    work: Box<dyn FnOnce() -> TaskFuture + Send>,
}

/// Resolves to the result of the task it was issued for.
pub struct MutationReceipt<T> {
    rx: oneshot::Receiver<Result<T, NewsWatchError>>,
}

impl<T> Future for MutationReceipt<T> {
    type Output = Result<T, NewsWatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the task panicked before replying.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(NewsWatchError::TaskAborted)))
    }
}

#[derive(Clone)]
pub struct MutationQueue {
    sender: mpsc::UnboundedSender<MutationTask>,
    next_seq: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
}

impl MutationQueue {
    /// Create the queue and spawn its consumer. The consumer exits once every
    /// handle has been dropped and the backlog is drained.
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(consume(receiver, pending.clone()));
        Self {
            sender,
            next_seq: Arc::new(AtomicU64::new(1)),
            pending,
        }
    }

    /// Queue `op` behind everything enqueued before it. Enqueue order is the
    /// order of calls to this method, not of awaiting the receipts.
    pub fn enqueue<T, F, Fut>(&self, label: &'static str, op: F) -> MutationReceipt<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NewsWatchError>> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let work = move || -> TaskFuture {
            Box::pin(async move {
                let result = op().await;
                if let Err(e) = &result {
                    warn!(seq, label, error = %e, "Mutation task failed");
                }
                // The caller may have stopped waiting; that is fine.
                let _ = reply.send(result);
            })
        };
        let task = MutationTask {
            label,
            seq,
            enqueued_at: Instant::now(),
            work: Box::new(work),
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(rejected)) = self.sender.send(task) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            drop(rejected);
            let (reply, rx) = oneshot::channel();
            let _ = reply.send(Err(NewsWatchError::QueueClosed));
            return MutationReceipt { rx };
        }
        MutationReceipt { rx }
    }

    /// Tasks enqueued but not yet finished, including the one running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

async fn consume(mut receiver: mpsc::UnboundedReceiver<MutationTask>, pending: Arc<AtomicUsize>) {
    info!("Mutation queue consumer started");

    while let Some(task) = receiver.recv().await {
        let MutationTask {
            label,
            seq,
            enqueued_at,
            work,
        } = task;
        debug!(
            seq,
            label,
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            "Running mutation task"
        );

        if AssertUnwindSafe(work()).catch_unwind().await.is_err() {
            error!(seq, label, "Mutation task panicked");
        }

        if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("All queued mutations processed");
        }
    }

    info!("Mutation queue consumer stopped");
}
