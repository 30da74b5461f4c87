//! Single-consumer work channel
//!
//! Moves replication work off the RPC receive path: `receive_sync` returns
//! to the caller as soon as its batch is queued here, and the worker applies
//! batches strictly in arrival order. A failing job is logged; the worker
//! never dies.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

type Job = (
    &'static str,
    Pin<Box<dyn Future<Output = eyre::Result<()>> + Send>>,
);

#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<Job>,
}

impl EventEmitter {
    /// Start the consumer task and return a handle for producers.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some((label, job)) = rx.recv().await {
                if let Err(e) = job.await {
                    tracing::error!(job = label, error = %e, "emitted job failed");
                }
            }
            tracing::debug!("event emitter drained and stopped");
        });
        Self { tx }
    }

    /// Enqueue a job for sequential execution.
    pub fn emit<F>(&self, label: &'static str, job: F)
    where
        F: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        if self.tx.send((label, Box::pin(job))).is_err() {
            tracing::error!(job = label, "event emitter is gone, dropping job");
        }
    }
}
