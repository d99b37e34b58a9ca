//! Work Queue: unbounded FIFO of company batches drained by a single worker.
//!
//! Producers (`WorkQueue`, cloned into every request handler) never block. One
//! `QueueWorker` task takes batches in order, runs each to completion, then
//! sleeps the configured delay before taking the next. Shutdown is an explicit
//! command that is queued behind any pending batches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::models::CompanyBatch;

/// Runs one batch to completion. Implemented by `BatchPipeline`.
#[async_trait]
pub trait BatchRunner: Send + Sync {
    async fn run(&self, batch: CompanyBatch);
}

#[derive(Debug)]
enum QueueCommand {
    Process(CompanyBatch),
    Shutdown,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("work queue is closed")]
    Closed,
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::UnboundedSender<QueueCommand>,
    depth: Arc<AtomicUsize>,
}

/// Consumer half, handed to exactly one `QueueWorker`.
pub struct QueueReceiver {
    receiver: mpsc::UnboundedReceiver<QueueCommand>,
    depth: Arc<AtomicUsize>,
}

impl WorkQueue {
    pub fn new() -> (Self, QueueReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sender,
                depth: Arc::clone(&depth),
            },
            QueueReceiver { receiver, depth },
        )
    }

    /// Appends a batch to the tail and returns its 1-based position among
    /// pending batches.
    pub fn enqueue(&self, batch: CompanyBatch) -> Result<usize, QueueError> {
        let position = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(QueueCommand::Process(batch)).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }
        Ok(position)
    }

    /// Batches waiting to be processed (the one in progress is not counted).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Asks the worker to stop once everything queued before this call is done.
    pub fn shutdown(&self) -> Result<(), QueueError> {
        self.sender
            .send(QueueCommand::Shutdown)
            .map_err(|_| QueueError::Closed)
    }
}

pub struct QueueWorker {
    receiver: mpsc::UnboundedReceiver<QueueCommand>,
    depth: Arc<AtomicUsize>,
    runner: Arc<dyn BatchRunner>,
    batch_delay: Duration,
}

impl QueueWorker {
    pub fn new(queue: QueueReceiver, runner: Arc<dyn BatchRunner>, batch_delay: Duration) -> Self {
        Self {
            receiver: queue.receiver,
            depth: queue.depth,
            runner,
            batch_delay,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Queue worker started");

        while let Some(command) = self.receiver.recv().await {
            let batch = match command {
                QueueCommand::Process(batch) => batch,
                QueueCommand::Shutdown => {
                    info!("Queue worker received shutdown signal");
                    break;
                }
            };
            self.depth.fetch_sub(1, Ordering::SeqCst);

            // Each batch runs in its own task so a panic is contained to that batch.
            let company = batch.company_name.clone();
            let runner = Arc::clone(&self.runner);
            if let Err(e) = tokio::spawn(async move { runner.run(batch).await }).await {
                error!("Error processing batch for {company}: {e}");
            }

            if !self.batch_delay.is_zero() {
                info!(
                    "Waiting {:.1}s before next company...",
                    self.batch_delay.as_secs_f64()
                );
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        info!("Queue worker stopped");
    }
}
