//! Worker pool - the concurrency topology of one processor group
//!
//! A group's workers share a single intake channel; each item is claimed by
//! exactly one worker. Shutdown comes in two flavours keyed to the group's
//! durability: drain (finish everything already accepted) or discard (stop
//! now, drop the rest).

use crate::messaging::error::MessagingResult;
use crate::messaging::handles::WorkItem;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Per-message processing logic invoked by every worker
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, item: WorkItem) -> MessagingResult<Value>;
}

/// Handler that dispatches each item to a named entry point in the
/// deployment's runtime, passing the caller-supplied setup value along
/// with the payload.
pub struct RuntimeHandler {
    runtime: Arc<crate::runtime::api::RuntimeBridge>,
    function: String,
    setup: Value,
}

impl RuntimeHandler {
    pub(crate) fn new(
        runtime: Arc<crate::runtime::api::RuntimeBridge>,
        function: String,
        setup: Value,
    ) -> Self {
        Self {
            runtime,
            function,
            setup,
        }
    }
}

#[async_trait]
impl MessageHandler for RuntimeHandler {
    async fn on_message(&self, item: WorkItem) -> MessagingResult<Value> {
        self.runtime
            .invoke(&self.function, &[self.setup.clone(), item.payload])
            .map_err(|e| crate::messaging::error::MessagingError::OperationFailed {
                message: format!("handler {} failed: {}", self.function, e),
            })
    }
}

/// Pool of identical workers consuming a group's intake channel
pub(crate) struct WorkerPool {
    group_name: String,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers over the given intake receiver.
    ///
    /// `processed` and `failed` are owned by the group so the counts
    /// survive the pool itself.
    pub(crate) fn start(
        group_name: String,
        concurrency: usize,
        intake: mpsc::UnboundedReceiver<WorkItem>,
        handler: Arc<dyn MessageHandler>,
        processed: Arc<AtomicU64>,
        failed: Arc<AtomicU64>,
    ) -> Self {
        let intake = Arc::new(Mutex::new(intake));
        let (shutdown_tx, _) = watch::channel(false);

        let handles = (0..concurrency)
            .map(|worker_index| {
                let intake = Arc::clone(&intake);
                let handler = Arc::clone(&handler);
                let processed = Arc::clone(&processed);
                let failed = Arc::clone(&failed);
                let mut shutdown_rx = shutdown_tx.subscribe();
                let group_name = group_name.clone();

                tokio::spawn(async move {
                    loop {
                        let item = tokio::select! {
                            biased;
                            _ = discard_requested(&mut shutdown_rx) => break,
                            item = next_item(&intake) => item,
                        };

                        let Some(item) = item else {
                            // Intake closed and drained
                            break;
                        };

                        match handler.on_message(item).await {
                            Ok(_) => {
                                processed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                log::warn!(
                                    "Worker {} of group {} failed to process item: {}",
                                    worker_index,
                                    group_name,
                                    e
                                );
                            }
                        }
                    }
                    log::debug!("Worker {} of group {} stopped", worker_index, group_name);
                })
            })
            .collect();

        log::info!("Started {} workers for group {}", concurrency, group_name);
        Self {
            group_name,
            shutdown_tx,
            handles,
        }
    }

    /// Stop the pool.
    ///
    /// Durable groups drain: the intake sender must already be closed, and
    /// every worker runs until the channel is empty. Non-durable groups are
    /// told to discard and stop at the next opportunity.
    pub(crate) async fn shutdown(mut self, durable: bool) {
        if !durable {
            let _ = self.shutdown_tx.send(true);
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                log::warn!("Worker of group {} ended abnormally: {}", self.group_name, e);
            }
        }
        log::debug!("Worker pool for group {} shut down", self.group_name);
    }
}

/// Resolves when a discard-style shutdown has been requested
async fn discard_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Claim the next work item. The intake lock is held only while waiting,
/// never while processing, so workers run concurrently.
async fn next_item(intake: &Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>) -> Option<WorkItem> {
    intake.lock().await.recv().await
}
