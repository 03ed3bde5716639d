//! Background ingestion workers
//!
//! Uploads return immediately; ingestion runs on a small worker pool
//! fed by a bounded channel. Shutdown drains jobs already enqueued.

use super::IngestPipeline;
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to the ingestion worker pool
pub struct IngestQueue {
    sender: mpsc::Sender<String>,
    workers: Vec<JoinHandle<()>>,
}

impl IngestQueue {
    /// Spawn `workers` workers sharing one job channel
    pub fn start(pipeline: Arc<IngestPipeline>, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<String>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers)
            .map(|worker_id| {
                let pipeline = Arc::clone(&pipeline);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    debug!(worker = worker_id, "Ingestion worker started");
                    loop {
                        let job = receiver.lock().await.recv().await;
                        let Some(document_id) = job else {
                            debug!(worker = worker_id, "Ingestion worker stopping");
                            break;
                        };
                        // failures are already recorded on the document row
                        if let Err(e) = pipeline.run(&document_id).await {
                            warn!(worker = worker_id, document = %document_id, "Ingestion job failed: {}", e);
                        }
                    }
                })
            })
            .collect();

        info!(workers, capacity, "Ingestion queue started");
        Self {
            sender,
            workers: handles,
        }
    }

    /// Queue a document for ingestion; waits if the queue is full
    pub async fn enqueue(&self, document_id: String) -> Result<()> {
        self.sender
            .send(document_id)
            .await
            .map_err(|_| Error::InvalidState("ingestion queue is shut down".to_string()))
    }

    /// Close the queue and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        drop(self.sender);
        for result in futures::future::join_all(self.workers).await {
            if let Err(e) = result {
                warn!("Ingestion worker panicked: {}", e);
            }
        }
        info!("Ingestion queue drained");
    }
}
