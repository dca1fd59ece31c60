//! Job queue
//!
//! FIFO hand-off from the submission handlers (many producers) to the worker
//! loop (single consumer).

use atelier_core::domain::request::GenerationRequest;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// One queued job
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub job_id: String,
    pub request: GenerationRequest,
}

/// Creates a connected queue sender/receiver pair
pub fn job_queue() -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        JobQueue {
            tx,
            depth: depth.clone(),
        },
        JobReceiver { rx, depth },
    )
}

/// Producer side, cloned into every handler
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueueEntry>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    pub fn enqueue(&self, entry: QueueEntry) -> Result<(), QueueError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.tx.send(entry).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            QueueError::Closed
        })
    }

    /// Number of jobs waiting to be picked up
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer side, owned by the worker loop
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<QueueEntry>,
    depth: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Waits up to `wait` for the next job
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// `Err(QueueError::Closed)` once every producer is gone.
    pub async fn next(&mut self, wait: Duration) -> Result<Option<QueueEntry>, QueueError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(entry)) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(entry))
            }
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry {
            job_id: id.to_string(),
            request: GenerationRequest::new("p"),
        }
    }

    #[tokio::test]
    async fn test_fifo_order_and_depth() {
        let (queue, mut receiver) = job_queue();
        queue.enqueue(entry("a")).unwrap();
        queue.enqueue(entry("b")).unwrap();
        queue.enqueue(entry("c")).unwrap();
        assert_eq!(queue.len(), 3);

        let wait = Duration::from_millis(50);
        assert_eq!(receiver.next(wait).await.unwrap().unwrap().job_id, "a");
        assert_eq!(receiver.next(wait).await.unwrap().unwrap().job_id, "b");
        assert_eq!(queue.len(), 1);
        assert_eq!(receiver.next(wait).await.unwrap().unwrap().job_id, "c");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_queue_times_out() {
        let (_queue, mut receiver) = job_queue();
        let next = receiver.next(Duration::from_millis(20)).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, mut receiver) = job_queue();
        drop(queue);
        assert_eq!(
            receiver.next(Duration::from_millis(20)).await.unwrap_err(),
            QueueError::Closed
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped() {
        let (queue, receiver) = job_queue();
        drop(receiver);
        assert_eq!(queue.enqueue(entry("a")).unwrap_err(), QueueError::Closed);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let (queue, mut receiver) = job_queue();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.enqueue(entry(&format!("job{}", i))).unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut received = 0;
        while receiver.next(Duration::from_millis(20)).await.unwrap().is_some() {
            received += 1;
        }
        assert_eq!(received, 10);
        assert!(queue.is_empty());
    }
}
