use crate::error::ControllerError;
use crate::events::{EventRecorder, OperationEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Fixed-capacity ingestion queue sitting in front of the controller entry
/// point for externally triggered reconciliation.
///
/// Producers never block and never buffer unboundedly: a full queue
/// surfaces as `ControllerError::QueueFull` so the external trigger sees
/// backpressure instead of a silent drop or an indefinite wait.
pub struct OperationQueue {
    tx: mpsc::Sender<OperationEvent>,
    rx: Arc<Mutex<mpsc::Receiver<OperationEvent>>>,
    recorder: Arc<dyn EventRecorder>,
    workers: usize,
}

impl OperationQueue {
    pub fn new(capacity: usize, workers: usize, recorder: Arc<dyn EventRecorder>) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            recorder,
            workers,
        }
    }

    /// Enqueue an event without blocking
    pub fn submit(&self, event: OperationEvent) -> Result<(), ControllerError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => ControllerError::QueueFull,
            TrySendError::Closed(_) => ControllerError::QueueStopped,
        })
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain events with a pool of worker routines until `stop` is
    /// cancelled and the queue is empty. Events submitted concurrently may
    /// be processed in any order across workers.
    pub async fn run(&self, stop: CancellationToken) {
        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let rx = self.rx.clone();
            let recorder = self.recorder.clone();
            let stop = stop.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let event = {
                        let mut rx = rx.lock().await;
                        match rx.try_recv() {
                            Ok(event) => Some(event),
                            Err(TryRecvError::Empty) => {
                                // Stop only once the queue has drained
                                if stop.is_cancelled() {
                                    break;
                                }
                                tokio::select! {
                                    _ = stop.cancelled() => None,
                                    event = rx.recv() => event,
                                }
                            }
                            Err(TryRecvError::Disconnected) => break,
                        }
                    };
                    match event {
                        Some(event) => {
                            if let Err(err) = recorder.record(&event).await {
                                tracing::error!(
                                    "Failed to record operation event {}: {:#}",
                                    event.id,
                                    err
                                );
                            }
                        }
                        // Woken by the stop signal; loop back to drain
                        // whatever is still queued
                        None => continue,
                    }
                }
                tracing::debug!("Operation queue worker {} stopped", worker);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}
