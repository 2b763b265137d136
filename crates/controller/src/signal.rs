use crate::pods::{PodApi, AGENT_PROCESS_NAME};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// A request to nudge a pod's in-pod agent into re-reading its execution
/// control annotation immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRequest {
    pub namespace: String,
    pub pod_name: String,
    pub container: String,
}

/// Supervised best-effort signal delivery.
///
/// Annotation patches reach the in-pod agent through its mounted metadata
/// view, and that propagation is observed to take minutes. The dispatcher
/// fast-tracks the re-read by sending USR2 into the pod. Delivery is an
/// optimization only: failures are logged by the worker pool and never
/// reach the reconciler, since the annotation alone guarantees
/// correctness.
pub struct SignalDispatcher {
    tx: mpsc::Sender<SignalRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl SignalDispatcher {
    /// Spawn `workers` sender tasks over a queue of `capacity` requests.
    /// Must be called within a tokio runtime.
    pub fn new(pods: Arc<dyn PodApi>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..workers)
            .map(|_| {
                let pods = pods.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let request = { rx.lock().await.recv().await };
                        let Some(request) = request else {
                            break;
                        };
                        deliver(pods.as_ref(), request).await;
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Queue a signal send without blocking. Best effort: if the queue is
    /// full the request is dropped with a warning, never an error.
    pub fn dispatch(&self, request: SignalRequest) {
        if let Err(err) = self.tx.try_send(request) {
            let request = match err {
                TrySendError::Full(request) | TrySendError::Closed(request) => request,
            };
            tracing::warn!(
                "Dropping signal for pod {}: dispatch queue unavailable",
                request.pod_name
            );
        }
    }

    /// Stop accepting requests and wait for in-flight sends to finish
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn deliver(pods: &dyn PodApi, request: SignalRequest) {
    let command = signal_command();
    match pods
        .exec_in_pod(
            &request.namespace,
            &request.pod_name,
            &request.container,
            &command,
        )
        .await
    {
        Ok(_) => tracing::info!(
            "Signal of {} ({}) successfully issued",
            request.pod_name,
            request.container
        ),
        Err(err) => tracing::warn!("Signal command for {} failed: {:#}", request.pod_name, err),
    }
}

fn signal_command() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("kill -s USR2 $(pidof {AGENT_PROCESS_NAME})"),
    ]
}
