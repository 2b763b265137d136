use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// The operation queue is at capacity. Expected under load; the
    /// submitter should back off and retry rather than treat it as a bug.
    #[error("operation queue full")]
    QueueFull,

    /// The operation queue's consumers have gone away
    #[error("operation queue stopped")]
    QueueStopped,
}
