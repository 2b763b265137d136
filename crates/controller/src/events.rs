use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An externally submitted operation wakeup, e.g. an event-driven trigger
/// asking the controller to reconcile a workflow out of band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEvent {
    pub id: String,
    pub namespace: String,

    /// Free-form routing hint the trigger may set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,

    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl OperationEvent {
    pub fn new(namespace: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            discriminator: None,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Sink for drained operation events
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, event: &OperationEvent) -> anyhow::Result<()>;
}

/// Recorder that emits each event to the tracing log
#[derive(Debug, Default)]
pub struct LogEventRecorder;

#[async_trait]
impl EventRecorder for LogEventRecorder {
    async fn record(&self, event: &OperationEvent) -> anyhow::Result<()> {
        tracing::info!(
            "Recorded operation event {} for namespace {}",
            event.id,
            event.namespace
        );
        Ok(())
    }
}
