use crate::pods::{PodApi, PodInfo, PodPhase, EXECUTION_CONTROL_ANNOTATION_KEY, WAIT_CONTAINER_NAME};
use crate::signal::{SignalDispatcher, SignalRequest};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use stratus_core::{ExecutionControl, NodePhase, ShutdownStrategy, Workflow};
use tokio::sync::RwLock;

/// Reconciles the desired execution-control state (shutdown, deadlines)
/// onto live pods, one pod per call per controller tick.
///
/// Node-map mutation happens only under the workflow lock's write scope;
/// everything network-bound goes through the `PodApi` boundary.
pub struct ExecControl {
    pods: Arc<dyn PodApi>,
    signals: Arc<SignalDispatcher>,
    workflow: Arc<RwLock<Workflow>>,
}

impl ExecControl {
    pub fn new(
        pods: Arc<dyn PodApi>,
        signals: Arc<SignalDispatcher>,
        workflow: Arc<RwLock<Workflow>>,
    ) -> Self {
        Self {
            pods,
            signals,
            workflow,
        }
    }

    /// Ensure the pod's execution control annotation is up to date, and
    /// kill pending pods once the workflow is shutting down or past its
    /// deadline.
    pub async fn apply_execution_control(&self, pod: &PodInfo) -> Result<()> {
        if matches!(pod.phase, PodPhase::Succeeded | PodPhase::Failed) {
            // Already completed
            return Ok(());
        }

        let (shutdown, workflow_deadline) = {
            let workflow = self.workflow.read().await;
            (workflow.shutdown, workflow.deadline)
        };

        if pod.phase == PodPhase::Pending {
            if shutdown.enabled() && !shutdown.should_execute(pod.is_on_exit()) {
                tracing::info!(
                    "Deleting Pending pod {}/{} as part of workflow shutdown with strategy: {}",
                    pod.namespace,
                    pod.name,
                    shutdown
                );
                match self.pods.delete_pod(&pod.namespace, &pod.name).await {
                    Ok(()) => {
                        self.mark_node_failed(
                            &pod.name,
                            &format!("workflow shutdown with strategy: {shutdown}"),
                        )
                        .await;
                        return Ok(());
                    }
                    // Fall back to the annotation channel when the delete
                    // fails
                    Err(err) => tracing::warn!(
                        "Failed to delete {}/{}: {:#}",
                        pod.namespace,
                        pod.name,
                        err
                    ),
                }
            }

            if let Some(deadline) = workflow_deadline {
                // onExit pods are not subject to the workflow deadline
                if Utc::now() > deadline && !pod.is_on_exit() {
                    tracing::info!(
                        "Deleting Pending pod {}/{} which has exceeded workflow deadline {}",
                        pod.namespace,
                        pod.name,
                        deadline
                    );
                    match self.pods.delete_pod(&pod.namespace, &pod.name).await {
                        Ok(()) => {
                            self.mark_node_failed(&pod.name, "Step exceeded its deadline")
                                .await;
                            return Ok(());
                        }
                        Err(err) => tracing::warn!(
                            "Failed to delete {}/{}: {:#}",
                            pod.namespace,
                            pod.name,
                            err
                        ),
                    }
                }
            }
        }

        let mut exec_ctl = pod_execution_control(pod);
        let container = pod.signal_container();

        if shutdown.enabled() && !shutdown.should_execute(pod.is_on_exit()) {
            // Epoch deadline: the in-pod agent treats it as already past
            exec_ctl.deadline = Some(DateTime::UNIX_EPOCH);
            tracing::info!("Applying shutdown deadline for pod {}", pod.name);
            return self
                .update_execution_control(&pod.namespace, &pod.name, &exec_ctl, container)
                .await;
        }

        if let Some(deadline) = workflow_deadline {
            // Only ever tighten: propose the workflow deadline when there
            // is no control deadline yet or ours is strictly sooner
            let tightens = match exec_ctl.deadline {
                None => true,
                Some(existing) => deadline < existing,
            };
            if tightens {
                exec_ctl.deadline = Some(deadline);
                tracing::info!(
                    "Applying sooner workflow deadline for pod {} at: {}",
                    pod.name,
                    deadline
                );
                return self
                    .update_execution_control(&pod.namespace, &pod.name, &exec_ctl, container)
                    .await;
            }
        }

        Ok(())
    }

    /// Push an immediate deadline to every daemoned child of the given
    /// boundary node. Best-effort fan-out: every target is attempted and
    /// the first error (if any) is returned.
    pub async fn kill_daemoned_children(&self, boundary_id: &str) -> Result<()> {
        tracing::info!("Checking daemoned children of {}", boundary_id);
        let exec_ctl = ExecutionControl {
            deadline: Some(DateTime::UNIX_EPOCH),
        };

        let (namespace, targets) = {
            let workflow = self.workflow.read().await;
            let targets: Vec<String> = workflow
                .nodes
                .values()
                .filter(|node| node.boundary_id == boundary_id && node.daemoned)
                .map(|node| node.id.clone())
                .collect();
            (workflow.namespace.clone(), targets)
        };

        let mut first_err = None;
        for node_id in targets {
            if let Err(err) = self
                .update_execution_control(&namespace, &node_id, &exec_ctl, WAIT_CONTAINER_NAME)
                .await
            {
                tracing::error!(
                    "Failed to update execution control of node {}: {:#}",
                    node_id,
                    err
                );
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Patch the serialized execution control onto the pod annotation (the
    /// authoritative channel), then queue a best-effort signal so the
    /// agent re-reads it without waiting for the metadata mount to
    /// propagate.
    pub async fn update_execution_control(
        &self,
        namespace: &str,
        pod_name: &str,
        exec_ctl: &ExecutionControl,
        container: &str,
    ) -> Result<()> {
        let payload =
            serde_json::to_string(exec_ctl).context("failed to serialize execution control")?;
        tracing::info!("Updating execution control of {}: {}", pod_name, payload);
        self.pods
            .annotate_pod(
                namespace,
                pod_name,
                EXECUTION_CONTROL_ANNOTATION_KEY,
                &payload,
            )
            .await
            .with_context(|| format!("failed to annotate pod {pod_name}"))?;

        tracing::info!("Signalling {} of updates", pod_name);
        self.signals.dispatch(SignalRequest {
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
            container: container.to_string(),
        });
        Ok(())
    }

    /// Mark the node backing `pod_name` Failed, holding the node map's
    /// write lock for the duration of the mutation
    async fn mark_node_failed(&self, pod_name: &str, reason: &str) {
        let mut workflow = self.workflow.write().await;
        if let Some(node) = workflow.nodes.get_mut(pod_name) {
            tracing::info!("Marking node {} Failed: {}", node.name, reason);
            node.phase = NodePhase::Failed;
            node.message = Some(reason.to_string());
            if node.finished_at.is_none() {
                node.finished_at = Some(Utc::now());
            }
        } else {
            tracing::warn!("No node found for pod {}", pod_name);
        }
    }
}

fn pod_execution_control(pod: &PodInfo) -> ExecutionControl {
    match pod.annotations.get(EXECUTION_CONTROL_ANNOTATION_KEY) {
        Some(raw) if !raw.is_empty() => match serde_json::from_str(raw) {
            Ok(exec_ctl) => exec_ctl,
            Err(_) => {
                tracing::warn!("Failed to unmarshal execution control from pod {}", pod.name);
                ExecutionControl::default()
            }
        },
        _ => ExecutionControl::default(),
    }
}
