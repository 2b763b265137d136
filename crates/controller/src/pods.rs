use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Annotation key carrying the serialized `ExecutionControl` payload. The
/// in-pod agent observes it through its mounted metadata view; patching it
/// is the authoritative control channel.
pub const EXECUTION_CONTROL_ANNOTATION_KEY: &str = "stratus.io/execution-control";

/// Label marking pods that belong to a workflow's exit-handler subtree
pub const ON_EXIT_LABEL_KEY: &str = "stratus.io/on-exit";

/// Sidecar container running the in-pod agent
pub const WAIT_CONTAINER_NAME: &str = "wait";
/// The main container, which runs the agent itself when it is the pod's
/// only container
pub const MAIN_CONTAINER_NAME: &str = "main";

/// Process name of the in-pod agent, target of the expedited re-read signal
pub const AGENT_PROCESS_NAME: &str = "stratus-agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// The slice of live pod state the reconciler consumes
#[derive(Debug, Clone)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub containers: Vec<String>,
}

impl PodInfo {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            containers: vec![MAIN_CONTAINER_NAME.to_string(), WAIT_CONTAINER_NAME.to_string()],
        }
    }

    pub fn is_on_exit(&self) -> bool {
        self.labels.contains_key(ON_EXIT_LABEL_KEY)
    }

    /// Container the control signal goes to: the wait container, or the
    /// main container when the pod runs the agent as its only container
    pub fn signal_container(&self) -> &'static str {
        if self.containers.len() == 1 {
            MAIN_CONTAINER_NAME
        } else {
            WAIT_CONTAINER_NAME
        }
    }
}

/// Cluster operations the reconciler needs, abstracted from the concrete
/// Kubernetes client. All calls are network-bound: implementations must
/// honor cancellation and surface timeouts as retryable errors.
#[async_trait]
pub trait PodApi: Send + Sync {
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    async fn annotate_pod(&self, namespace: &str, name: &str, key: &str, value: &str)
        -> Result<()>;

    /// Run `command` inside a container of the pod, returning its combined
    /// output
    async fn exec_in_pod(
        &self,
        namespace: &str,
        name: &str,
        container: &str,
        command: &[String],
    ) -> Result<String>;
}

/// One recorded `FakePodApi` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodApiCall {
    Delete {
        namespace: String,
        name: String,
    },
    Annotate {
        namespace: String,
        name: String,
        key: String,
        value: String,
    },
    Exec {
        namespace: String,
        name: String,
        container: String,
        command: Vec<String>,
    },
}

/// In-memory `PodApi` double recording every call, with per-verb failure
/// injection. Used by the test suites; handy for dry runs too.
#[derive(Debug, Default)]
pub struct FakePodApi {
    calls: Mutex<Vec<PodApiCall>>,
    pub fail_deletes: AtomicBool,
    pub fail_annotations: AtomicBool,
    pub fail_execs: AtomicBool,
}

impl FakePodApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PodApiCall> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    fn record(&self, call: PodApiCall) {
        self.calls.lock().expect("call log lock poisoned").push(call);
    }
}

#[async_trait]
impl PodApi for FakePodApi {
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.record(PodApiCall::Delete {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("delete of {namespace}/{name} refused"));
        }
        Ok(())
    }

    async fn annotate_pod(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.record(PodApiCall::Annotate {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        if self.fail_annotations.load(Ordering::SeqCst) {
            return Err(anyhow!("annotate of {namespace}/{name} refused"));
        }
        Ok(())
    }

    async fn exec_in_pod(
        &self,
        namespace: &str,
        name: &str,
        container: &str,
        command: &[String],
    ) -> Result<String> {
        self.record(PodApiCall::Exec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            container: container.to_string(),
            command: command.to_vec(),
        });
        if self.fail_execs.load(Ordering::SeqCst) {
            return Err(anyhow!("exec in {namespace}/{name} refused"));
        }
        Ok(String::new())
    }
}
