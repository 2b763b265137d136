use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single task in a DAG template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagTask {
    pub name: String,

    /// Boolean expression over other tasks' results gating this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<String>,

    /// Ordered dependency list, kept for templates written before
    /// `depends` existed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on: Option<ContinueOn>,
}

impl DagTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Flags letting downstream tasks treat a Failed/Errored upstream task as a
/// satisfied dependency
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContinueOn {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub failed: bool,
}

/// Outcome of a task usable as the `.Result` of a `depends` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskResult {
    Succeeded,
    Failed,
    Errored,
    Skipped,
    Completed,
    Daemoned,
}

impl TaskResult {
    /// Parse a `.Result` token. Unknown tokens become a validation error at
    /// a higher level, so this stays an Option.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            "Errored" => Some(Self::Errored),
            "Skipped" => Some(Self::Skipped),
            "Completed" => Some(Self::Completed),
            "Daemoned" => Some(Self::Daemoned),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Errored => "Errored",
            Self::Skipped => "Skipped",
            Self::Completed => "Completed",
            Self::Daemoned => "Daemoned",
        }
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime phase of a scheduled node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
    Skipped,
}

impl NodePhase {
    /// True once the node can no longer change phase
    pub fn is_completed(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Error | Self::Skipped
        )
    }
}

impl std::fmt::Display for NodePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Error => "Error",
            Self::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// Kind of execution unit a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Pod,
    Steps,
    #[serde(rename = "DAG")]
    Dag,
    Retry,
}

/// Accumulated per-resource usage counts, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesDuration(pub HashMap<String, i64>);

impl ResourcesDuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elementwise accumulate `other` into self
    pub fn add(&mut self, other: &ResourcesDuration) {
        for (resource, duration) in &other.0 {
            *self.0.entry(resource.clone()).or_insert(0) += duration;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(|duration| *duration == 0)
    }
}

impl FromIterator<(String, i64)> for ResourcesDuration {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Runtime status record for one scheduled unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub phase: NodePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Id of the enclosing DAG/Steps container node; scopes fan-out
    /// operations like daemon termination
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub boundary_id: String,

    /// Child node ids. The same descendant may be routed through more than
    /// one parent, so the node relation is a DAG rather than a strict tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,

    #[serde(default)]
    pub daemoned: bool,

    /// Authoritative only for Pod nodes; recomputed for everything else by
    /// the aggregator
    #[serde(default, skip_serializing_if = "ResourcesDuration::is_zero")]
    pub resources_duration: ResourcesDuration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl NodeStatus {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type,
            phase: NodePhase::Pending,
            message: None,
            boundary_id: String::new(),
            children: Vec::new(),
            daemoned: false,
            resources_duration: ResourcesDuration::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Workflow-wide directive governing which live pods must be terminated
/// early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownStrategy {
    #[default]
    #[serde(rename = "")]
    None,
    Stopping,
    Terminating,
}

impl ShutdownStrategy {
    /// Whether a shutdown has been requested at all
    pub fn enabled(self) -> bool {
        self != Self::None
    }

    /// Whether a node is still allowed to execute under this strategy.
    /// Stopping spares the exit-handler subtree; Terminating spares
    /// nothing.
    pub fn should_execute(self, is_on_exit_node: bool) -> bool {
        match self {
            Self::None => true,
            Self::Stopping => is_on_exit_node,
            Self::Terminating => false,
        }
    }
}

impl std::fmt::Display for ShutdownStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "",
            Self::Stopping => "Stopping",
            Self::Terminating => "Terminating",
        };
        f.write_str(s)
    }
}

/// Aggregate root: the full node map plus workflow-level execution state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    pub namespace: String,

    /// Id of the root node; the workflow total aggregates from here
    pub root_node_id: String,

    #[serde(default)]
    pub nodes: HashMap<String, NodeStatus>,

    #[serde(default)]
    pub shutdown: ShutdownStrategy,

    /// Absolute time after which pending work is killed rather than run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "ResourcesDuration::is_zero")]
    pub resources_duration: ResourcesDuration,
}

impl Workflow {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root_node_id: name.clone(),
            name,
            namespace: namespace.into(),
            nodes: HashMap::new(),
            shutdown: ShutdownStrategy::None,
            deadline: None,
            resources_duration: ResourcesDuration::new(),
        }
    }
}

/// Execution directive communicated to a pod's in-pod agent. Lives only on
/// the pod annotation; derived fresh each reconciliation, never persisted
/// in the node model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionControl {
    /// Absolute time after which the agent must stop the main container.
    /// The epoch is used to mean "already past, stop now".
    pub deadline: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_strategy_should_execute() {
        assert!(ShutdownStrategy::None.should_execute(false));
        assert!(ShutdownStrategy::None.should_execute(true));

        // Stopping spares only the exit handler subtree
        assert!(ShutdownStrategy::Stopping.should_execute(true));
        assert!(!ShutdownStrategy::Stopping.should_execute(false));

        assert!(!ShutdownStrategy::Terminating.should_execute(true));
        assert!(!ShutdownStrategy::Terminating.should_execute(false));
    }

    #[test]
    fn test_resources_duration_add() {
        let mut total = ResourcesDuration::new();
        total.add(&[("cpu".to_string(), 3)].into_iter().collect());
        total.add(
            &[("cpu".to_string(), 2), ("memory".to_string(), 7)]
                .into_iter()
                .collect(),
        );

        assert_eq!(total.0.get("cpu"), Some(&5));
        assert_eq!(total.0.get("memory"), Some(&7));
    }

    #[test]
    fn test_task_result_tokens() {
        for result in [
            TaskResult::Succeeded,
            TaskResult::Failed,
            TaskResult::Errored,
            TaskResult::Skipped,
            TaskResult::Completed,
            TaskResult::Daemoned,
        ] {
            assert_eq!(TaskResult::from_token(result.as_str()), Some(result));
        }
        assert_eq!(TaskResult::from_token("Bogus"), None);
    }
}
