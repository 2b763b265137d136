use super::depends;
use crate::types::DagTask;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Read-only view of a DAG template's tasks consumed by the scheduling and
/// ancestry algorithms. Concrete implementations are adapters over whatever
/// live state store the surrounding controller uses.
pub trait DagContext {
    fn get_task(&self, task_name: &str) -> Option<&DagTask>;

    /// Names of the tasks `task_name` directly depends on, resolved from
    /// its `depends` expression (or legacy dependency list)
    fn get_task_dependencies(&self, task_name: &str) -> Vec<String>;

    fn get_task_finished_at(&self, task_name: &str) -> DateTime<Utc>;
}

/// In-memory `DagContext` over a template's task list plus recorded task
/// finish times
#[derive(Debug, Clone, Default)]
pub struct TaskGroup {
    tasks: HashMap<String, DagTask>,
    finished_at: HashMap<String, DateTime<Utc>>,
}

impl TaskGroup {
    pub fn new(tasks: impl IntoIterator<Item = DagTask>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|task| (task.name.clone(), task))
                .collect(),
            finished_at: HashMap::new(),
        }
    }

    pub fn with_finished_at(mut self, task_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.finished_at.insert(task_name.into(), at);
        self
    }

    pub fn tasks(&self) -> impl Iterator<Item = &DagTask> {
        self.tasks.values()
    }
}

impl DagContext for TaskGroup {
    fn get_task(&self, task_name: &str) -> Option<&DagTask> {
        self.tasks.get(task_name)
    }

    fn get_task_dependencies(&self, task_name: &str) -> Vec<String> {
        let Some(task) = self.get_task(task_name) else {
            return Vec::new();
        };
        let (references, _) = depends::get_task_depends(task, self);
        // Deterministic edge order keeps traversal reproducible
        let mut dependencies: Vec<String> = references.into_iter().collect();
        dependencies.sort();
        dependencies
    }

    fn get_task_finished_at(&self, task_name: &str) -> DateTime<Utc> {
        self.finished_at
            .get(task_name)
            .copied()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
