use super::context::DagContext;
use super::depends::{get_task_depends, validate_task_results};
use crate::error::DagError;
use crate::types::DagTask;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Executable precedence graph over a DAG template's tasks.
///
/// Built at admission time: every `depends` expression is resolved through
/// the expression engine and materialized as edges, rejecting unresolved
/// task references and cycles before anything is scheduled.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    task_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_tasks(tasks: &[DagTask], ctx: &dyn DagContext) -> Result<Self, DagError> {
        let mut graph = DiGraph::new();
        let mut task_indices = HashMap::new();

        for task in tasks {
            let index = graph.add_node(task.name.clone());
            task_indices.insert(task.name.clone(), index);
        }

        for task in tasks {
            validate_task_results(task)?;
            let task_index = task_indices[&task.name];
            let (references, _) = get_task_depends(task, ctx);
            for dependency in references {
                let dep_index =
                    task_indices
                        .get(&dependency)
                        .ok_or_else(|| DagError::UnknownTask {
                            task: task.name.clone(),
                            depends_on: dependency.clone(),
                        })?;
                // Edge from dependency to dependent
                graph.add_edge(*dep_index, task_index, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(DagError::DependencyCycle);
        }

        tracing::debug!("Built precedence graph over {} tasks", tasks.len());
        Ok(Self {
            graph,
            task_indices,
        })
    }

    /// Tasks with no dependencies; schedulable immediately
    pub fn entry_tasks(&self) -> Vec<String> {
        self.tasks_where(petgraph::Direction::Incoming)
    }

    /// Terminal tasks with no dependents; the leaf set handed to the
    /// topological scheduler
    pub fn leaf_tasks(&self) -> Vec<String> {
        self.tasks_where(petgraph::Direction::Outgoing)
    }

    /// Names of the tasks `task_name` directly depends on
    pub fn dependencies(&self, task_name: &str) -> Vec<String> {
        let Some(&index) = self.task_indices.get(task_name) else {
            return Vec::new();
        };
        let mut dependencies: Vec<String> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|neighbor| self.graph[neighbor].clone())
            .collect();
        dependencies.sort();
        dependencies
    }

    fn tasks_where(&self, empty_direction: petgraph::Direction) -> Vec<String> {
        let mut tasks: Vec<String> = self
            .graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, empty_direction)
                    .count()
                    == 0
            })
            .map(|index| self.graph[index].clone())
            .collect();
        tasks.sort();
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::context::TaskGroup;

    fn task(name: &str, depends: Option<&str>) -> DagTask {
        DagTask {
            depends: depends.map(|d| d.to_string()),
            ..DagTask::new(name)
        }
    }

    #[test]
    fn test_entry_and_leaf_tasks() {
        let tasks = vec![
            task("A", None),
            task("B", None),
            task("C", Some("A && B")),
            task("D", Some("C.Succeeded")),
        ];
        let ctx = TaskGroup::new(tasks.clone());

        let graph = DependencyGraph::from_tasks(&tasks, &ctx).unwrap();

        assert_eq!(graph.entry_tasks(), ["A", "B"]);
        assert_eq!(graph.leaf_tasks(), ["D"]);
        assert_eq!(graph.dependencies("C"), ["A", "B"]);
    }

    #[test]
    fn test_unresolved_reference_is_a_validation_error() {
        let tasks = vec![task("A", None), task("B", Some("A && ghost"))];
        let ctx = TaskGroup::new(tasks.clone());

        let err = DependencyGraph::from_tasks(&tasks, &ctx).unwrap_err();

        assert_eq!(
            err,
            DagError::UnknownTask {
                task: "B".to_string(),
                depends_on: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let tasks = vec![task("A", Some("B.Succeeded")), task("B", Some("A.Succeeded"))];
        let ctx = TaskGroup::new(tasks.clone());

        let err = DependencyGraph::from_tasks(&tasks, &ctx).unwrap_err();

        assert_eq!(err, DagError::DependencyCycle);
    }

    #[test]
    fn test_invalid_result_token_is_rejected_at_admission() {
        let tasks = vec![task("A", None), task("B", Some("A.Whatever"))];
        let ctx = TaskGroup::new(tasks.clone());

        assert!(matches!(
            DependencyGraph::from_tasks(&tasks, &ctx),
            Err(DagError::InvalidTaskResult { .. })
        ));
    }
}
