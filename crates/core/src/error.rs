use thiserror::Error;

/// Validation failures raised while resolving a DAG template. These
/// indicate a malformed template and block admission; they are never
/// retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("task result '{result}' for task '{task}' is invalid")]
    InvalidTaskResult { task: String, result: String },

    #[error("task '{task}' depends on unknown task '{depends_on}'")]
    UnknownTask { task: String, depends_on: String },

    #[error("tasks form a dependency cycle")]
    DependencyCycle,
}
