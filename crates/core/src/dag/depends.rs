use super::context::DagContext;
use crate::error::DagError;
use crate::types::{DagTask, TaskResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// A reference is either a dotted `taskName.Result` or a bare `taskName`.
// The dotted branch is tried first so a bare match never swallows half of a
// dotted one.
static TASK_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z0-9][-a-zA-Z0-9]*?\.[A-Z][a-z]+)|([a-zA-Z0-9][-a-zA-Z0-9]*)")
        .expect("task reference pattern is valid")
});

static TASK_RESULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-zA-Z0-9][-a-zA-Z0-9]*?\.[A-Z][a-z]+)").expect("task result pattern is valid")
});

/// Resolve a task's depends logic into (a) the set of directly referenced
/// task names, i.e. the DAG edge list, and (b) the fully expanded boolean
/// expression evaluated at runtime against actual task results.
///
/// Bare references are shorthand for the referenced task's default
/// continue-eligible outcomes and are rewritten into the parenthesized
/// disjunction derived from that task's current `continueOn` flags. The
/// rewrite works token-by-token in a single forward pass; text between
/// references is preserved verbatim.
pub fn get_task_depends(task: &DagTask, ctx: &dyn DagContext) -> (HashSet<String>, String) {
    let depends = task_depends_logic(task, ctx);

    let mut references = HashSet::new();
    let mut expanded = String::with_capacity(depends.len());
    let mut last = 0;

    for captures in TASK_REF_RE.captures_iter(&depends) {
        if let Some(dotted) = captures.get(1) {
            let (task_name, _) = dotted
                .as_str()
                .split_once('.')
                .unwrap_or((dotted.as_str(), ""));
            references.insert(task_name.to_string());
        } else if let Some(bare) = captures.get(2) {
            let task_name = bare.as_str();
            references.insert(task_name.to_string());
            expanded.push_str(&depends[last..bare.start()]);
            expanded.push_str(&expand_dependency(task_name, ctx.get_task(task_name)));
            last = bare.end();
        }
    }
    expanded.push_str(&depends[last..]);

    (references, expanded)
}

/// Check that every `task.Result` reference in the task's `depends`
/// expression names a known task result. An empty `depends` is trivially
/// valid.
pub fn validate_task_results(task: &DagTask) -> Result<(), DagError> {
    let Some(depends) = task.depends.as_deref() else {
        return Ok(());
    };

    for captures in TASK_RESULT_RE.captures_iter(depends) {
        let Some(dotted) = captures.get(1) else {
            continue;
        };
        let (task_name, result) = dotted
            .as_str()
            .split_once('.')
            .unwrap_or((dotted.as_str(), ""));
        if TaskResult::from_token(result).is_none() {
            return Err(DagError::InvalidTaskResult {
                task: task_name.to_string(),
                result: result.to_string(),
            });
        }
    }
    Ok(())
}

fn task_depends_logic(task: &DagTask, ctx: &dyn DagContext) -> String {
    if let Some(depends) = task.depends.as_deref() {
        if !depends.is_empty() {
            return depends.to_string();
        }
    }

    // "dependencies: [A, B]" is equivalent to
    // "(A.Succeeded || A.Skipped || A.Daemoned) && (B.Succeeded || B.Skipped || B.Daemoned)"
    task.dependencies
        .iter()
        .map(|dependency| expand_dependency(dependency, ctx.get_task(dependency)))
        .collect::<Vec<_>>()
        .join(" && ")
}

fn expand_dependency(dep_name: &str, dep_task: Option<&DagTask>) -> String {
    let result_for = |result: TaskResult| format!("{dep_name}.{result}");

    let mut terms = vec![
        result_for(TaskResult::Succeeded),
        result_for(TaskResult::Skipped),
        result_for(TaskResult::Daemoned),
    ];
    if let Some(continue_on) = dep_task.and_then(|task| task.continue_on) {
        if continue_on.error {
            terms.push(result_for(TaskResult::Errored));
        }
        if continue_on.failed {
            terms.push(result_for(TaskResult::Failed));
        }
    }
    format!("({})", terms.join(" || "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::context::TaskGroup;
    use crate::types::ContinueOn;

    fn task_with_dependencies(name: &str, dependencies: &[&str]) -> DagTask {
        DagTask {
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            ..DagTask::new(name)
        }
    }

    fn task_with_depends(name: &str, depends: &str) -> DagTask {
        DagTask {
            depends: Some(depends.to_string()),
            ..DagTask::new(name)
        }
    }

    #[test]
    fn test_legacy_dependencies_expand() {
        let ctx = TaskGroup::new([DagTask::new("A"), DagTask::new("B")]);
        let task = task_with_dependencies("C", &["A", "B"]);

        let (references, expanded) = get_task_depends(&task, &ctx);

        assert_eq!(
            expanded,
            "(A.Succeeded || A.Skipped || A.Daemoned) && (B.Succeeded || B.Skipped || B.Daemoned)"
        );
        let mut names: Vec<&str> = references.iter().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_continue_on_extends_only_the_affected_dependency() {
        let ctx = TaskGroup::new([
            DagTask {
                continue_on: Some(ContinueOn {
                    error: true,
                    failed: false,
                }),
                ..DagTask::new("A")
            },
            DagTask {
                continue_on: Some(ContinueOn {
                    error: false,
                    failed: true,
                }),
                ..DagTask::new("B")
            },
        ]);
        let task = task_with_dependencies("C", &["A", "B"]);

        let (_, expanded) = get_task_depends(&task, &ctx);

        assert_eq!(
            expanded,
            "(A.Succeeded || A.Skipped || A.Daemoned || A.Errored) && (B.Succeeded || B.Skipped || B.Daemoned || B.Failed)"
        );
    }

    #[test]
    fn test_bare_reference_expands_from_current_flags() {
        let ctx = TaskGroup::new([DagTask {
            continue_on: Some(ContinueOn {
                error: true,
                failed: true,
            }),
            ..DagTask::new("A")
        }]);
        let task = task_with_depends("B", "A");

        let (_, expanded) = get_task_depends(&task, &ctx);

        assert_eq!(
            expanded,
            "(A.Succeeded || A.Skipped || A.Daemoned || A.Errored || A.Failed)"
        );
    }

    #[test]
    fn test_bare_and_dotted_references_mix() {
        let ctx = TaskGroup::new([DagTask::new("A"), DagTask::new("B"), DagTask::new("C")]);
        let task = task_with_depends("D", "(A.Succeeded || B) && !C.Failed");

        let (references, expanded) = get_task_depends(&task, &ctx);

        assert_eq!(
            expanded,
            "(A.Succeeded || (B.Succeeded || B.Skipped || B.Daemoned)) && !C.Failed"
        );
        let mut names: Vec<&str> = references.iter().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_repeated_references_deduplicate() {
        let ctx = TaskGroup::new([DagTask::new("A")]);
        let task = task_with_depends("B", "A.Succeeded || A.Failed || A.Errored");

        let (references, _) = get_task_depends(&task, &ctx);

        assert_eq!(references.len(), 1);
        assert!(references.contains("A"));
    }

    #[test]
    fn test_legacy_list_and_bare_depends_agree() {
        let ctx = TaskGroup::new([DagTask::new("A")]);

        let (_, from_list) = get_task_depends(&task_with_dependencies("B", &["A"]), &ctx);
        let (_, from_bare) = get_task_depends(&task_with_depends("B", "A"), &ctx);

        assert_eq!(from_list, from_bare);
    }

    #[test]
    fn test_empty_depends_is_trivially_valid() {
        assert_eq!(validate_task_results(&DagTask::new("A")), Ok(()));

        let (references, expanded) = get_task_depends(&DagTask::new("A"), &TaskGroup::default());
        assert!(references.is_empty());
        assert_eq!(expanded, "");
    }

    #[test]
    fn test_validate_task_results_rejects_unknown_result() {
        let task = task_with_depends("B", "A.Bogus");

        let err = validate_task_results(&task).unwrap_err();

        assert_eq!(
            err,
            DagError::InvalidTaskResult {
                task: "A".to_string(),
                result: "Bogus".to_string(),
            }
        );
        assert!(err.to_string().contains("A"));
        assert!(err.to_string().contains("Bogus"));
    }

    #[test]
    fn test_validate_task_results_accepts_all_known_results() {
        let task = task_with_depends(
            "B",
            "A.Succeeded || A.Failed || A.Skipped || A.Completed || A.Errored || A.Daemoned",
        );
        assert_eq!(validate_task_results(&task), Ok(()));
    }
}
