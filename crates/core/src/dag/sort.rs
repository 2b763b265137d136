use super::context::DagContext;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Bucket every task reachable from `leaf_tasks` into execution levels such
/// that each task's dependencies land in an earlier level than the task
/// itself. Level 0 holds the tasks with no unresolved dependencies among
/// those visited; the final level is the original leaf set. Ties within a
/// level are unordered.
pub fn topological_sort(leaf_tasks: &[String], ctx: &dyn DagContext) -> Vec<Vec<String>> {
    let mut levels: HashMap<String, usize> = HashMap::new();
    let mut max_level = 0;

    for task_name in leaf_tasks {
        visit(task_name, 0, ctx, &mut levels, &mut max_level);
    }

    let mut sorted: Vec<Vec<String>> = vec![Vec::new(); max_level + 1];
    for (task_name, level) in levels {
        sorted[max_level - level].push(task_name);
    }
    sorted
}

fn visit(
    task_name: &str,
    level: usize,
    ctx: &dyn DagContext,
    levels: &mut HashMap<String, usize>,
    max_level: &mut usize,
) {
    if level > *max_level {
        *max_level = level;
    }

    if let Some(&prev_level) = levels.get(task_name) {
        // A task reachable via both a long and a short path keeps the
        // longer distance
        if level > prev_level {
            levels.insert(task_name.to_string(), level);
        }
        return;
    }

    for dependency in ctx.get_task_dependencies(task_name) {
        visit(&dependency, level + 1, ctx, levels, max_level);
    }

    levels.insert(task_name.to_string(), level);
}

/// All transitive dependencies of `task_name` (excluding the task itself),
/// ordered by ascending task finish time.
pub fn get_task_ancestry(ctx: &dyn DagContext, task_name: &str) -> Vec<String> {
    let mut visited: HashMap<String, DateTime<Utc>> = HashMap::new();
    collect_ancestors(task_name, task_name, ctx, &mut visited);

    let mut ancestry = vec![String::new(); visited.len()];
    for (ancestor, finished_at) in &visited {
        insert_task(&visited, &mut ancestry, ancestor, *finished_at);
    }
    ancestry
}

fn collect_ancestors(
    current: &str,
    target: &str,
    ctx: &dyn DagContext,
    visited: &mut HashMap<String, DateTime<Utc>>,
) {
    if visited.contains_key(current) {
        return;
    }
    for dependency in ctx.get_task_dependencies(current) {
        collect_ancestors(&dependency, target, ctx, visited);
    }
    if current != target {
        visited.insert(current.to_string(), ctx.get_task_finished_at(current));
    }
}

// Stable insertion into the first empty slot or before the first entry with
// a later finish time, shifting the tail right. O(n^2) over ancestor count,
// acceptable for typical DAG fan-in.
fn insert_task(
    visited: &HashMap<String, DateTime<Utc>>,
    ancestry: &mut [String],
    new_task: &str,
    finished_at: DateTime<Utc>,
) {
    for i in 0..ancestry.len() {
        if ancestry[i].is_empty() {
            ancestry[i] = new_task.to_string();
            return;
        }
        if finished_at < visited[ancestry[i].as_str()] {
            for j in (i + 1..ancestry.len()).rev() {
                ancestry[j] = ancestry[j - 1].clone();
            }
            ancestry[i] = new_task.to_string();
            return;
        }
    }
}
