use crate::types::{NodeType, ResourcesDuration, Workflow};
use std::collections::HashMap;

/// Recompute `resources_duration` for every node and the workflow-level
/// total in one pass.
///
/// Pod nodes are the authoritative leaves of this computation: their
/// durations come from pod telemetry and are never touched here, whatever
/// children they carry for other purposes. Every other node becomes the
/// elementwise sum of its children, resolved children-first, so a
/// descendant shared between several parents is summed from the same
/// settled value each time. Recomputing is a pure function of each node's
/// own children, which makes the whole pass idempotent.
pub fn update_resource_durations(workflow: &mut Workflow) {
    let mut resolved: HashMap<String, ResourcesDuration> = HashMap::new();

    let node_ids: Vec<String> = workflow.nodes.keys().cloned().collect();
    for node_id in &node_ids {
        resolve(node_id, workflow, &mut resolved);
    }

    for (node_id, duration) in resolved {
        if let Some(node) = workflow.nodes.get_mut(&node_id) {
            node.resources_duration = duration;
        }
    }

    workflow.resources_duration = workflow
        .nodes
        .get(&workflow.root_node_id)
        .map(|root| root.resources_duration.clone())
        .unwrap_or_default();
}

fn resolve(
    node_id: &str,
    workflow: &Workflow,
    resolved: &mut HashMap<String, ResourcesDuration>,
) -> ResourcesDuration {
    if let Some(duration) = resolved.get(node_id) {
        return duration.clone();
    }

    let Some(node) = workflow.nodes.get(node_id) else {
        // Dangling child reference; contributes nothing
        return ResourcesDuration::new();
    };

    let duration = if node.node_type == NodeType::Pod {
        node.resources_duration.clone()
    } else {
        let mut total = ResourcesDuration::new();
        for child_id in &node.children {
            let child_duration = resolve(child_id, workflow, resolved);
            total.add(&child_duration);
        }
        total
    };

    resolved.insert(node_id.to_string(), duration.clone());
    duration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeStatus, NodeType};

    fn duration(pairs: &[(&str, i64)]) -> ResourcesDuration {
        pairs
            .iter()
            .map(|(resource, count)| (resource.to_string(), *count))
            .collect()
    }

    fn container_node(id: &str, children: &[&str]) -> NodeStatus {
        NodeStatus {
            children: children.iter().map(|c| c.to_string()).collect(),
            ..NodeStatus::new(id, NodeType::Dag)
        }
    }

    fn pod_node(id: &str, own: &[(&str, i64)], children: &[&str]) -> NodeStatus {
        NodeStatus {
            children: children.iter().map(|c| c.to_string()).collect(),
            resources_duration: duration(own),
            ..NodeStatus::new(id, NodeType::Pod)
        }
    }

    fn fixture() -> Workflow {
        // root -> [pod, dag]; pod also routes through dag, so dag-pod is a
        // shared descendant
        let mut workflow = Workflow::new("root", "default");
        for node in [
            container_node("root", &["pod", "dag"]),
            pod_node("pod", &[("x", 1)], &["dag"]),
            container_node("dag", &["dag-pod"]),
            pod_node("dag-pod", &[("x", 2)], &[]),
        ] {
            workflow.nodes.insert(node.id.clone(), node);
        }
        workflow
    }

    #[test]
    fn test_aggregates_bottom_up_with_pod_leaves_untouched() {
        let mut workflow = fixture();

        update_resource_durations(&mut workflow);

        let get = |id: &str| workflow.nodes[id].resources_duration.clone();
        assert_eq!(get("dag-pod"), duration(&[("x", 2)]));
        assert_eq!(get("dag"), duration(&[("x", 2)]));
        // Pod durations are authoritative even when the pod has children
        assert_eq!(get("pod"), duration(&[("x", 1)]));
        assert_eq!(get("root"), duration(&[("x", 3)]));
        assert_eq!(workflow.resources_duration, duration(&[("x", 3)]));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let mut workflow = fixture();

        update_resource_durations(&mut workflow);
        let first: Vec<_> = {
            let mut snapshot: Vec<_> = workflow
                .nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.resources_duration.clone()))
                .collect();
            snapshot.sort_by(|a, b| a.0.cmp(&b.0));
            snapshot
        };

        update_resource_durations(&mut workflow);
        let mut second: Vec<_> = workflow
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.resources_duration.clone()))
            .collect();
        second.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(first, second);
        assert_eq!(workflow.resources_duration, duration(&[("x", 3)]));
    }

    #[test]
    fn test_multiple_resource_names_sum_elementwise() {
        let mut workflow = Workflow::new("root", "default");
        for node in [
            container_node("root", &["a", "b"]),
            pod_node("a", &[("cpu", 4), ("memory", 10)], &[]),
            pod_node("b", &[("cpu", 6)], &[]),
        ] {
            workflow.nodes.insert(node.id.clone(), node);
        }

        update_resource_durations(&mut workflow);

        assert_eq!(
            workflow.resources_duration,
            duration(&[("cpu", 10), ("memory", 10)])
        );
    }
}
