//! The addon ordering graph.
//!
//! A node is an addon name; an edge `A → B` means "B must load before A".
//! Hard edges come from `depends`, soft edges from `softDepends`. A missing
//! hard dependency is fatal; a missing soft dependency is ignored. The
//! resulting order is deterministic: ready nodes are taken in manifest
//! discovery order, then by lexicographic name.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::AddonError;

/// Graph input for one addon.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    pub depends: Vec<String>,
    pub soft_depends: Vec<String>,
    pub discovery_index: usize,
}

/// Compute the topological load order, returned as indexes into `nodes`.
pub fn load_order(nodes: &[GraphNode]) -> Result<Vec<usize>, AddonError> {
    // Case-insensitive name → node index.
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        by_name.insert(node.name.to_lowercase(), idx);
    }

    // dependents[b] holds every node that must wait for b.
    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();

    for (idx, node) in nodes.iter().enumerate() {
        for (dependency, hard) in node
            .depends
            .iter()
            .map(|d| (d, true))
            .chain(node.soft_depends.iter().map(|d| (d, false)))
        {
            if dependency.eq_ignore_ascii_case(&node.name) {
                return Err(AddonError::SelfDependency(node.name.clone()));
            }
            match by_name.get(&dependency.to_lowercase()) {
                Some(&dep_idx) => {
                    if seen_edges.insert((dep_idx, idx)) {
                        dependents[dep_idx].push(idx);
                        in_degree[idx] += 1;
                    }
                }
                None if hard => {
                    return Err(AddonError::RequiredDependencyMissing {
                        addon: node.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                None => {
                    debug!(
                        addon = node.name,
                        dependency, "soft dependency not present, ignored"
                    );
                }
            }
        }
    }

    // Kahn's algorithm with a deterministically ordered ready set.
    let mut ready: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while !ready.is_empty() {
        ready.sort_by(|&a, &b| {
            nodes[a]
                .discovery_index
                .cmp(&nodes[b].discovery_index)
                .then_with(|| nodes[a].name.to_lowercase().cmp(&nodes[b].name.to_lowercase()))
        });
        let next = ready.remove(0);
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck: Vec<String> = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].name.clone())
            .collect();
        return Err(AddonError::DependencyCycle(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, depends: &[&str], soft: &[&str], idx: usize) -> GraphNode {
        GraphNode {
            name: name.to_string(),
            depends: depends.iter().map(|s| s.to_string()).collect(),
            soft_depends: soft.iter().map(|s| s.to_string()).collect(),
            discovery_index: idx,
        }
    }

    fn names(nodes: &[GraphNode], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| nodes[i].name.clone()).collect()
    }

    #[test]
    fn hard_dependency_loads_first() {
        let nodes = vec![node("A", &["B"], &[], 0), node("B", &[], &[], 1)];
        let order = load_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["B", "A"]);
    }

    #[test]
    fn soft_dependency_orders_but_never_fails() {
        let nodes = vec![node("A", &[], &["B"], 0), node("B", &[], &[], 1)];
        let order = load_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["B", "A"]);

        let alone = vec![node("A", &[], &["Ghost"], 0)];
        assert_eq!(load_order(&alone).unwrap(), [0]);
    }

    #[test]
    fn missing_hard_dependency_is_fatal() {
        let nodes = vec![node("A", &["Z"], &[], 0)];
        match load_order(&nodes) {
            Err(AddonError::RequiredDependencyMissing { addon, dependency }) => {
                assert_eq!(addon, "A");
                assert_eq!(dependency, "Z");
            }
            other => panic!("expected missing dependency, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_rejected() {
        let nodes = vec![node("A", &["a"], &[], 0)];
        assert!(matches!(
            load_order(&nodes),
            Err(AddonError::SelfDependency(_))
        ));
    }

    #[test]
    fn cycles_are_rejected_with_their_members() {
        let nodes = vec![
            node("A", &["B"], &[], 0),
            node("B", &["A"], &[], 1),
            node("C", &[], &[], 2),
        ];
        match load_order(&nodes) {
            Err(AddonError::DependencyCycle(members)) => {
                assert!(members.contains(&"A".to_string()));
                assert!(members.contains(&"B".to_string()));
                assert!(!members.contains(&"C".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn ties_break_by_discovery_order_then_name() {
        let nodes = vec![
            node("Zeta", &[], &[], 1),
            node("Alpha", &[], &[], 0),
            node("Beta", &[], &[], 0),
        ];
        let order = load_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["Alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn dependency_names_match_case_insensitively() {
        let nodes = vec![node("A", &["base"], &[], 0), node("Base", &[], &[], 1)];
        let order = load_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["Base", "A"]);
    }
}
