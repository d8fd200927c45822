//! Dependency graph checks for tempo.
//!
//! Dependencies (task -> task, milestone -> milestone) are stored as an
//! adjacency map keyed by entity id. Edges must keep the graph acyclic;
//! the check runs before the corresponding event is appended, so a cycle
//! never reaches the log.

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// DFS colors: white = unvisited, gray = on the current path, black = done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Whether the adjacency map contains a cycle.
pub fn has_cycle(adjacency: &BTreeMap<String, BTreeSet<String>>) -> bool {
    let mut colors: HashMap<&str, Color> = HashMap::new();
    for node in adjacency.keys() {
        if colors.get(node.as_str()).copied().unwrap_or(Color::White) == Color::White
            && visit(node, adjacency, &mut colors)
        {
            return true;
        }
    }
    false
}

fn visit<'a>(
    node: &'a str,
    adjacency: &'a BTreeMap<String, BTreeSet<String>>,
    colors: &mut HashMap<&'a str, Color>,
) -> bool {
    colors.insert(node, Color::Gray);
    if let Some(next) = adjacency.get(node) {
        for target in next {
            match colors.get(target.as_str()).copied().unwrap_or(Color::White) {
                Color::Gray => return true,
                Color::White => {
                    if visit(target, adjacency, colors) {
                        return true;
                    }
                }
                Color::Black => {}
            }
        }
    }
    colors.insert(node, Color::Black);
    false
}

/// Whether adding `from -> to` would close a cycle.
pub fn would_create_cycle(
    adjacency: &BTreeMap<String, BTreeSet<String>>,
    from: &str,
    to: &str,
) -> bool {
    if from == to {
        return true;
    }
    let mut candidate = adjacency.clone();
    candidate
        .entry(from.to_string())
        .or_default()
        .insert(to.to_string());
    has_cycle(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(edges: &[(&str, &str)]) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in edges {
            map.entry((*from).to_string())
                .or_default()
                .insert((*to).to_string());
        }
        map
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        assert!(!has_cycle(&BTreeMap::new()));
    }

    #[test]
    fn chain_is_acyclic() {
        let graph = adjacency(&[("t1", "t2"), ("t2", "t3")]);
        assert!(!has_cycle(&graph));
        assert!(!would_create_cycle(&graph, "t1", "t3"));
    }

    #[test]
    fn closing_edge_is_detected() {
        let graph = adjacency(&[("t1", "t2"), ("t2", "t3")]);
        assert!(would_create_cycle(&graph, "t3", "t1"));
    }

    #[test]
    fn self_edge_is_a_cycle() {
        assert!(would_create_cycle(&BTreeMap::new(), "t1", "t1"));
    }

    #[test]
    fn diamond_is_acyclic() {
        let graph = adjacency(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        assert!(!has_cycle(&graph));
        assert!(would_create_cycle(&graph, "d", "a"));
    }
}
