use super::Tree;
use crate::libs::phylo::node::{Node, NodeId};

/// Node ids from the root down to `id`, both included.
pub fn get_path_from_root(tree: &Tree, id: &NodeId) -> Result<Vec<NodeId>, String> {
    let mut current = *id;
    if tree.get_node(current).is_none() {
        return Err(format!("Node {} not found", current));
    }

    let mut path = vec![current];
    while let Some(p) = tree.nodes[current].parent {
        if path.len() > tree.nodes.len() {
            return Err("Cycle detected on the path to the root".to_string());
        }
        path.push(p);
        current = p;
    }
    path.reverse();

    if tree.root != Some(path[0]) {
        return Err(format!("Node {} is detached from the root", id));
    }

    Ok(path)
}

/// Lowest common ancestor of two nodes.
pub fn get_common_ancestor(tree: &Tree, a: &NodeId, b: &NodeId) -> Result<NodeId, String> {
    let path_a = get_path_from_root(tree, a)?;
    let path_b = get_path_from_root(tree, b)?;

    path_a
        .iter()
        .zip(path_b.iter())
        .take_while(|(u, v)| u == v)
        .last()
        .map(|(u, _)| *u)
        .ok_or_else(|| "Nodes have no common ancestor".to_string())
}

/// Distance between two nodes as (sum of edge lengths, number of edges).
/// Missing lengths count as 0.
pub fn get_distance(tree: &Tree, a: &NodeId, b: &NodeId) -> Result<(f64, usize), String> {
    let lca = get_common_ancestor(tree, a, b)?;

    let up_to_lca = |start: NodeId| -> (f64, usize) {
        let mut weighted = 0.0;
        let mut topo = 0;
        let mut curr = start;
        while curr != lca {
            let node = &tree.nodes[curr];
            weighted += node.length.unwrap_or(0.0);
            topo += 1;
            match node.parent {
                Some(p) => curr = p,
                None => break,
            }
        }
        (weighted, topo)
    };

    let (w1, t1) = up_to_lca(*a);
    let (w2, t2) = up_to_lca(*b);

    Ok((w1 + w2, t1 + t2))
}

pub fn find_nodes<F>(tree: &Tree, predicate: F) -> Vec<NodeId>
where
    F: Fn(&Node) -> bool,
{
    tree.nodes
        .iter()
        .filter(|n| !n.deleted && predicate(n))
        .map(|n| n.id)
        .collect()
}

/// First leaf named `name`.
pub fn get_leaf_by_name(tree: &Tree, name: &str) -> Option<NodeId> {
    tree.nodes
        .iter()
        .find(|n| !n.deleted && n.is_leaf() && n.name.as_deref() == Some(name))
        .map(|n| n.id)
}
