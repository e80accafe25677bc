use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;

/// Link `child_id` under `parent_id`. The child must be detached.
pub fn add_child(tree: &mut Tree, parent_id: NodeId, child_id: NodeId) -> Result<(), String> {
    if parent_id == child_id {
        return Err("Cannot add node as child of itself".to_string());
    }
    if tree.get_node(parent_id).is_none() {
        return Err(format!("Parent node {} not found or deleted", parent_id));
    }
    if tree.get_node(child_id).is_none() {
        return Err(format!("Child node {} not found or deleted", child_id));
    }
    if let Some(old_parent) = tree.nodes[child_id].parent {
        return Err(format!("Node {} already has parent {}", child_id, old_parent));
    }

    tree.nodes[child_id].parent = Some(parent_id);
    tree.nodes[parent_id].children.push(child_id);

    Ok(())
}

/// Splice out a non-root node, attaching its children to its parent.
///
/// Edge lengths are summed. An internal child without support inherits the
/// support of the removed edge.
pub fn collapse_node(tree: &mut Tree, id: NodeId) -> Result<(), String> {
    let node = tree.get_node(id).ok_or(format!("Node {} not found", id))?;
    let parent_id = node.parent.ok_or("Cannot collapse root node")?;
    let parent_edge = node.length;
    let parent_support = node.support;
    let children = node.children.clone();

    for &child_id in &children {
        if let Some(child) = tree.get_node_mut(child_id) {
            child.parent = Some(parent_id);
            child.length = match (parent_edge, child.length) {
                (Some(p), Some(c)) => Some(p + c),
                (p, c) => p.or(c),
            };
            if !child.children.is_empty() {
                child.support = child.support.or(parent_support);
            }
        }
    }

    if let Some(parent) = tree.get_node_mut(parent_id) {
        if let Some(pos) = parent.children.iter().position(|&x| x == id) {
            parent.children.splice(pos..pos + 1, children);
        }
    }

    if let Some(node) = tree.get_node_mut(id) {
        node.deleted = true;
        node.children.clear();
        node.parent = None;
    }

    Ok(())
}

/// Insert a node halfway along the edge above `id`.
/// Returns the new node's id.
pub fn insert_parent(tree: &mut Tree, id: NodeId) -> Result<NodeId, String> {
    let node = tree.get_node(id).ok_or(format!("Node {} not found", id))?;
    let parent = node.parent.ok_or("Node has no parent")?;
    let half = node.length.map(|l| l / 2.0);
    let support = node.support;

    let new_node = tree.add_node();
    add_child(tree, parent, new_node)?;
    if let Some(n) = tree.get_node_mut(new_node) {
        n.length = half;
        n.support = support;
    }

    // Keep the new node at the old child's position among its siblings
    if let Some(p_node) = tree.get_node_mut(parent) {
        p_node.children.pop();
        if let Some(pos) = p_node.children.iter().position(|&c| c == id) {
            p_node.children[pos] = new_node;
        }
    }
    if let Some(node) = tree.get_node_mut(id) {
        node.parent = None;
    }

    add_child(tree, new_node, id)?;
    if let Some(node) = tree.get_node_mut(id) {
        node.length = half;
    }

    Ok(new_node)
}

/// Remove every non-root node with exactly one child.
pub fn remove_degree_two_nodes(tree: &mut Tree) {
    while let Some(id) = tree
        .find_nodes(|n| n.parent.is_some() && n.children.len() == 1)
        .first()
        .cloned()
    {
        if collapse_node(tree, id).is_err() {
            break;
        }
    }
}

/// Make `new_root_id` the root by reversing the edges on its path from the
/// old root. Lengths and supports stay with their edges.
pub fn reroot_at(tree: &mut Tree, new_root_id: NodeId) -> Result<(), String> {
    if tree.get_node(new_root_id).is_none() {
        return Err(format!("Node {} not found", new_root_id));
    }

    let old_root_id = tree.root.ok_or("Tree has no root")?;
    if old_root_id == new_root_id {
        return Ok(());
    }

    let path = tree.get_path_from_root(&new_root_id)?;

    // path[i] carries the edge path[i-1] -> path[i]
    let edges: Vec<(Option<f64>, Option<f64>)> = path
        .iter()
        .map(|&id| (tree.nodes[id].length, tree.nodes[id].support))
        .collect();

    for i in (1..path.len()).rev() {
        let child_id = path[i];
        let parent_id = path[i - 1];
        let (length, support) = edges[i];

        tree.nodes[parent_id].children.retain(|&x| x != child_id);
        tree.nodes[child_id].children.push(parent_id);

        let parent = &mut tree.nodes[parent_id];
        parent.parent = Some(child_id);
        parent.length = length;
        parent.support = support;
    }

    let new_root = &mut tree.nodes[new_root_id];
    new_root.parent = None;
    new_root.length = None;
    new_root.support = None;
    tree.root = Some(new_root_id);

    Ok(())
}

/// Root the tree on the edge leading to the leaf `outgroup`.
///
/// The outgroup's edge is split in half and the new root placed at the
/// split, then degree-two nodes left behind by the old root are spliced out.
/// Distances between leaves are unchanged.
///
/// ```
/// use wintree::libs::phylo::Tree;
/// let mut tree = Tree::from_newick("((A:1,B:2):1,(C:3,D:4):1);").unwrap();
/// tree.reroot_at_outgroup("D").unwrap();
/// assert_eq!(tree.to_newick(), "(D:2,(C:3,(A:1,B:2):2):2);");
/// ```
pub fn reroot_at_outgroup(tree: &mut Tree, outgroup: &str) -> Result<(), TreeError> {
    let leaf = tree
        .get_leaf_by_name(outgroup)
        .ok_or_else(|| TreeError::MissingLeaf(outgroup.to_string()))?;

    if tree.get_node(leaf).and_then(|n| n.parent).is_none() {
        return Err(TreeError::LogicError(format!(
            "cannot reroot a tree whose only node is `{}`",
            outgroup
        )));
    }

    let new_root = insert_parent(tree, leaf)?;
    reroot_at(tree, new_root)?;
    remove_degree_two_nodes(tree);

    Ok(())
}
