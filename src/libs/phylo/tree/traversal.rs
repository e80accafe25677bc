use super::Tree;
use crate::libs::phylo::node::NodeId;

/// Parents before children, children in order.
pub fn preorder(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut stack = vec![start_node];

    while let Some(id) = stack.pop() {
        if let Some(node) = tree.get_node(id) {
            result.push(id);
            stack.extend(node.children.iter().rev());
        }
    }

    result
}

/// Children before parents.
pub fn postorder(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = preorder_mirrored(tree, start_node);
    result.reverse();
    result
}

// Root, then children right to left; reversed this is a postorder
fn preorder_mirrored(tree: &Tree, start_node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut stack = vec![start_node];

    while let Some(id) = stack.pop() {
        if let Some(node) = tree.get_node(id) {
            result.push(id);
            stack.extend(node.children.iter());
        }
    }

    result
}
