use super::Tree;
use crate::libs::phylo::error::TreeError;
use crate::libs::phylo::node::NodeId;
use std::io::Read;

/// Read every tree of a Newick file, `stdin` included.
pub fn from_file(infile: &str) -> Result<Vec<Tree>, TreeError> {
    let mut reader = crate::libs::io::reader(infile)
        .map_err(|e| TreeError::LogicError(format!("cannot open {}: {}", infile, e)))?;
    let mut newick = String::new();
    reader
        .read_to_string(&mut newick)
        .map_err(|e| TreeError::LogicError(format!("cannot read {}: {}", infile, e)))?;
    Tree::from_newick_multi(&newick)
}

/// Compact Newick; unnamed internal nodes show their support.
pub fn to_newick(tree: &Tree) -> String {
    write_tree(tree, "", true)
}

/// Compact Newick without support values.
pub fn to_newick_plain(tree: &Tree) -> String {
    write_tree(tree, "", false)
}

/// Indented Newick, one node per line. An empty `indent` gives the compact form.
pub fn to_newick_with_format(tree: &Tree, indent: &str) -> String {
    write_tree(tree, indent, true)
}

fn write_tree(tree: &Tree, indent: &str, with_support: bool) -> String {
    let mut s = match tree.get_root() {
        Some(root) => write_node(tree, root, indent, with_support, 0),
        None => String::new(),
    };
    s.push(';');
    s
}

fn write_node(tree: &Tree, id: NodeId, indent: &str, with_support: bool, depth: usize) -> String {
    let node = &tree.nodes[id];
    let pretty = !indent.is_empty();
    let my_indent = indent.repeat(depth);

    let mut info = String::new();
    match (&node.name, node.support) {
        (Some(name), _) => info.push_str(&quote_label(name)),
        (None, Some(support)) if with_support && !node.is_leaf() => {
            info.push_str(&support.to_string())
        }
        _ => {}
    }
    if let Some(len) = node.length {
        info.push_str(&format!(":{}", len));
    }

    if node.children.is_empty() {
        return format!("{}{}", my_indent, info);
    }

    let children: Vec<String> = node
        .children
        .iter()
        .map(|&child| write_node(tree, child, indent, with_support, depth + 1))
        .collect();

    if pretty {
        format!(
            "{}(\n{}\n{}){}",
            my_indent,
            children.join(",\n"),
            my_indent,
            info
        )
    } else {
        format!("({}){}", children.join(","), info)
    }
}

/// Quote labels holding Newick punctuation or blanks.
pub fn quote_label(label: &str) -> String {
    if label.chars().any(|c| "(),:;[]'\" \t\n".contains(c)) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
