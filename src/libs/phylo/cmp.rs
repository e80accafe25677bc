use super::tree::Tree;
use fixedbitset::FixedBitSet;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Topology comparison between trees over the same leaf set.
pub trait TreeComparison {
    /// Non-trivial splits of the tree, as leaf bitsets indexed by `leaf_map`.
    ///
    /// Each split is normalized to the side holding leaf 0, so rooted and
    /// unrooted forms of a tree yield the same set.
    fn get_splits(&self, leaf_map: &BTreeMap<String, usize>) -> HashSet<FixedBitSet>;

    /// Unrooted Robinson-Foulds distance, `|S1 \ S2| + |S2 \ S1|`.
    ///
    /// ```
    /// use wintree::libs::phylo::{Tree, TreeComparison};
    /// let t1 = Tree::from_newick("((A,B),(C,D));").unwrap();
    /// let t2 = Tree::from_newick("((A,C),(B,D));").unwrap();
    /// assert_eq!(t1.robinson_foulds(&t2).unwrap(), 2);
    /// ```
    fn robinson_foulds(&self, other: &Self) -> Result<usize, String>;
}

impl TreeComparison for Tree {
    fn get_splits(&self, leaf_map: &BTreeMap<String, usize>) -> HashSet<FixedBitSet> {
        let mut splits = HashSet::new();
        let num_leaves = leaf_map.len();

        let root_id = match self.get_root() {
            Some(id) => id,
            None => return splits,
        };

        let mut node_leaves: HashMap<usize, FixedBitSet> = HashMap::new();
        for node_id in super::tree::traversal::postorder(self, root_id) {
            let node = &self.nodes[node_id];
            let mut bitset = FixedBitSet::with_capacity(num_leaves);

            if node.is_leaf() {
                if let Some(&idx) = node.name.as_ref().and_then(|name| leaf_map.get(name)) {
                    bitset.insert(idx);
                }
            } else {
                for child in &node.children {
                    if let Some(child_bs) = node_leaves.get(child) {
                        bitset.union_with(child_bs);
                    }
                }
            }

            let mut normalized = bitset.clone();
            if num_leaves > 0 && !normalized.contains(0) {
                normalized.toggle_range(..num_leaves);
            }

            // Single leaves, their complements and the full set
            let count = normalized.count_ones(..);
            let is_trivial = count <= 1 || count + 1 >= num_leaves;
            if !is_trivial {
                splits.insert(normalized);
            }

            node_leaves.insert(node_id, bitset);
        }

        splits
    }

    fn robinson_foulds(&self, other: &Self) -> Result<usize, String> {
        let leaves_self: BTreeSet<String> = self.get_leaf_names().into_iter().flatten().collect();
        let leaves_other: BTreeSet<String> = other.get_leaf_names().into_iter().flatten().collect();

        if leaves_self != leaves_other {
            let only1: Vec<_> = leaves_self.difference(&leaves_other).collect();
            let only2: Vec<_> = leaves_other.difference(&leaves_self).collect();
            return Err(format!(
                "trees have different leaf sets, only in the first: {:?}, only in the second: {:?}",
                only1, only2
            ));
        }

        if leaves_self.is_empty() {
            return Ok(0);
        }

        let leaf_map: BTreeMap<String, usize> = leaves_self
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();

        let splits_self = self.get_splits(&leaf_map);
        let splits_other = other.get_splits(&leaf_map);
        let shared = splits_self.intersection(&splits_other).count();

        Ok(splits_self.len() + splits_other.len() - 2 * shared)
    }
}
