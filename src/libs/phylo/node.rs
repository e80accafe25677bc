/// Index into the tree's node arena.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,

    /// None for the root
    pub parent: Option<NodeId>,

    pub children: Vec<NodeId>,

    /// Sample name on leaves, optional clade label on internal nodes
    pub name: Option<String>,

    /// Length of the edge to the parent
    pub length: Option<f64>,

    /// Support of the edge to the parent, e.g. a bootstrap value
    pub support: Option<f64>,

    /// Soft deletion flag; deleted nodes stay in the arena
    pub deleted: bool,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            name: None,
            length: None,
            support: None,
            deleted: false,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
