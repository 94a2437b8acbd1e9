//! Scene graph nodes.

use crate::math::Matrix4x4;

/// A node in the scene hierarchy.
///
/// Children are owned and kept in insertion order; that order is
/// significant (render order, bone hierarchy) and survives marshaling
/// unchanged. Meshes are referenced by index into
/// [`Scene::meshes`](crate::Scene::meshes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    /// Node name. Bones and animation channels refer to nodes by name.
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Matrix4x4,
    /// Child nodes, in order.
    pub children: Vec<Node>,
    /// Indices of meshes attached to this node.
    pub mesh_indices: Vec<usize>,
}

impl Node {
    /// Create a node with an identity transform and no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a child and return a mutable reference to it.
    pub fn add_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Depth-first search for a node by name, including `self`.
    pub fn find(&self, name: &str) -> Option<&Node> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Visit every node in this subtree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Node {
        let mut root = Node::new("root");
        let arm = root.add_child(Node::new("arm"));
        arm.add_child(Node::new("hand"));
        root.add_child(Node::new("leg"));
        root
    }

    #[test]
    fn find_is_depth_first() {
        let root = tree();
        assert_eq!(root.find("hand").map(|n| n.name.as_str()), Some("hand"));
        assert!(root.find("tail").is_none());
    }

    #[test]
    fn walk_is_pre_order() {
        let root = tree();
        let mut names = Vec::new();
        root.walk(&mut |n| names.push(n.name.clone()));
        assert_eq!(names, ["root", "arm", "hand", "leg"]);
        assert_eq!(root.subtree_len(), 4);
    }

    #[test]
    fn new_node_has_identity_transform() {
        assert!(Node::new("n").transform.is_identity());
    }
}
