//! Tree arena - root, node count, and the identifier pool.

use crate::node::{count_nodes, Node};
use alchc_util::IdentPool;

/// A syntax tree and the identifier pool it owns
///
/// `size` tracks the node count and must equal `count_nodes(root)` after
/// every public mutation. The pool lives exactly as long as the tree; all
/// `Ident` indices inside the tree refer to it.
#[derive(Debug, Default)]
pub struct Tree {
    pub root: Option<Box<Node>>,
    pub size: usize,
    pub pool: IdentPool,
}

impl Tree {
    /// Create an empty tree with a fresh pool
    pub fn new() -> Self {
        Self {
            root: None,
            size: 0,
            pool: IdentPool::new(),
        }
    }

    /// Replace the root, recomputing `size`
    pub fn set_root(&mut self, root: Option<Box<Node>>) {
        self.root = root;
        self.recount();
    }

    /// Recompute `size` from the actual tree
    pub fn recount(&mut self) {
        self.size = count_nodes(self.root.as_deref());
    }

    /// Returns true if the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        // Detach children onto a worklist before the boxes drop; a long
        // statement spine would otherwise recurse once per node.
        let mut work: Vec<Box<Node>> = Vec::new();
        if let Some(root) = self.root.take() {
            work.push(root);
        }
        while let Some(mut node) = work.pop() {
            if let Some(left) = node.left.take() {
                work.push(left);
            }
            if let Some(right) = node.right.take() {
                work.push(right);
            }
        }
    }
}
