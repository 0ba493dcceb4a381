//! Disjoint-set structure over blob tags.

use std::collections::HashMap;

/// Union-find with path compression and union by rank.
///
/// Elements are blob tags; unknown tags are singletons until first touched.
#[derive(Debug, Default)]
pub struct UnionFind {
    parent: HashMap<u32, u32>,
    rank: HashMap<u32, u32>,
}

impl UnionFind {
    /// Create an empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Representative of `tag`'s equivalence class.
    pub fn find(&mut self, tag: u32) -> u32 {
        // Walk to the root, then compress the whole path onto it.
        let mut root = tag;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }
        let mut current = tag;
        while current != root {
            let next = self.parent[&current];
            self.parent.insert(current, root);
            current = next;
        }
        root
    }

    /// Merge the classes of `a` and `b`.
    pub fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank.get(&root_a).copied().unwrap_or(0);
        let rank_b = self.rank.get(&root_b).copied().unwrap_or(0);
        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else {
            self.parent.insert(root_b, root_a);
            if rank_a == rank_b {
                self.rank.insert(root_a, rank_a + 1);
            }
        }
    }
}
