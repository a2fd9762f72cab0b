//! [`AvlTree`]: search, insertion, deletion and the balance maintenance that
//! keeps every node within one level of balance.

use std::fmt;

use crate::node::{
    NodeArena, NodeId, Side, LEFT_HEAVY, LEFT_OVERFLOW, RIGHT_HEAVY, RIGHT_OVERFLOW,
};
use crate::rotation::{Origin, Rotation};
use crate::tracing_helpers::{debug_log, error_log};

/// An ordered map from `u32` keys to values, balanced as an AVL tree.
///
/// Nodes live in an index arena; parent, left and right links are handles into
/// it. Every node keeps a balance factor (`height(left) - height(right)`) in
/// `-1..=1` between public operations.
///
/// Keys are unique. Inserting a key that is already present, or deleting one
/// that is absent, is a caller bug and panics before the tree is modified.
pub struct AvlTree<V> {
    pub(crate) nodes: NodeArena<V>,
    pub(crate) root: NodeId,
    pub(crate) count: usize,
}

impl<V> AvlTree<V> {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            root: NodeId::NULL,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Approximate heap bytes held by the node arena.
    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<crate::node::Node<V>>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Drops every stored value and empties the tree.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = NodeId::NULL;
        self.count = 0;
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Returns the node holding `key`, or NULL.
    pub(crate) fn find(&self, key: u32) -> NodeId {
        let mut current = self.root;
        while !current.is_null() {
            let node = &self.nodes[current];
            current = match key.cmp(&node.key) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return current,
            };
        }
        NodeId::NULL
    }

    pub fn search(&self, key: u32) -> Option<&V> {
        let id = self.find(key);
        if id.is_null() {
            return None;
        }
        self.nodes[id].value.as_ref()
    }

    pub fn search_mut(&mut self, key: u32) -> Option<&mut V> {
        let id = self.find(key);
        if id.is_null() {
            return None;
        }
        self.nodes[id].value.as_mut()
    }

    pub fn contains_key(&self, key: u32) -> bool {
        !self.find(key).is_null()
    }

    // =========================================================================
    // Link helpers
    // =========================================================================

    /// Which slot of `parent` holds `child`.
    #[inline]
    pub(crate) fn side_of(&self, parent: NodeId, child: NodeId) -> Side {
        let p = &self.nodes[parent];
        if p.left == child {
            Side::Left
        } else {
            debug_assert_eq!(p.right, child, "child is not linked under parent");
            Side::Right
        }
    }

    /// Points `parent`'s `side` slot at `child` and fixes the back-reference.
    #[inline]
    pub(crate) fn attach(&mut self, parent: NodeId, side: Side, child: NodeId) {
        self.nodes[parent].set_child(side, child);
        if !child.is_null() {
            self.nodes[child].parent = parent;
        }
    }

    /// Puts `new` wherever `old` hung: under `parent`, or at the root.
    #[inline]
    pub(crate) fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if parent.is_null() {
            self.root = new;
            self.nodes[new].parent = NodeId::NULL;
        } else {
            let side = self.side_of(parent, old);
            self.attach(parent, side, new);
        }
    }

    /// Rightmost node of the left subtree.
    fn max_of_left_subtree(&self, id: NodeId) -> NodeId {
        let mut current = self.nodes[id].left;
        if current.is_null() {
            return current;
        }
        while !self.nodes[current].right.is_null() {
            current = self.nodes[current].right;
        }
        current
    }

    /// Leftmost node of the right subtree.
    fn min_of_right_subtree(&self, id: NodeId) -> NodeId {
        let mut current = self.nodes[id].right;
        if current.is_null() {
            return current;
        }
        while !self.nodes[current].left.is_null() {
            current = self.nodes[current].left;
        }
        current
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Inserts `key` with `value`.
    ///
    /// # Panics
    ///
    /// If `key` is already present. The tree is left untouched.
    pub fn insert(&mut self, key: u32, value: V) {
        debug_log!(key, "insert");

        if self.root.is_null() {
            self.root = self.nodes.alloc(key, value);
            self.count = 1;
            return;
        }

        // Find the parent of the new node before allocating anything.
        let mut current = self.root;
        let side = loop {
            let node = &self.nodes[current];
            let side = match key.cmp(&node.key) {
                std::cmp::Ordering::Less => Side::Left,
                std::cmp::Ordering::Greater => Side::Right,
                std::cmp::Ordering::Equal => {
                    error_log!(key, "duplicate key on insert");
                    panic!("AvlTree::insert: key {key} is already present");
                }
            };
            let next = node.child(side);
            if next.is_null() {
                break side;
            }
            current = next;
        };

        let new_node = self.nodes.alloc(key, value);
        self.attach(current, side, new_node);
        self.count += 1;
        self.rebalance_after_insert(new_node);
    }

    /// Walks up from a freshly attached leaf, growing balances until a node
    /// absorbs the height change or one rotation restores balance.
    fn rebalance_after_insert(&mut self, mut child: NodeId) {
        let mut parent = self.nodes[child].parent;
        while !parent.is_null() {
            debug_assert!((-1..=1).contains(&self.nodes[parent].balance));

            let side = self.side_of(parent, child);
            self.nodes[parent].balance += side.weight();

            match self.nodes[parent].balance {
                0 => return,
                LEFT_OVERFLOW | RIGHT_OVERFLOW => {
                    // `child` is the heavy child of `parent`. After an insert it
                    // always leans one way or the other.
                    let lean = self.nodes[child].balance;
                    debug_assert!(lean == LEFT_HEAVY || lean == RIGHT_HEAVY);
                    let rotation = if lean == side.weight() {
                        Rotation::single(side)
                    } else {
                        Rotation::double(side)
                    };
                    self.rotate(rotation, parent, Origin::Insert);
                    return;
                }
                _ => {
                    child = parent;
                    parent = self.nodes[parent].parent;
                }
            }
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Removes `key` and returns its value.
    ///
    /// # Panics
    ///
    /// If `key` is not present. The tree is left untouched.
    pub fn delete(&mut self, key: u32) -> V {
        debug_log!(key, "delete");

        let mut target = self.find(key);
        if target.is_null() {
            error_log!(key, "missing key on delete");
            panic!("AvlTree::delete: key {key} is not present");
        }

        self.count -= 1;
        if self.count == 0 {
            debug_assert_eq!(target, self.root);
            self.root = NodeId::NULL;
            return self.nodes.free(target);
        }

        // Prefer the in-order predecessor; fall back to the successor when the
        // target has no left subtree.
        let mut replacement = self.max_of_left_subtree(target);
        if replacement.is_null() {
            replacement = self.min_of_right_subtree(target);
        }
        if !replacement.is_null() {
            debug_log!(
                key,
                replacement = self.nodes[replacement].key,
                "delete: moving replacement into target"
            );
            self.swap_entries(target, replacement);
            target = replacement;
        }

        // `target` now has at most one child and, since the tree keeps at
        // least one node, a parent.
        let parent = self.nodes[target].parent;
        debug_assert!(!parent.is_null());
        let orphan = {
            let node = &self.nodes[target];
            debug_assert!(node.left.is_null() || node.right.is_null());
            if node.left.is_null() {
                node.right
            } else {
                node.left
            }
        };

        let side = self.side_of(parent, target);
        self.attach(parent, side, orphan);
        self.nodes[parent].balance -= side.weight();

        let value = self.nodes.free(target);
        self.rebalance_after_delete(parent);
        value
    }

    /// Moves `b`'s key and value into `a` and `a`'s value into `b`.
    fn swap_entries(&mut self, a: NodeId, b: NodeId) {
        let b_key = self.nodes[b].key;
        let b_value = self.nodes[b].value.take();
        let a_node = &mut self.nodes[a];
        let a_key = std::mem::replace(&mut a_node.key, b_key);
        let a_value = std::mem::replace(&mut a_node.value, b_value);
        let b_node = &mut self.nodes[b];
        b_node.key = a_key;
        b_node.value = a_value;
    }

    /// Walks up from the parent of a spliced-out node. A balance of `±1` means
    /// the subtree kept its height; `0` means it shrank and the parent must be
    /// adjusted; `±2` needs a rotation, after which the new subtree root decides.
    fn rebalance_after_delete(&mut self, mut top: NodeId) {
        while !top.is_null() {
            match self.nodes[top].balance {
                LEFT_OVERFLOW | RIGHT_OVERFLOW => {
                    let heavy = if self.nodes[top].balance == LEFT_OVERFLOW {
                        Side::Left
                    } else {
                        Side::Right
                    };
                    let middle = self.nodes[top].child(heavy);
                    let rotation = if self.nodes[middle].balance == heavy.opposite().weight() {
                        Rotation::double(heavy)
                    } else {
                        Rotation::single(heavy)
                    };
                    self.rotate(rotation, top, Origin::Delete);
                }
                0 => {
                    let parent = self.nodes[top].parent;
                    if !parent.is_null() {
                        let side = self.side_of(parent, top);
                        self.nodes[parent].balance -= side.weight();
                    }
                }
                _ => return,
            }
            // After a rotation `top` has moved below the new subtree root, so
            // its parent is that root.
            top = self.nodes[top].parent;
        }
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// In-order iterator over `(key, &value)`.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
            remaining: self.count,
        };
        iter.push_left_spine(self.root);
        iter
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<V> Default for AvlTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Clone for AvlTree<V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            count: self.count,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for AvlTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V> Extend<(u32, V)> for AvlTree<V> {
    fn extend<I: IntoIterator<Item = (u32, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<V> FromIterator<(u32, V)> for AvlTree<V> {
    fn from_iter<I: IntoIterator<Item = (u32, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<'a, V> IntoIterator for &'a AvlTree<V> {
    type Item = (u32, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

pub struct Iter<'a, V> {
    tree: &'a AvlTree<V>,
    stack: Vec<NodeId>,
    remaining: usize,
}

impl<V> Iter<'_, V> {
    fn push_left_spine(&mut self, mut id: NodeId) {
        while !id.is_null() {
            self.stack.push(id);
            id = self.tree.nodes[id].left;
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (u32, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        self.push_left_spine(node.right);
        self.remaining = self.remaining.saturating_sub(1);
        node.value.as_ref().map(|v| (node.key, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
