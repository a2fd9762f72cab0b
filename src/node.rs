//! Node model: handles, sides, and the arena that owns every tree node.

use std::ops::{Index, IndexMut};

// =============================================================================
// Balance constants
// =============================================================================

/// Balance is stored as `height(left) - height(right)`.
pub(crate) const LEFT_HEAVY: i8 = 1;
pub(crate) const RIGHT_HEAVY: i8 = -1;
pub(crate) const LEFT_OVERFLOW: i8 = 2;
pub(crate) const RIGHT_OVERFLOW: i8 = -2;

// =============================================================================
// Handle type
// =============================================================================

/// Handle into a [`NodeArena`].
///
/// Special: `u32::MAX` = NULL (no node). Handles are only meaningful for the
/// arena that issued them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) const NULL: NodeId = NodeId(u32::MAX);

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline]
    fn index(self) -> usize {
        debug_assert!(!self.is_null(), "dereferenced NULL node handle");
        self.0 as usize
    }
}

/// Which child slot of a parent a node occupies.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub(crate) fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Contribution of a one-level height change on this side to the balance.
    #[inline]
    pub(crate) fn weight(self) -> i8 {
        match self {
            Side::Left => LEFT_HEAVY,
            Side::Right => RIGHT_HEAVY,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

pub(crate) struct Node<V> {
    pub(crate) key: u32,
    /// `None` only while the slot sits on the free list.
    pub(crate) value: Option<V>,
    pub(crate) balance: i8,
    pub(crate) parent: NodeId,
    pub(crate) left: NodeId,
    pub(crate) right: NodeId,
}

impl<V> Node<V> {
    #[inline]
    pub(crate) fn child(&self, side: Side) -> NodeId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[inline]
    pub(crate) fn set_child(&mut self, side: Side, child: NodeId) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_leaf(&self) -> bool {
        self.left.is_null() && self.right.is_null()
    }
}

impl<V: Clone> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            value: self.value.clone(),
            balance: self.balance,
            parent: self.parent,
            left: self.left,
            right: self.right,
        }
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Index arena owning all nodes of one tree.
///
/// Freed slots keep their position and are recycled by the next allocation, so
/// handles held by live nodes never move.
pub(crate) struct NodeArena<V> {
    slots: Vec<Node<V>>,
    free: Vec<u32>,
}

impl<V> NodeArena<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocates a detached node with balance 0.
    pub(crate) fn alloc(&mut self, key: u32, value: V) -> NodeId {
        let node = Node {
            key,
            value: Some(value),
            balance: 0,
            parent: NodeId::NULL,
            left: NodeId::NULL,
            right: NodeId::NULL,
        };
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = node;
            return NodeId(idx);
        }
        let idx = u32::try_from(self.slots.len())
            .ok()
            .filter(|&i| i != NodeId::NULL.0)
            .unwrap_or_else(|| panic!("node arena exhausted at {} slots", self.slots.len()));
        self.slots.push(node);
        NodeId(idx)
    }

    /// Releases a node and hands its value back.
    pub(crate) fn free(&mut self, id: NodeId) -> V {
        let node = &mut self[id];
        let Some(value) = node.value.take() else {
            panic!("node slot {} freed twice", id.0);
        };
        node.parent = NodeId::NULL;
        node.left = NodeId::NULL;
        node.right = NodeId::NULL;
        node.balance = 0;
        self.free.push(id.0);
        value
    }

    /// Number of live nodes.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
    }
}

impl<V> Index<NodeId> for NodeArena<V> {
    type Output = Node<V>;

    #[inline]
    fn index(&self, id: NodeId) -> &Node<V> {
        &self.slots[id.index()]
    }
}

impl<V> IndexMut<NodeId> for NodeArena<V> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.slots[id.index()]
    }
}

impl<V: Clone> Clone for NodeArena<V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
        }
    }
}
