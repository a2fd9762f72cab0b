//! Rotation engine.
//!
//! Each rotation rewires a window of two or three nodes (`top`, `middle`, and
//! for double rotations `bottom`) so that the in-order sequence is unchanged,
//! then recomputes the window's balance factors from a small table. The table
//! depends on whether an insertion or a deletion triggered the rotation.
//!
//! ```text
//!   single right (left-heavy)        double left-right
//!
//!        top          middle              top             bottom
//!       /     =>     /    \              /       =>      /      \
//!    middle        a      top        middle           middle    top
//!    /    \               /               \
//!   a      b             b               bottom
//! ```

use crate::node::NodeId;
use crate::node::Side;
use crate::tracing_helpers::trace_log;
use crate::tree::AvlTree;

/// The four rotation shapes, named after the direction(s) the window turns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Rotation {
    /// Left-heavy top with a left-leaning (or, on delete, level) left child.
    Right,
    /// Mirror of [`Rotation::Right`].
    Left,
    /// Left-heavy top whose left child leans right.
    LeftRight,
    /// Mirror of [`Rotation::LeftRight`].
    RightLeft,
}

impl Rotation {
    /// Single rotation resolving an overflow on `heavy`.
    #[inline]
    pub(crate) fn single(heavy: Side) -> Self {
        match heavy {
            Side::Left => Rotation::Right,
            Side::Right => Rotation::Left,
        }
    }

    /// Double rotation resolving an overflow on `heavy` whose child leans the
    /// other way.
    #[inline]
    pub(crate) fn double(heavy: Side) -> Self {
        match heavy {
            Side::Left => Rotation::LeftRight,
            Side::Right => Rotation::RightLeft,
        }
    }

    /// Side of `top` that carries the excess height.
    #[inline]
    pub(crate) fn heavy_side(self) -> Side {
        match self {
            Rotation::Right | Rotation::LeftRight => Side::Left,
            Rotation::Left | Rotation::RightLeft => Side::Right,
        }
    }

    #[inline]
    pub(crate) fn is_double(self) -> bool {
        matches!(self, Rotation::LeftRight | Rotation::RightLeft)
    }
}

/// What triggered a rotation; selects the balance table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Origin {
    Insert,
    Delete,
}

impl<V> AvlTree<V> {
    /// Applies `rotation` at `top` and fixes the balances of the window.
    /// Returns the new root of the rotated subtree.
    pub(crate) fn rotate(&mut self, rotation: Rotation, top: NodeId, origin: Origin) -> NodeId {
        let heavy = rotation.heavy_side();
        let middle = self.nodes[top].child(heavy);
        debug_assert!(!middle.is_null(), "rotation without a heavy child");

        trace_log!(
            ?rotation,
            ?origin,
            top = self.nodes[top].key,
            middle = self.nodes[middle].key,
            "rotate"
        );

        if rotation.is_double() {
            let bottom = self.nodes[middle].child(heavy.opposite());
            debug_assert!(!bottom.is_null(), "double rotation without a grandchild");
            self.rotate_double(heavy, top, middle, bottom);
            self.retune_double(heavy, top, middle, bottom);
            bottom
        } else {
            self.rotate_single(heavy, top, middle);
            self.retune_single(heavy, origin, top, middle);
            middle
        }
    }

    /// `middle` takes `top`'s place; `top` becomes `middle`'s child on the
    /// light side and adopts `middle`'s inner subtree.
    fn rotate_single(&mut self, heavy: Side, top: NodeId, middle: NodeId) {
        let light = heavy.opposite();
        let parent = self.nodes[top].parent;

        let inner = self.nodes[middle].child(light);
        self.attach(top, heavy, inner);
        self.attach(middle, light, top);
        self.replace_child(parent, top, middle);
    }

    /// `bottom` is promoted two levels; `middle` and `top` become its children
    /// and adopt its two subtrees.
    fn rotate_double(&mut self, heavy: Side, top: NodeId, middle: NodeId, bottom: NodeId) {
        let light = heavy.opposite();
        let parent = self.nodes[top].parent;

        let toward_top = self.nodes[bottom].child(light);
        let toward_middle = self.nodes[bottom].child(heavy);
        self.attach(top, heavy, toward_top);
        self.attach(middle, light, toward_middle);
        self.attach(bottom, light, top);
        self.attach(bottom, heavy, middle);
        self.replace_child(parent, top, bottom);
    }

    /// Balances after a single rotation.
    ///
    /// | origin | middle before | top | middle |
    /// |--------|---------------|-----|--------|
    /// | insert | leans heavy   | 0   | 0      |
    /// | delete | leans heavy   | 0   | 0      |
    /// | delete | level         | w   | -w     |
    ///
    /// `w` is the weight of the heavy side.
    fn retune_single(&mut self, heavy: Side, origin: Origin, top: NodeId, middle: NodeId) {
        let w = heavy.weight();
        let (top_balance, middle_balance) = match origin {
            Origin::Insert => (0, 0),
            Origin::Delete if self.nodes[middle].balance == w => (0, 0),
            Origin::Delete => {
                debug_assert_eq!(self.nodes[middle].balance, 0);
                (w, -w)
            }
        };
        self.nodes[top].balance = top_balance;
        self.nodes[middle].balance = middle_balance;
    }

    /// Balances after a double rotation, keyed on `bottom`'s lean before the
    /// rotation. Insert and delete share this table.
    ///
    /// | bottom before | top | middle |
    /// |---------------|-----|--------|
    /// | w             | -w  | 0      |
    /// | -w            | 0   | w      |
    /// | 0             | 0   | 0      |
    fn retune_double(&mut self, heavy: Side, top: NodeId, middle: NodeId, bottom: NodeId) {
        let w = heavy.weight();
        let b = self.nodes[bottom].balance;
        let (top_balance, middle_balance) = if b == w {
            (-w, 0)
        } else if b == -w {
            (0, w)
        } else {
            debug_assert_eq!(b, 0);
            (0, 0)
        };
        self.nodes[top].balance = top_balance;
        self.nodes[middle].balance = middle_balance;
        self.nodes[bottom].balance = 0;
    }
}
