//! Offline consistency checks and a level-by-level dump.
//!
//! Nothing here runs on the insert/delete paths. Findings are collected into a
//! [`ValidationReport`] instead of panicking, so a corrupted tree can still be
//! inspected.

use std::fmt;
use std::io::{self, Write};

use crate::node::{NodeId, Side};
use crate::tracing_helpers::warn_log;
use crate::tree::AvlTree;

// =============================================================================
// Violation
// =============================================================================

/// One broken tree invariant, with the keys involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A key in `node`'s left subtree is not smaller than `node`.
    LeftNotLess { left: u32, node: u32 },

    /// A key in `node`'s right subtree is not greater than `node`.
    RightNotGreater { node: u32, right: u32 },

    /// `child` hangs in `parent`'s `side` slot but does not point back to it.
    ParentLink { parent: u32, child: u32, side: Side },

    /// The root has a parent.
    RootHasParent { root: u32 },

    /// Stored balance disagrees with the measured subtree heights, or is out
    /// of range.
    Balance {
        node: u32,
        stored: i8,
        left_height: usize,
        right_height: usize,
    },

    /// `len()` differs from the number of reachable nodes.
    Size { recorded: usize, reachable: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftNotLess { left, node } => {
                write!(f, "order violated: left {left} >= node {node}")
            }

            Self::RightNotGreater { node, right } => {
                write!(f, "order violated: node {node} >= right {right}")
            }

            Self::ParentLink {
                parent,
                child,
                side,
            } => write!(
                f,
                "parent link broken: {side:?} child {child} of {parent} points elsewhere"
            ),

            Self::RootHasParent { root } => write!(f, "root {root} has a parent"),

            Self::Balance {
                node,
                stored,
                left_height,
                right_height,
            } => write!(
                f,
                "balance violated at {node}: stored {stored}, heights left {left_height} right {right_height}"
            ),

            Self::Size {
                recorded,
                reachable,
            } => write!(f, "size mismatch: len {recorded}, reachable {reachable}"),
        }
    }
}

impl std::error::Error for Violation {}

// =============================================================================
// ValidationReport
// =============================================================================

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// `Ok(())` when clean, otherwise the first violation.
    pub fn into_result(self) -> Result<(), Violation> {
        match self.violations.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first),
        }
    }

    fn push(&mut self, violation: Violation) {
        warn_log!(%violation, "avl tree validation");
        self.violations.push(violation);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "no violations");
        }
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Checks
// =============================================================================

impl<V> AvlTree<V> {
    /// Number of levels: 0 when empty, 1 for a lone root.
    pub fn height(&self) -> usize {
        self.subtree_height(self.root)
    }

    pub(crate) fn subtree_height(&self, id: NodeId) -> usize {
        if id.is_null() {
            return 0;
        }
        let node = &self.nodes[id];
        1 + self
            .subtree_height(node.left)
            .max(self.subtree_height(node.right))
    }

    /// Checks key ordering and parent back-links.
    pub fn validate_order(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        if !self.root.is_null() {
            let root = &self.nodes[self.root];
            if !root.parent.is_null() {
                report.push(Violation::RootHasParent { root: root.key });
            }
            self.check_order(self.root, None, None, &mut report);
        }
        report
    }

    /// [`validate_order`](Self::validate_order) plus balance factors and size.
    pub fn validate(&self) -> ValidationReport {
        let mut report = self.validate_order();
        let reachable = self.check_balance(self.root, &mut report).1;
        if reachable != self.count {
            report.push(Violation::Size {
                recorded: self.count,
                reachable,
            });
        }
        report
    }

    /// Every key under `id` must lie strictly between `lower` and `upper`.
    fn check_order(
        &self,
        id: NodeId,
        lower: Option<u32>,
        upper: Option<u32>,
        report: &mut ValidationReport,
    ) {
        let node = &self.nodes[id];
        if let Some(upper) = upper {
            if node.key >= upper {
                report.push(Violation::LeftNotLess {
                    left: node.key,
                    node: upper,
                });
            }
        }
        if let Some(lower) = lower {
            if node.key <= lower {
                report.push(Violation::RightNotGreater {
                    node: lower,
                    right: node.key,
                });
            }
        }

        for side in [Side::Left, Side::Right] {
            let child = node.child(side);
            if child.is_null() {
                continue;
            }
            if self.nodes[child].parent != id {
                report.push(Violation::ParentLink {
                    parent: node.key,
                    child: self.nodes[child].key,
                    side,
                });
            }
            let (lo, hi) = match side {
                Side::Left => (lower, Some(node.key)),
                Side::Right => (Some(node.key), upper),
            };
            self.check_order(child, lo, hi, report);
        }
    }

    /// Returns `(height, node count)` of the subtree at `id`.
    fn check_balance(&self, id: NodeId, report: &mut ValidationReport) -> (usize, usize) {
        if id.is_null() {
            return (0, 0);
        }
        let node = &self.nodes[id];
        let (left_height, left_count) = self.check_balance(node.left, report);
        let (right_height, right_count) = self.check_balance(node.right, report);

        let measured = left_height as isize - right_height as isize;
        if !(-1..=1).contains(&node.balance) || isize::from(node.balance) != measured {
            report.push(Violation::Balance {
                node: node.key,
                stored: node.balance,
                left_height,
                right_height,
            });
        }
        (
            1 + left_height.max(right_height),
            1 + left_count + right_count,
        )
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// Writes the tree one level per line.
    ///
    /// Each node renders as `key(level|balance)`; `[ ]` marks an empty child
    /// slot of a node on the printed level. A footer reports height and size.
    /// Prints nothing for an empty tree.
    pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.root.is_null() {
            return Ok(());
        }
        let height = self.height();
        writeln!(out, "----------")?;
        for level in 0..height {
            self.print_level(out, self.root, 0, level)?;
            writeln!(out)?;
        }
        writeln!(out)?;
        writeln!(out, "Height [{height}], Total [{}] nodes", self.count)?;
        writeln!(out, "----------")
    }

    /// [`print`](Self::print) to stderr.
    pub fn eprint(&self) {
        let stderr = io::stderr();
        let mut lock = stderr.lock();
        // Diagnostics only: a failed write to stderr has nowhere better to go.
        let _ = self.print(&mut lock);
    }

    fn print_level<W: Write>(
        &self,
        out: &mut W,
        id: NodeId,
        depth: usize,
        level: usize,
    ) -> io::Result<()> {
        let node = &self.nodes[id];
        let on_level = depth == level;

        if !node.left.is_null() {
            if depth < level {
                self.print_level(out, node.left, depth + 1, level)?;
            }
        } else if on_level {
            write!(out, " [ ]")?;
        }
        if on_level {
            write!(out, "{}({}|{})", node.key, depth, node.balance)?;
        }
        if !node.right.is_null() {
            if depth < level {
                self.print_level(out, node.right, depth + 1, level)?;
            }
        } else if on_level {
            write!(out, "[ ] ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AvlTree<u32> {
        [4, 2, 6, 1, 3, 5, 7].into_iter().map(|k| (k, k)).collect()
    }

    #[test]
    fn test_height() {
        let mut t: AvlTree<u32> = AvlTree::new();
        assert_eq!(t.height(), 0);
        t.insert(1, 1);
        assert_eq!(t.height(), 1);
        assert_eq!(sample().height(), 3);
        t.delete(1);
        assert_eq!(t.height(), 0);
    }

    #[test]
    fn test_valid_tree_reports_nothing() {
        let t = sample();
        assert!(t.validate_order().is_ok());
        let report = t.validate();
        assert!(report.is_ok());
        assert_eq!(report.to_string(), "no violations");
        assert_eq!(report.into_result(), Ok(()));
    }

    #[test]
    fn test_emptied_tree_validates() {
        let mut t = sample();
        for k in 1..=7 {
            t.delete(k);
        }
        assert!(t.validate_order().is_ok());
        assert!(t.validate().is_ok());
        assert_eq!(t.height(), 0);
    }

    #[test]
    fn test_order_violation_names_keys() {
        let mut t = sample();
        // Corrupt: put 10 where 3 is (left subtree of 4).
        let three = t.find(3);
        t.nodes[three].key = 10;

        let report = t.validate_order();
        assert!(!report.is_ok());
        assert!(report
            .violations()
            .contains(&Violation::LeftNotLess { left: 10, node: 4 }));
        assert!(report.to_string().contains("left 10 >= node 4"));
    }

    #[test]
    fn test_right_order_violation() {
        let mut t = sample();
        let five = t.find(5);
        t.nodes[five].key = 0;
        let report = t.validate_order();
        assert!(report
            .violations()
            .contains(&Violation::RightNotGreater { node: 4, right: 0 }));
    }

    #[test]
    fn test_parent_link_violation() {
        let mut t = sample();
        let one = t.find(1);
        let six = t.find(6);
        t.nodes[one].parent = six;

        let report = t.validate_order();
        assert_eq!(
            report.violations(),
            &[Violation::ParentLink {
                parent: 2,
                child: 1,
                side: Side::Left,
            }]
        );
    }

    #[test]
    fn test_balance_and_size_violations() {
        let mut t = sample();
        let two = t.find(2);
        t.nodes[two].balance = 1;
        t.count = 9;

        let report = t.validate();
        assert!(t.validate_order().is_ok());
        assert!(report.violations().contains(&Violation::Balance {
            node: 2,
            stored: 1,
            left_height: 1,
            right_height: 1,
        }));
        assert!(report.violations().contains(&Violation::Size {
            recorded: 9,
            reachable: 7,
        }));
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_print_levels() {
        let mut t: AvlTree<u32> = AvlTree::new();
        for k in [2, 1, 3] {
            t.insert(k, k);
        }
        let mut out = Vec::new();
        t.print(&mut out).expect("write to Vec");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "----------");
        assert_eq!(lines[1], "2(0|0)");
        assert_eq!(lines[2], " [ ]1(1|0)[ ]  [ ]3(1|0)[ ] ");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "Height [2], Total [3] nodes");
        assert_eq!(lines[5], "----------");
    }

    #[test]
    fn test_print_empty_tree_writes_nothing() {
        let t: AvlTree<u32> = AvlTree::new();
        let mut out = Vec::new();
        t.print(&mut out).expect("write to Vec");
        assert!(out.is_empty());
    }

    #[test]
    fn test_violation_is_error() {
        let v: Box<dyn std::error::Error> = Box::new(Violation::RootHasParent { root: 3 });
        assert_eq!(v.to_string(), "root 3 has a parent");
    }
}
