//! # avlt
//!
//! An AVL tree mapping `u32` keys to values, backed by an index arena.
//!
//! Every node stores its balance factor (`height(left) - height(right)`), and
//! insertions and deletions restore the `-1..=1` bound with single and double
//! rotations. Search, insert and delete are O(log n).
//!
//! ## Example
//!
//! ```rust
//! use avlt::AvlTree;
//!
//! let mut tree: AvlTree<&str> = AvlTree::new();
//! tree.insert(10, "ten");
//! tree.insert(20, "twenty");
//! tree.insert(5, "five");
//!
//! assert_eq!(tree.search(20), Some(&"twenty"));
//! assert_eq!(tree.delete(10), "ten");
//! assert_eq!(tree.keys().collect::<Vec<_>>(), vec![5, 20]);
//! assert!(tree.validate().is_ok());
//! ```
//!
//! ## Contract
//!
//! Keys are unique. [`AvlTree::insert`] panics on a key that is already present
//! and [`AvlTree::delete`] panics on a key that is absent; both check before
//! touching the tree. Values are handed back by `delete` and are otherwise never
//! cloned or inspected, so `V` may be a plain reference or handle when the
//! caller owns the data.
//!
//! ## Also in this crate
//!
//! - [`Deque`]: a doubly linked deque with stable [`Handle`]s.
//! - [`LatencyProbe`]: a lap timer that reports latency and throughput.
//!
//! ## Logging
//!
//! With the `tracing` feature, rotations, insert/delete entry points,
//! validation findings and contract violations are emitted as `tracing`
//! events. Without it the logging calls compile away.

#![deny(unsafe_code)]

mod tracing_helpers;

mod deque;
mod diagnostics;
mod node;
mod rotation;
mod timer;
mod tree;

pub use deque::{Deque, Handle, Iter as DequeIter};
pub use diagnostics::{ValidationReport, Violation};
pub use node::Side;
pub use timer::{LatencyProbe, ProbeError, Stats};
pub use tree::{AvlTree, Iter};

#[cfg(test)]
mod proptests;
