//! In-memory B-tree used as the sorted index of the record store.
//!
//! # Structure
//!
//! A tree of order `m` has nodes with at most `m - 1` keys and, for internal
//! nodes, one more child than keys. Insert splits full nodes on the way
//! down; delete borrows from or merges with siblings on the way down, so
//! every operation is a single root-to-leaf pass.
//!
//! # Usage
//!
//! ```
//! use store::storage::btree::{BTree, BTreeError};
//!
//! let mut tree = BTree::new(5).expect("order 5 is valid");
//! for key in 1..=5 {
//!     tree.insert(key);
//! }
//!
//! assert_eq!(tree.root().keys(), &[2]);
//! assert!(tree.search(&4).is_some());
//! assert_eq!(tree.delete(&15), Err(BTreeError::KeyNotFound));
//! ```

mod node;
mod render;
mod tree;
mod validate;

pub use node::Node;
pub use render::render;
pub use tree::{BTree, BTreeError, MIN_ORDER, SearchHit};
pub use validate::InvariantViolation;
