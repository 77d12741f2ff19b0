//! Human-readable tree dump for interactive inspection.
//!
//! Not a stable format: one line per node in pre-order, indented two spaces
//! per level, e.g.
//!
//! ```text
//! Level 0: 2
//!   Level 1: 1
//!   Level 1: 3, 4, 5
//! ```

use std::fmt::{self, Display, Write};

use crate::storage::btree::node::Node;
use crate::storage::btree::tree::BTree;

/// Render the tree as an indented per-level listing.
#[must_use]
pub fn render<K: Display>(tree: &BTree<K>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_node(&mut out, tree.root(), 0);
    out
}

fn write_node<K: Display>(out: &mut impl Write, node: &Node<K>, depth: usize) -> fmt::Result {
    write!(out, "{:indent$}Level {depth}: ", "", indent = depth * 2)?;
    for (i, key) in node.keys().iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{key}")?;
    }
    out.write_char('\n')?;

    for child in node.children() {
        write_node(out, child, depth + 1)?;
    }
    Ok(())
}

impl<K: Display> Display for BTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self.root(), 0)
    }
}
