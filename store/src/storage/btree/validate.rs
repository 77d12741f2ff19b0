//! Structural invariant checking.
//!
//! Used by tests after every operation, by the simulator, and by the
//! snapshot loader to reject documents that decode cleanly but do not
//! describe a valid tree.

use crate::storage::btree::node::Node;
use crate::storage::btree::tree::BTree;

/// A broken B-tree invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Child indexes from the root to the offending node.
    pub path: Vec<usize>,
    /// Description of the violation.
    pub description: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node at {:?}: {}", self.path, self.description)
    }
}

impl std::error::Error for InvariantViolation {}

impl<K: Ord> BTree<K> {
    /// Check every structural invariant of the tree.
    ///
    /// Keys are checked in non-decreasing order rather than strictly
    /// increasing, since the engine stores duplicate inserts.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let root = self.root();
        if root.key_count() == 0 && !root.is_leaf() {
            return Err(InvariantViolation {
                path: Vec::new(),
                description: "internal root has no keys".to_string(),
            });
        }

        let mut checker = Checker {
            min_keys: self.min_keys(),
            max_keys: self.max_keys(),
            path: Vec::new(),
            leaf_depth: None,
        };
        checker.check(root, None, None)
    }
}

struct Checker {
    min_keys: usize,
    max_keys: usize,
    path: Vec<usize>,
    leaf_depth: Option<usize>,
}

impl Checker {
    #[allow(clippy::disallowed_methods)] // The path is snapshotted into the report
    fn violation(&self, description: String) -> InvariantViolation {
        InvariantViolation {
            path: self.path.clone(),
            description,
        }
    }

    fn check<K: Ord>(
        &mut self,
        node: &Node<K>,
        lower: Option<&K>,
        upper: Option<&K>,
    ) -> Result<(), InvariantViolation> {
        let count = node.key_count();
        let is_root = self.path.is_empty();

        if count > self.max_keys {
            return Err(self.violation(format!(
                "{count} keys exceeds maximum {}",
                self.max_keys
            )));
        }
        if !is_root && count < self.min_keys {
            return Err(self.violation(format!(
                "{count} keys is below minimum {}",
                self.min_keys
            )));
        }

        let keys = node.keys();
        if keys.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(self.violation("keys out of order".to_string()));
        }
        if let (Some(lower), Some(first)) = (lower, keys.first())
            && first < lower
        {
            return Err(self.violation("key below parent separator".to_string()));
        }
        if let (Some(upper), Some(last)) = (upper, keys.last())
            && last > upper
        {
            return Err(self.violation("key above parent separator".to_string()));
        }

        if node.is_leaf() {
            if !node.children().is_empty() {
                return Err(self.violation("leaf has children".to_string()));
            }
            let depth = self.path.len();
            match self.leaf_depth {
                None => self.leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(self.violation(format!(
                        "leaf at depth {depth}, expected {expected}"
                    )));
                }
                Some(_) => {}
            }
            return Ok(());
        }

        if node.children().len() != count + 1 {
            return Err(self.violation(format!(
                "{} children for {count} keys",
                node.children().len()
            )));
        }

        for (i, child) in node.children().iter().enumerate() {
            let child_lower = if i == 0 { lower } else { keys.get(i - 1) };
            let child_upper = if i == count { upper } else { keys.get(i) };
            self.path.push(i);
            self.check(child, child_lower, child_upper)?;
            self.path.pop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(keys: &[i64]) -> Node<i64> {
        Node {
            is_leaf: true,
            keys: keys.to_vec(),
            children: Vec::new(),
        }
    }

    fn internal(keys: &[i64], children: Vec<Node<i64>>) -> Node<i64> {
        Node {
            is_leaf: false,
            keys: keys.to_vec(),
            children,
        }
    }

    fn tree(order: usize, root: Node<i64>) -> BTree<i64> {
        BTree::from_root(order, root).expect("valid order")
    }

    #[test]
    fn test_valid_tree_passes() {
        let root = internal(&[10], vec![leaf(&[1, 5]), leaf(&[11, 12])]);
        assert_eq!(tree(4, root).check_invariants(), Ok(()));
    }

    #[test]
    fn test_empty_leaf_root_passes() {
        assert_eq!(tree(4, leaf(&[])).check_invariants(), Ok(()));
    }

    #[test]
    fn test_internal_root_without_keys() {
        let root = internal(&[], vec![leaf(&[1])]);
        let err = tree(4, root).check_invariants().expect_err("invalid");
        assert_eq!(err.description, "internal root has no keys");
    }

    #[test]
    fn test_overfull_node() {
        let err = tree(4, leaf(&[1, 2, 3, 4]))
            .check_invariants()
            .expect_err("invalid");
        assert!(err.description.contains("exceeds maximum 3"));
    }

    #[test]
    fn test_underfull_child() {
        let root = internal(&[10], vec![leaf(&[1, 2]), leaf(&[])]);
        let err = tree(6, root).check_invariants().expect_err("invalid");
        assert_eq!(err.path, vec![1]);
        assert!(err.description.contains("below minimum 2"));
    }

    #[test]
    fn test_key_on_wrong_side_of_separator() {
        let root = internal(&[10], vec![leaf(&[1, 20]), leaf(&[11])]);
        let err = tree(4, root).check_invariants().expect_err("invalid");
        assert_eq!(err.path, vec![0]);
        assert_eq!(err.description, "key above parent separator");
    }

    #[test]
    fn test_unbalanced_leaves() {
        let deep = internal(&[3], vec![leaf(&[1]), leaf(&[4])]);
        let root = internal(&[10], vec![deep, leaf(&[11])]);
        let err = tree(4, root).check_invariants().expect_err("invalid");
        assert_eq!(err.path, vec![1]);
        assert_eq!(err.description, "leaf at depth 1, expected 2");
    }

    #[test]
    fn test_child_count_mismatch() {
        let root = internal(&[10, 20], vec![leaf(&[1]), leaf(&[11])]);
        let err = tree(4, root).check_invariants().expect_err("invalid");
        assert_eq!(err.description, "2 children for 2 keys");
    }

    #[test]
    fn test_display() {
        let violation = InvariantViolation {
            path: vec![0, 2],
            description: "keys out of order".to_string(),
        };
        assert_eq!(violation.to_string(), "node at [0, 2]: keys out of order");
    }
}
