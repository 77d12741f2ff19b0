//! B-tree engine: search, insert with pre-emptive splitting, and the full
//! deletion protocol (borrow, merge, predecessor/successor substitution).
//!
//! The tree owns every node directly (`Vec<Node<K>>` children, no parent
//! pointers). Insert splits any full node *before* descending into it, and
//! delete tops up any minimal node *before* descending into it, so neither
//! operation ever has to walk back up.

use crate::storage::btree::node::Node;

/// Smallest order accepted by [`BTree::new`].
///
/// At order 3 a full node holds two keys, and splitting it around one
/// promoted key leaves one half empty.
pub const MIN_ORDER: usize = 4;

/// An in-memory B-tree of order `m`.
///
/// # Invariants
///
/// - Every node holds at most `m - 1` keys.
/// - Every node except the root holds at least `m / 2 - 1` keys.
/// - The root holds zero keys only when the tree is empty, and is then a leaf.
/// - All leaves sit at the same depth.
#[derive(Debug)]
pub struct BTree<K> {
    order: usize,
    root: Node<K>,
    len: usize,
    node_count: usize,
}

/// Location of a key found by [`BTree::search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a, K> {
    node: &'a Node<K>,
    index: usize,
}

impl<'a, K> SearchHit<'a, K> {
    /// The node holding the key.
    #[must_use]
    pub const fn node(&self) -> &'a Node<K> {
        self.node
    }

    /// Position of the key within [`Self::node`].
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The key itself.
    #[must_use]
    pub fn key(&self) -> &'a K {
        &self.node.keys[self.index]
    }
}

impl<K> BTree<K> {
    /// Create an empty tree of the given order.
    pub fn new(order: usize) -> Result<Self, BTreeError> {
        if order < MIN_ORDER {
            return Err(BTreeError::InvalidOrder {
                order,
                min: MIN_ORDER,
            });
        }
        Ok(Self {
            order,
            root: Node::new_leaf(),
            len: 0,
            node_count: 1,
        })
    }

    /// Assemble a tree around an already-built root.
    ///
    /// The caller is responsible for checking the invariants afterwards
    /// (see [`BTree::check_invariants`]).
    pub(crate) fn from_root(order: usize, root: Node<K>) -> Result<Self, BTreeError> {
        let mut tree = Self::new(order)?;
        tree.len = count_keys(&root);
        tree.node_count = count_nodes(&root);
        tree.root = root;
        Ok(tree)
    }

    /// Maximum number of children per node.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Maximum number of keys per node.
    #[must_use]
    pub const fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum number of keys per non-root node.
    #[must_use]
    pub const fn min_keys(&self) -> usize {
        self.order / 2 - 1
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> &Node<K> {
        &self.root
    }

    /// Number of keys stored.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated nodes, including an empty root.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of levels; an empty tree has height 1.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while !node.is_leaf {
            node = &node.children[0];
            height += 1;
        }
        height
    }

    /// All keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.len);
        collect_keys(&self.root, &mut keys);
        keys
    }

    /// Drop every key, leaving an empty leaf root.
    pub fn clear(&mut self) {
        self.root = Node::new_leaf();
        self.len = 0;
        self.node_count = 1;
    }
}

impl<K: Ord> BTree<K> {
    /// Find the node and position holding `key`.
    #[must_use]
    pub fn search(&self, key: &K) -> Option<SearchHit<'_, K>> {
        let mut node = &self.root;
        loop {
            let index = node.lower_bound(key);
            if index < node.keys.len() && node.keys[index] == *key {
                return Some(SearchHit { node, index });
            }
            if node.is_leaf {
                return None;
            }
            node = &node.children[index];
        }
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Insert `key`.
    ///
    /// The engine does not reject duplicates: inserting a key that is already
    /// present stores a second occurrence. Callers that need set semantics
    /// check [`BTree::contains`] (or their record store) first.
    pub fn insert(&mut self, key: K) {
        if self.root.keys.len() == self.max_keys() {
            let old_root = std::mem::replace(&mut self.root, Node::new_internal());
            self.root.children.push(old_root);
            self.root.split_child(0, self.order);
            self.node_count += 2;
            tracing::trace!(order = self.order, "root split");
        }

        let splits = insert_non_full(&mut self.root, key, self.order);
        self.node_count += splits;
        self.len += 1;
    }

    /// Remove one occurrence of `key`, returning the stored key.
    ///
    /// # Errors
    ///
    /// - [`BTreeError::EmptyTreeDelete`] if the tree holds no keys.
    /// - [`BTreeError::KeyNotFound`] if `key` is absent. The tree is left
    ///   untouched in both cases.
    pub fn delete(&mut self, key: &K) -> Result<K, BTreeError> {
        if self.root.keys.is_empty() {
            return Err(BTreeError::EmptyTreeDelete);
        }
        // Rebalancing happens on the way down, so an absent key must be
        // rejected before the descent starts.
        if !self.contains(key) {
            return Err(BTreeError::KeyNotFound);
        }

        let mut deletion = Deletion {
            min_keys: self.min_keys(),
            merges: 0,
        };
        let removed = deletion.remove(&mut self.root, key);
        self.node_count -= deletion.merges;

        if self.root.keys.is_empty() && !self.root.is_leaf {
            let child = self.root.children.remove(0);
            self.root = child;
            self.node_count -= 1;
            tracing::trace!(order = self.order, "root collapsed");
        }

        let removed = removed.ok_or(BTreeError::KeyNotFound)?;
        self.len -= 1;
        Ok(removed)
    }
}

/// Insert into a node known to be non-full. Returns the number of splits.
fn insert_non_full<K: Ord>(node: &mut Node<K>, key: K, order: usize) -> usize {
    let mut index = node.upper_bound(&key);
    if node.is_leaf {
        node.keys.insert(index, key);
        return 0;
    }

    let mut splits = 0;
    if node.children[index].keys.len() == order - 1 {
        node.split_child(index, order);
        splits += 1;
        if key > node.keys[index] {
            index += 1;
        }
    }
    splits + insert_non_full(&mut node.children[index], key, order)
}

/// State carried down one delete.
///
/// Every node the deletion descends into is first topped up to more than
/// `min_keys` keys, so removing one key from it can never underflow.
struct Deletion {
    min_keys: usize,
    merges: usize,
}

impl Deletion {
    fn remove<K: Ord>(&mut self, node: &mut Node<K>, key: &K) -> Option<K> {
        let index = node.lower_bound(key);

        if index < node.keys.len() && node.keys[index] == *key {
            if node.is_leaf {
                return Some(node.keys.remove(index));
            }
            return self.remove_from_internal(node, index, key);
        }

        if node.is_leaf {
            return None;
        }

        let index = self.fill_child(node, index);
        self.remove(&mut node.children[index], key)
    }

    /// Remove `keys[index]` from an internal node.
    fn remove_from_internal<K: Ord>(
        &mut self,
        node: &mut Node<K>,
        index: usize,
        key: &K,
    ) -> Option<K> {
        if node.children[index].keys.len() > self.min_keys {
            let predecessor = self.remove_last(&mut node.children[index])?;
            return Some(std::mem::replace(&mut node.keys[index], predecessor));
        }
        if node.children[index + 1].keys.len() > self.min_keys {
            let successor = self.remove_first(&mut node.children[index + 1])?;
            return Some(std::mem::replace(&mut node.keys[index], successor));
        }

        node.merge_children(index);
        self.merges += 1;
        self.remove(&mut node.children[index], key)
    }

    /// Remove the rightmost key of the subtree rooted at `node`.
    fn remove_last<K>(&mut self, node: &mut Node<K>) -> Option<K> {
        if node.is_leaf {
            return node.keys.pop();
        }
        let index = self.fill_child(node, node.keys.len());
        self.remove_last(&mut node.children[index])
    }

    /// Remove the leftmost key of the subtree rooted at `node`.
    fn remove_first<K>(&mut self, node: &mut Node<K>) -> Option<K> {
        if node.is_leaf {
            return (!node.keys.is_empty()).then(|| node.keys.remove(0));
        }
        let index = self.fill_child(node, 0);
        self.remove_first(&mut node.children[index])
    }

    /// Make sure `children[index]` has more than `min_keys` keys.
    ///
    /// Returns the index to descend into: `index - 1` when the child was
    /// merged into its left sibling, otherwise `index`.
    fn fill_child<K>(&mut self, node: &mut Node<K>, index: usize) -> usize {
        if node.children[index].keys.len() > self.min_keys {
            return index;
        }

        let has_right = index < node.keys.len();
        if index > 0 && node.children[index - 1].keys.len() > self.min_keys {
            node.borrow_from_prev(index);
            index
        } else if has_right && node.children[index + 1].keys.len() > self.min_keys {
            node.borrow_from_next(index);
            index
        } else if has_right {
            node.merge_children(index);
            self.merges += 1;
            index
        } else {
            node.merge_children(index - 1);
            self.merges += 1;
            index - 1
        }
    }
}

fn collect_keys<'a, K>(node: &'a Node<K>, out: &mut Vec<&'a K>) {
    if node.is_leaf {
        out.extend(node.keys.iter());
        return;
    }
    for (i, child) in node.children.iter().enumerate() {
        collect_keys(child, out);
        if let Some(key) = node.keys.get(i) {
            out.push(key);
        }
    }
}

fn count_keys<K>(node: &Node<K>) -> usize {
    node.keys.len() + node.children.iter().map(count_keys).sum::<usize>()
}

fn count_nodes<K>(node: &Node<K>) -> usize {
    1 + node.children.iter().map(count_nodes).sum::<usize>()
}

/// Errors that can occur during B-tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BTreeError {
    /// The key to search for or delete is not in the tree.
    KeyNotFound,
    /// Delete was called on an empty tree.
    EmptyTreeDelete,
    /// The requested order is too small to split nodes meaningfully.
    InvalidOrder { order: usize, min: usize },
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyNotFound => write!(f, "key not found"),
            Self::EmptyTreeDelete => write!(f, "tree is empty"),
            Self::InvalidOrder { order, min } => {
                write!(f, "invalid order {order} (minimum is {min})")
            }
        }
    }
}

impl std::error::Error for BTreeError {}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn tree_with(order: usize, keys: &[i64]) -> BTree<i64> {
        let mut tree = BTree::new(order).expect("valid order");
        for &key in keys {
            tree.insert(key);
        }
        tree
    }

    fn child_keys(tree: &BTree<i64>) -> Vec<Vec<i64>> {
        tree.root()
            .children()
            .iter()
            .map(|child| child.keys().to_vec())
            .collect()
    }

    fn sorted_keys(tree: &BTree<i64>) -> Vec<i64> {
        tree.keys().into_iter().copied().collect()
    }

    #[test]
    fn test_new_tree_is_empty_leaf() {
        let tree: BTree<i64> = BTree::new(5).expect("valid order");
        assert!(tree.is_empty());
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().key_count(), 0);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_invalid_order() {
        for order in 0..MIN_ORDER {
            let err = BTree::<i64>::new(order).expect_err("order too small");
            assert_eq!(err, BTreeError::InvalidOrder { order, min: 4 });
        }
        assert!(BTree::<i64>::new(MIN_ORDER).is_ok());
    }

    #[test]
    fn test_key_bounds_by_order() {
        let even: BTree<i64> = BTree::new(6).expect("valid order");
        assert_eq!((even.min_keys(), even.max_keys()), (2, 5));
        let odd: BTree<i64> = BTree::new(5).expect("valid order");
        assert_eq!((odd.min_keys(), odd.max_keys()), (1, 4));
    }

    #[test]
    fn test_insert_split_shape() {
        let tree = tree_with(5, &[1, 2, 3, 4, 5]);

        assert_eq!(tree.root().keys(), &[2]);
        assert_eq!(child_keys(&tree), vec![vec![1], vec![3, 4, 5]]);
        assert!(tree.root().children().iter().all(Node::is_leaf));
        assert_eq!(tree.node_count(), 3);
        tree.check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_delete_borrows_from_next() {
        let mut tree = tree_with(5, &[1, 2, 3, 4, 5]);

        assert_eq!(tree.delete(&1), Ok(1));

        assert_eq!(tree.root().keys(), &[3]);
        assert_eq!(child_keys(&tree), vec![vec![2], vec![4, 5]]);
        tree.check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_delete_from_empty_tree() {
        let mut tree: BTree<i64> = BTree::new(5).expect("valid order");

        assert_eq!(tree.delete(&5), Err(BTreeError::EmptyTreeDelete));
        assert!(tree.is_empty());
        assert!(tree.root().is_leaf());
    }

    #[test]
    fn test_missing_key_leaves_tree_unchanged() {
        let mut tree = tree_with(4, &[10, 20, 30]);
        let before = format!("{:?}", tree.root());

        assert!(tree.search(&15).is_none());
        assert_eq!(tree.delete(&15), Err(BTreeError::KeyNotFound));
        assert_eq!(format!("{:?}", tree.root()), before);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_missing_key_in_deep_tree_does_not_rebalance() {
        // Absent keys would otherwise trigger merges on the descent path.
        let mut tree = tree_with(4, &(0..40).map(|k| k * 2).collect::<Vec<_>>());
        let before = format!("{:?}", tree.root());

        assert_eq!(tree.delete(&7), Err(BTreeError::KeyNotFound));
        assert_eq!(format!("{:?}", tree.root()), before);
    }

    #[test]
    fn test_search_reports_node_and_position() {
        let tree = tree_with(5, &[1, 2, 3, 4, 5]);

        let hit = tree.search(&2).expect("2 is in the root");
        assert_eq!(hit.index(), 0);
        assert!(!hit.node().is_leaf());

        let hit = tree.search(&4).expect("4 is in a leaf");
        assert_eq!(hit.index(), 1);
        assert_eq!(*hit.key(), 4);
        assert!(hit.node().is_leaf());

        assert!(tree.search(&6).is_none());
    }

    #[test]
    fn test_delete_borrows_from_prev() {
        let mut tree = tree_with(5, &[1, 2, 3, 4, 5]);
        tree.insert(0);
        // root [2], children [0, 1] and [3, 4, 5]
        tree.delete(&5).expect("present");
        tree.delete(&4).expect("present");
        // right child is now [3]; deleting 3 must borrow 1 through the root
        assert_eq!(child_keys(&tree), vec![vec![0, 1], vec![3]]);

        tree.delete(&3).expect("present");

        assert_eq!(tree.root().keys(), &[1]);
        assert_eq!(child_keys(&tree), vec![vec![0], vec![2]]);
        tree.check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_delete_merges_and_collapses_root() {
        let mut tree = tree_with(4, &[1, 2, 3, 4]);
        // order 4 splits [1, 2, 3] into [1] / 2 / [3]
        assert_eq!(tree.root().keys(), &[2]);
        assert_eq!(child_keys(&tree), vec![vec![1], vec![3, 4]]);

        tree.delete(&4).expect("present");
        assert_eq!(tree.height(), 2);

        tree.delete(&1).expect("present");

        assert_eq!(tree.height(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().keys(), &[2, 3]);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_delete_internal_key_uses_predecessor() {
        let mut tree = tree_with(5, &[1, 2, 3, 4, 5]);
        tree.insert(0);
        // root [2], left [0, 1] can spare its predecessor

        tree.delete(&2).expect("present");

        assert_eq!(tree.root().keys(), &[1]);
        assert_eq!(child_keys(&tree), vec![vec![0], vec![3, 4, 5]]);
    }

    #[test]
    fn test_delete_internal_key_uses_successor() {
        let mut tree = tree_with(5, &[1, 2, 3, 4, 5]);
        // root [2], left [1] is minimal, right [3, 4, 5] can spare its successor

        tree.delete(&2).expect("present");

        assert_eq!(tree.root().keys(), &[3]);
        assert_eq!(child_keys(&tree), vec![vec![1], vec![4, 5]]);
    }

    #[test]
    fn test_delete_internal_key_merges_minimal_children() {
        let mut tree = tree_with(4, &[1, 2, 3, 4]);
        tree.delete(&4).expect("present");
        assert_eq!(child_keys(&tree), vec![vec![1], vec![3]]);

        tree.delete(&2).expect("present");

        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().keys(), &[1, 3]);
    }

    #[test]
    fn test_delete_everything_returns_to_empty_state() {
        for order in [4, 5, 6, 7, 10] {
            let keys: Vec<i64> = (0..300).collect();
            let mut tree = tree_with(order, &keys);
            tree.check_invariants().expect("invariants hold");

            for key in keys.iter().rev().step_by(2).chain(keys.iter().step_by(2)) {
                assert_eq!(tree.delete(key), Ok(*key), "order {order}");
                tree.check_invariants().expect("invariants hold");
            }

            assert!(tree.is_empty());
            assert!(tree.root().is_leaf());
            assert_eq!(tree.root().key_count(), 0);
            assert_eq!(tree.node_count(), 1);
        }
    }

    #[test]
    fn test_invariants_after_every_insert() {
        let mut rng = StdRng::seed_from_u64(7);
        for order in [4, 5, 8, 9] {
            let mut keys: Vec<i64> = (0..500).collect();
            keys.shuffle(&mut rng);

            let mut tree = BTree::new(order).expect("valid order");
            for &key in &keys {
                tree.insert(key);
                tree.check_invariants().expect("invariants hold");
            }
            assert_eq!(tree.len(), 500);
            assert_eq!(sorted_keys(&tree), (0..500).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_random_workload_matches_model() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for order in [4, 5, 6, 11] {
            let mut tree = BTree::new(order).expect("valid order");
            let mut model = BTreeSet::new();

            for _ in 0..3_000 {
                let key = rng.random_range(0..400_i64);
                if rng.random_bool(0.55) {
                    if model.insert(key) {
                        tree.insert(key);
                    }
                } else {
                    let expected = if model.is_empty() {
                        Err(BTreeError::EmptyTreeDelete)
                    } else if model.remove(&key) {
                        Ok(key)
                    } else {
                        Err(BTreeError::KeyNotFound)
                    };
                    assert_eq!(tree.delete(&key), expected);
                }
                tree.check_invariants().expect("invariants hold");
                assert_eq!(tree.contains(&key), model.contains(&key));
            }

            assert_eq!(tree.len(), model.len());
            assert_eq!(sorted_keys(&tree), model.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_duplicate_insert_stores_second_occurrence() {
        let mut tree = tree_with(4, &[5, 1, 9]);
        tree.insert(5);

        assert_eq!(tree.len(), 4);
        assert_eq!(sorted_keys(&tree), vec![1, 5, 5, 9]);

        tree.delete(&5).expect("present");
        assert!(tree.contains(&5));
        tree.delete(&5).expect("present");
        assert!(!tree.contains(&5));
        tree.check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_clear() {
        let mut tree = tree_with(4, &[1, 2, 3, 4, 5, 6]);
        tree.clear();

        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.delete(&1), Err(BTreeError::EmptyTreeDelete));
    }
}
