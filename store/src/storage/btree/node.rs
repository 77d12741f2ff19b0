//! B-tree node type and the local restructuring primitives.
//!
//! A node owns its keys and, if internal, exactly one more child than it has
//! keys. The primitives here (split, borrow, merge) each touch a parent and
//! two adjacent children; deciding *when* to apply them is the tree's job.

/// A single B-tree node.
///
/// Leaves have no children. For an internal node:
/// - `children.len()` == `keys.len()` + 1
/// - every key in `children[i]` sorts before `keys[i]`
/// - every key in `children[i + 1]` sorts after `keys[i]`
#[derive(Debug, PartialEq, Eq)]
pub struct Node<K> {
    pub(crate) is_leaf: bool,
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<Self>,
}

impl<K> Node<K> {
    /// Create a new empty leaf.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::new() is not const-stable
    pub fn new_leaf() -> Self {
        Self {
            is_leaf: true,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a new internal node with no keys or children yet.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::new() is not const-stable
    pub fn new_internal() -> Self {
        Self {
            is_leaf: false,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Whether this node is a leaf.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Keys stored in this node, in order.
    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Child nodes (empty for a leaf).
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Number of keys in this node.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is const only on recent toolchains
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Split the full child at `index`, promoting one key into `self`.
    ///
    /// With `split = order / 2`, the new right sibling takes keys
    /// `[split, order - 2]` (and children `[split, order - 1]` when internal),
    /// the key at `split - 1` moves up into `self.keys[index]`, and the
    /// sibling is linked at `self.children[index + 1]`.
    pub(crate) fn split_child(&mut self, index: usize, order: usize) {
        let split = order / 2;
        let full = &mut self.children[index];
        debug_assert_eq!(full.keys.len(), order - 1, "only full nodes are split");

        let sibling = Self {
            is_leaf: full.is_leaf,
            keys: full.keys.split_off(split),
            children: if full.is_leaf {
                Vec::new()
            } else {
                full.children.split_off(split)
            },
        };
        let promoted = full.keys.remove(split - 1);

        self.keys.insert(index, promoted);
        self.children.insert(index + 1, sibling);
    }

    /// Rotate one key from `children[index - 1]` through the parent into
    /// `children[index]`.
    ///
    /// The separator `keys[index - 1]` is prepended to the child, the
    /// sibling's last key replaces it, and the sibling's last child (if any)
    /// becomes the child's first.
    pub(crate) fn borrow_from_prev(&mut self, index: usize) {
        let (left, right) = self.children.split_at_mut(index);
        let sibling = &mut left[index - 1];
        let child = &mut right[0];

        let last = sibling.keys.len() - 1;
        let sibling_key = sibling.keys.remove(last);
        let separator = std::mem::replace(&mut self.keys[index - 1], sibling_key);
        child.keys.insert(0, separator);

        if !child.is_leaf {
            let last_child = sibling.children.len() - 1;
            child.children.insert(0, sibling.children.remove(last_child));
        }
    }

    /// Rotate one key from `children[index + 1]` through the parent into
    /// `children[index]`.
    pub(crate) fn borrow_from_next(&mut self, index: usize) {
        let (left, right) = self.children.split_at_mut(index + 1);
        let child = &mut left[index];
        let sibling = &mut right[0];

        let sibling_key = sibling.keys.remove(0);
        let separator = std::mem::replace(&mut self.keys[index], sibling_key);
        child.keys.push(separator);

        if !child.is_leaf {
            child.children.push(sibling.children.remove(0));
        }
    }

    /// Merge `children[index + 1]` and the separator `keys[index]` into
    /// `children[index]`.
    ///
    /// The separator and the right sibling's slot are removed from `self`.
    pub(crate) fn merge_children(&mut self, index: usize) {
        let separator = self.keys.remove(index);
        let sibling = self.children.remove(index + 1);
        let child = &mut self.children[index];

        child.keys.push(separator);
        child.keys.extend(sibling.keys);
        child.children.extend(sibling.children);
    }
}

impl<K: Ord> Node<K> {
    /// Smallest index `i` such that `keys[i] >= key` (or `keys.len()`).
    #[must_use]
    pub fn lower_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Number of keys `<= key`: where a new occurrence of `key` goes.
    #[must_use]
    pub fn upper_bound(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }
}
