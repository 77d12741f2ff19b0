//! Whole-tree snapshot persistence.
//!
//! A snapshot is a single JSON document, recursively nested one object per
//! node:
//!
//! ```json
//! { "order": 5, "isLeaf": false, "keys": [2],
//!   "children": [
//!     { "order": 5, "isLeaf": true, "keys": [1], "children": [] },
//!     { "order": 5, "isLeaf": true, "keys": [3, 4, 5], "children": [] } ] }
//! ```
//!
//! Saving replaces the whole file (write to a temporary sibling, then
//! rename). Loading a missing file yields an empty tree; loading a file that
//! does not parse, or parses but does not describe a valid tree, fails with
//! [`SnapshotError::Corrupt`].

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::storage::btree::{BTree, BTreeError, Node};

/// Owned form of one snapshot node, as decoded from disk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SnapshotDocument<K> {
    pub order: usize,
    pub is_leaf: bool,
    pub keys: Vec<K>,
    pub children: Vec<SnapshotDocument<K>>,
}

/// Borrowed view of a node used for encoding, so saving never copies keys.
struct NodeView<'a, K> {
    order: usize,
    node: &'a Node<K>,
}

impl<K: Serialize> Serialize for NodeView<'_, K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let children: Vec<NodeView<'_, K>> = self
            .node
            .children()
            .iter()
            .map(|node| NodeView {
                order: self.order,
                node,
            })
            .collect();

        let mut state = serializer.serialize_struct("SnapshotDocument", 4)?;
        state.serialize_field("order", &self.order)?;
        state.serialize_field("isLeaf", &self.node.is_leaf())?;
        state.serialize_field("keys", self.node.keys())?;
        state.serialize_field("children", &children)?;
        state.end()
    }
}

/// Encode the tree as a JSON string.
pub fn to_json<K: Serialize>(tree: &BTree<K>) -> Result<String, SnapshotError> {
    let view = NodeView {
        order: tree.order(),
        node: tree.root(),
    };
    serde_json::to_string_pretty(&view).map_err(SnapshotError::Encode)
}

/// Decode and validate a tree from a JSON string.
pub fn from_json<K: Ord + DeserializeOwned>(json: &str) -> Result<BTree<K>, SnapshotError> {
    let document: SnapshotDocument<K> =
        serde_json::from_str(json).map_err(|e| SnapshotError::Corrupt {
            reason: format!("unreadable document: {e}"),
        })?;
    from_document(document)
}

/// Rebuild a tree from a decoded document.
///
/// Fails with [`SnapshotError::Corrupt`] if the document is not a valid tree.
pub fn from_document<K: Ord>(document: SnapshotDocument<K>) -> Result<BTree<K>, SnapshotError> {
    let order = document.order;
    let root = build_node(document, order)?;
    let tree = BTree::from_root(order, root).map_err(|e| SnapshotError::Corrupt {
        reason: e.to_string(),
    })?;
    tree.check_invariants()
        .map_err(|violation| SnapshotError::Corrupt {
            reason: violation.to_string(),
        })?;
    Ok(tree)
}

fn build_node<K>(document: SnapshotDocument<K>, order: usize) -> Result<Node<K>, SnapshotError> {
    if document.order != order {
        return Err(SnapshotError::Corrupt {
            reason: format!("node order {} differs from root order {order}", document.order),
        });
    }
    if document.is_leaf && !document.children.is_empty() {
        return Err(SnapshotError::Corrupt {
            reason: "leaf node has children".to_string(),
        });
    }
    if !document.is_leaf && document.children.len() != document.keys.len() + 1 {
        return Err(SnapshotError::Corrupt {
            reason: format!(
                "internal node has {} children for {} keys",
                document.children.len(),
                document.keys.len()
            ),
        });
    }

    let children = document
        .children
        .into_iter()
        .map(|child| build_node(child, order))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node {
        is_leaf: document.is_leaf,
        keys: document.keys,
        children,
    })
}

/// Write the whole tree to `path`, replacing any previous snapshot.
pub fn save<K: Serialize>(tree: &BTree<K>, path: &Path) -> Result<(), SnapshotError> {
    let view = NodeView {
        order: tree.order(),
        node: tree.root(),
    };
    write_json_atomic(path, &view)?;
    tracing::debug!(path = %path.display(), keys = tree.len(), "saved index snapshot");
    Ok(())
}

/// Load a tree from `path`.
///
/// Returns an empty tree of `default_order` if the file does not exist.
pub fn load<K: Ord + DeserializeOwned>(
    path: &Path,
    default_order: usize,
) -> Result<BTree<K>, SnapshotError> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no snapshot; starting empty");
            return Ok(BTree::new(default_order)?);
        }
        Err(e) => return Err(SnapshotError::Io(e)),
    };
    let tree = from_json(&json)?;
    tracing::debug!(path = %path.display(), keys = tree.len(), "loaded index snapshot");
    Ok(tree)
}

/// Serialize `value` as pretty JSON into `path` via a temporary sibling.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let temp_path = temp_path_for(path);
    let file = fs::File::create(&temp_path).map_err(SnapshotError::Io)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(SnapshotError::Encode)?;
    writer.flush().map_err(SnapshotError::Io)?;
    fs::rename(&temp_path, path).map_err(SnapshotError::Io)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Errors that can occur while saving or loading a snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// File I/O error.
    Io(std::io::Error),
    /// The tree could not be encoded.
    Encode(serde_json::Error),
    /// The document exists but does not describe a valid tree.
    Corrupt { reason: String },
    /// Tree construction error.
    Tree(BTreeError),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "snapshot I/O error: {e}"),
            Self::Encode(e) => write!(f, "snapshot encode error: {e}"),
            Self::Corrupt { reason } => write!(f, "corrupt snapshot: {reason}"),
            Self::Tree(e) => write!(f, "tree error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Corrupt { .. } => None,
            Self::Tree(e) => Some(e),
        }
    }
}

impl From<BTreeError> for SnapshotError {
    fn from(e: BTreeError) -> Self {
        Self::Tree(e)
    }
}
