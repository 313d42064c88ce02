//! Hierarchical, self-describing document tree.
//!
//! A [`Node`] is either an insertion-ordered object of named children, a
//! typed array view ([`ArrayView`]), or a text value. Paths use `/` as the
//! separator: `"topologies/main/elements/shape"`.

pub mod view;

pub use view::ArrayView;

use crate::data::buffer::{ArrayData, BufferHandle};
use crate::mesh_error::CheckpointError;

/// A document node.
#[derive(Clone, Debug)]
pub enum Node {
    /// Named children in insertion order.
    Object(Vec<(String, Node)>),
    /// Typed array leaf.
    Array(ArrayView),
    /// Text leaf.
    Text(String),
}

impl Default for Node {
    fn default() -> Self {
        Node::Object(Vec::new())
    }
}

impl Node {
    /// Empty object node.
    pub fn object() -> Self {
        Node::default()
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Node::Array(_))
    }

    pub fn as_array(&self) -> Option<&ArrayView> {
        match self {
            Node::Array(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Direct child by name.
    pub fn child_named(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Object(children) => children.iter().find(|(n, _)| n == name).map(|(_, c)| c),
            _ => None,
        }
    }

    fn child_named_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self {
            Node::Object(children) => children
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, c)| c),
            _ => None,
        }
    }

    /// Descendant at `path`, if present.
    pub fn get(&self, path: &str) -> Option<&Node> {
        split_path(path).try_fold(self, |node, name| node.child_named(name))
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child_named(name).is_some()
    }

    /// Descendant at `path`, or a schema error naming the missing path.
    pub fn fetch(&self, path: &str) -> Result<&Node, CheckpointError> {
        self.get(path)
            .ok_or_else(|| CheckpointError::missing_path(path))
    }

    /// Descendant at `path`, creating empty objects along the way.
    ///
    /// Leaves found on the way are replaced by objects.
    pub fn fetch_mut(&mut self, path: &str) -> &mut Node {
        let mut node = self;
        for name in split_path(path) {
            if !node.is_object() {
                *node = Node::object();
            }
            let Node::Object(children) = node else {
                unreachable!("leaf replaced by an object above")
            };
            let pos = match children.iter().position(|(n, _)| n == name) {
                Some(pos) => pos,
                None => {
                    children.push((name.to_string(), Node::object()));
                    children.len() - 1
                }
            };
            node = &mut children[pos].1;
        }
        node
    }

    /// Replace the node at `path` with `value`.
    pub fn set(&mut self, path: &str, value: impl Into<Node>) {
        *self.fetch_mut(path) = value.into();
    }

    /// Detach the node at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Node> {
        let (parent, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (self.get_mut(parent)?, name),
            None => (self, path),
        };
        match parent {
            Node::Object(children) => {
                let pos = children.iter().position(|(n, _)| n == name)?;
                Some(children.remove(pos).1)
            }
            _ => None,
        }
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        split_path(path).try_fold(self, |node, name| node.child_named_mut(name))
    }

    /// Text leaf at `path`.
    pub fn text(&self, path: &str) -> Result<&str, CheckpointError> {
        self.fetch(path)?
            .as_text()
            .ok_or_else(|| CheckpointError::Schema(format!("\"{path}\" is not a text value")))
    }

    /// Array leaf at `path`.
    pub fn array(&self, path: &str) -> Result<&ArrayView, CheckpointError> {
        self.fetch(path)?
            .as_array()
            .ok_or_else(|| CheckpointError::Schema(format!("\"{path}\" is not an array")))
    }

    /// Integer scalar at `path`.
    pub fn scalar_i64(&self, path: &str) -> Result<i64, CheckpointError> {
        self.array(path)?.scalar_i64()
    }

    /// Number of direct children (0 for leaves).
    pub fn number_of_children(&self) -> usize {
        match self {
            Node::Object(children) => children.len(),
            _ => 0,
        }
    }

    /// `i`-th child in insertion order.
    pub fn child(&self, i: usize) -> Option<&Node> {
        match self {
            Node::Object(children) => children.get(i).map(|(_, c)| c),
            _ => None,
        }
    }

    /// Named children in insertion order; empty for leaves.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        let slice: &[(String, Node)] = match self {
            Node::Object(children) => children,
            _ => &[],
        };
        slice.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// `true` if any array leaf below aliases memory it does not own.
    pub fn has_external(&self) -> bool {
        match self {
            Node::Object(children) => children.iter().any(|(_, c)| c.has_external()),
            Node::Array(view) => view.is_external(),
            Node::Text(_) => false,
        }
    }

    /// Deep copy in which every array is compact and owned.
    pub fn to_owned_tree(&self) -> Result<Node, CheckpointError> {
        Ok(match self {
            Node::Object(children) => Node::Object(
                children
                    .iter()
                    .map(|(n, c)| Ok((n.clone(), c.to_owned_tree()?)))
                    .collect::<Result<_, CheckpointError>>()?,
            ),
            Node::Array(view) => Node::Array(view.compact()?),
            Node::Text(s) => Node::Text(s.clone()),
        })
    }

    /// Structural and value equality, ignoring layout and ownership.
    pub fn same_content(&self, other: &Node) -> Result<bool, CheckpointError> {
        Ok(match (self, other) {
            (Node::Object(a), Node::Object(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((na, ca), (nb, cb)) in a.iter().zip(b) {
                    if na != nb || !ca.same_content(cb)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Node::Array(a), Node::Array(b)) => a.to_data()? == b.to_data()?,
            (Node::Text(a), Node::Text(b)) => a == b,
            _ => false,
        })
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<ArrayView> for Node {
    fn from(view: ArrayView) -> Self {
        Node::Array(view)
    }
}

impl From<ArrayData> for Node {
    fn from(data: ArrayData) -> Self {
        Node::Array(ArrayView::owned(data))
    }
}

impl From<Vec<f64>> for Node {
    fn from(v: Vec<f64>) -> Self {
        Node::Array(ArrayView::owned(v))
    }
}

impl From<Vec<i32>> for Node {
    fn from(v: Vec<i32>) -> Self {
        Node::Array(ArrayView::owned(v))
    }
}

impl From<Vec<i64>> for Node {
    fn from(v: Vec<i64>) -> Self {
        Node::Array(ArrayView::owned(v))
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Node::Array(ArrayView::owned(vec![v]))
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Node::Array(ArrayView::owned(vec![v]))
    }
}

/// Handle identity shared by every array child of `node`, when all of its
/// children are arrays over one buffer.
pub(crate) fn shared_buffer_of(node: &Node) -> Option<&BufferHandle> {
    let mut children = node.children();
    let (_, first) = children.next()?;
    let handle = first.as_array()?.handle();
    for (_, child) in children {
        if !child.as_array()?.handle().same_buffer(handle) {
            return None;
        }
    }
    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::buffer::SharedBuffer;

    #[test]
    fn paths_create_and_resolve_in_insertion_order() {
        let mut n = Node::object();
        n.set("topologies/main/type", "unstructured");
        n.set("coordsets/coords/type", "explicit");
        n.set("topologies/main/elements/connectivity", vec![0i32, 1, 2]);

        let names: Vec<_> = n.children().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["topologies", "coordsets"]);
        assert_eq!(n.text("topologies/main/type").unwrap(), "unstructured");
        assert_eq!(
            n.array("topologies/main/elements/connectivity").unwrap().count(),
            3
        );
        assert!(n.has_path("coordsets/coords"));
        assert!(!n.has_path("coordsets/other"));
        assert!(n.fetch("fields").unwrap_err().is_schema());
        assert!(n.text("topologies/main/elements/connectivity").is_err());
    }

    #[test]
    fn remove_detaches_nested_nodes() {
        let mut n = Node::object();
        n.set("state/cycle", 3i64);
        n.set("state/time", 0.5);
        assert_eq!(n.remove("state/cycle").unwrap().as_array().unwrap().scalar_i64().unwrap(), 3);
        assert_eq!(n.fetch("state").unwrap().number_of_children(), 1);
        assert!(n.remove("state/cycle").is_none());
    }

    #[test]
    fn owned_tree_drops_external_aliases() {
        let buf = SharedBuffer::new(vec![1.0, 2.0]);
        let mut n = Node::object();
        n.set("values", ArrayView::external(&buf, 2, 0, 8).unwrap());
        assert!(n.has_external());
        let owned = n.to_owned_tree().unwrap();
        assert!(!owned.has_external());
        assert!(owned.same_content(&n).unwrap());
    }

    #[test]
    fn shared_buffer_detection() {
        let buf = SharedBuffer::new(vec![0.0; 6]);
        let mut n = Node::object();
        n.set("v0", ArrayView::external(&buf, 3, 0, 16).unwrap());
        n.set("v1", ArrayView::external(&buf, 3, 8, 16).unwrap());
        assert!(shared_buffer_of(&n).is_some());
        n.set("v2", vec![1.0]);
        assert!(shared_buffer_of(&n).is_none());
    }
}
