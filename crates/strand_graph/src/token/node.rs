use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, FixedOffset};

use crate::token::Literal;

// -----------------------------------------------------------------------------
// Node

/// An untyped document tree.
///
/// Objects keep their entries in insertion order. A `Node` is what the
/// reader produces when there is no concrete target type, and it is the
/// in-memory form the [`json`](crate::token::json) helpers convert to and
/// from text.
///
/// # Example
///
/// ```
/// use strand_graph::token::Node;
///
/// let mut node = Node::object([("b", Node::Integer(1)), ("a", Node::Bool(true))]);
/// node.insert("c", Node::Null);
///
/// assert_eq!(node.keys().collect::<Vec<_>>(), ["b", "a", "c"]);
/// assert_eq!(node.get("a"), Some(&Node::Bool(true)));
/// assert_eq!(node.remove("b"), Some(Node::Integer(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    #[default]
    Null,
    Undefined,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(DateTime<FixedOffset>),
    Bytes(Vec<u8>),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl Node {
    /// Builds an object node from name/value pairs.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        Node::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Node::Null | Node::Undefined)
    }

    pub fn as_object(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up an object entry.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.as_object()?
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    /// Object entry names, in order. Empty for non-objects.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_object()
            .unwrap_or_default()
            .iter()
            .map(|(k, _)| k.as_str())
    }

    /// Inserts or replaces an object entry; ignored on non-objects.
    pub fn insert(&mut self, name: impl Into<String>, value: Node) {
        if let Node::Object(entries) = self {
            let name = name.into();
            match entries.iter_mut().find(|(k, _)| *k == name) {
                Some((_, slot)) => *slot = value,
                None => entries.push((name, value)),
            }
        }
    }

    /// Removes an object entry, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let Node::Object(entries) = self else {
            return None;
        };
        let index = entries.iter().position(|(k, _)| k == name)?;
        Some(entries.remove(index).1)
    }

    /// The scalar this node holds, if it is not a container.
    pub fn to_literal(&self) -> Option<Literal> {
        Some(match self {
            Node::Null => Literal::Null,
            Node::Undefined => Literal::Undefined,
            Node::Bool(v) => Literal::Boolean(*v),
            Node::Integer(v) => Literal::Integer(*v),
            Node::Float(v) => Literal::Float(*v),
            Node::String(v) => Literal::String(v.clone()),
            Node::Date(v) => Literal::Date(*v),
            Node::Bytes(v) => Literal::Bytes(v.clone()),
            Node::Array(_) | Node::Object(_) => return None,
        })
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Node::Null,
            Literal::Undefined => Node::Undefined,
            Literal::Boolean(v) => Node::Bool(v),
            Literal::Integer(v) => Node::Integer(v),
            Literal::Float(v) => Node::Float(v),
            Literal::String(v) => Node::String(v),
            Literal::Date(v) => Node::Date(v),
            Literal::Bytes(v) => Node::Bytes(v),
        }
    }
}
