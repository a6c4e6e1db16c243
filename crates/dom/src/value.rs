//! Dynamically typed values exchanged with host code
//!
//! Field setters and `appendChild` accept a `Value` so that the kind
//! checks a binding layer relies on live in one place.

use crate::node::{Node, NodeList};
use crate::types::Attributes;

#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Map(Attributes),
    /// Generic host sequence, elements not yet validated
    Seq(Vec<Value>),
    /// Shared children list
    List(NodeList),
    Node(Node),
}

impl Value {
    /// Name used when reporting type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Map(_) => "mapping",
            Value::Seq(_) => "sequence",
            Value::List(_) => "node list",
            Value::Node(node) => node.kind().type_name(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&NodeList> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Attributes> for Value {
    fn from(value: Attributes) -> Self {
        Value::Map(value)
    }
}

impl From<NodeList> for Value {
    fn from(value: NodeList) -> Self {
        Value::List(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::from(3i64).type_name(), "integer");
        assert_eq!(Value::Map(Attributes::new()).type_name(), "mapping");
        assert_eq!(Value::from(Node::new_text("t")).type_name(), "text node");
        assert_eq!(Value::from(Node::new_element("p")).type_name(), "element node");
        assert_eq!(Value::from(NodeList::new()).type_name(), "node list");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(true).as_str(), None);
        assert_eq!(Value::from(7i64).as_int(), Some(7));
        assert!(Value::from(Node::new()).as_node().is_some());
    }
}
