//! Core type definitions shared by every node kind
//!
//! Key design principles:
//! 1. `NodeType` is a closed enumeration, fixed per node at allocation
//! 2. `NodeKind` names the three concrete kinds the crate can build
//! 3. Integer constants mirror `NodeType` for hosts that branch on numbers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Attribute mapping carried by element nodes
pub type Attributes = HashMap<String, String>;

pub const UNSPECIFIED_NODE: u8 = 0;
pub const ELEMENT_NODE: u8 = 1;
pub const ATTRIBUTE_NODE: u8 = 2;
pub const TEXT_NODE: u8 = 3;
pub const CDATA_SECTION_NODE: u8 = 4;
pub const PROCESSING_INSTRUCTION_NODE: u8 = 7;
pub const COMMENT_NODE: u8 = 8;
pub const DOCUMENT_NODE: u8 = 9;
pub const DOCUMENT_TYPE_NODE: u8 = 10;
pub const DOCUMENT_FRAGMENT_NODE: u8 = 11;

/// Node type matching the DOM specification numbering
///
/// Entity reference (5), entity (6) and notation (12) are historical and
/// intentionally absent. `Unspecified` is non-standard and only used by
/// the raw base node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Unspecified = UNSPECIFIED_NODE,
    Element = ELEMENT_NODE,
    Attribute = ATTRIBUTE_NODE,
    Text = TEXT_NODE,
    CdataSection = CDATA_SECTION_NODE,
    ProcessingInstruction = PROCESSING_INSTRUCTION_NODE,
    Comment = COMMENT_NODE,
    Document = DOCUMENT_NODE,
    DocumentType = DOCUMENT_TYPE_NODE,
    DocumentFragment = DOCUMENT_FRAGMENT_NODE,
}

impl NodeType {
    pub const ALL: [NodeType; 10] = [
        NodeType::Unspecified,
        NodeType::Element,
        NodeType::Attribute,
        NodeType::Text,
        NodeType::CdataSection,
        NodeType::ProcessingInstruction,
        NodeType::Comment,
        NodeType::Document,
        NodeType::DocumentType,
        NodeType::DocumentFragment,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            UNSPECIFIED_NODE => Some(NodeType::Unspecified),
            ELEMENT_NODE => Some(NodeType::Element),
            ATTRIBUTE_NODE => Some(NodeType::Attribute),
            TEXT_NODE => Some(NodeType::Text),
            CDATA_SECTION_NODE => Some(NodeType::CdataSection),
            PROCESSING_INSTRUCTION_NODE => Some(NodeType::ProcessingInstruction),
            COMMENT_NODE => Some(NodeType::Comment),
            DOCUMENT_NODE => Some(NodeType::Document),
            DOCUMENT_TYPE_NODE => Some(NodeType::DocumentType),
            DOCUMENT_FRAGMENT_NODE => Some(NodeType::DocumentFragment),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Constant name as published to hosts, e.g. `ELEMENT_NODE`
    pub fn constant_name(self) -> &'static str {
        match self {
            NodeType::Unspecified => "UNSPECIFIED_NODE",
            NodeType::Element => "ELEMENT_NODE",
            NodeType::Attribute => "ATTRIBUTE_NODE",
            NodeType::Text => "TEXT_NODE",
            NodeType::CdataSection => "CDATA_SECTION_NODE",
            NodeType::ProcessingInstruction => "PROCESSING_INSTRUCTION_NODE",
            NodeType::Comment => "COMMENT_NODE",
            NodeType::Document => "DOCUMENT_NODE",
            NodeType::DocumentType => "DOCUMENT_TYPE_NODE",
            NodeType::DocumentFragment => "DOCUMENT_FRAGMENT_NODE",
        }
    }
}

/// The concrete node kinds this crate can construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Raw base node, only useful as a plain container
    Node,
    Text,
    Element,
}

impl NodeKind {
    pub fn node_type(self) -> NodeType {
        match self {
            NodeKind::Node => NodeType::Unspecified,
            NodeKind::Text => NodeType::Text,
            NodeKind::Element => NodeType::Element,
        }
    }

    /// Name used when reporting type errors
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Node => "node",
            NodeKind::Text => "text node",
            NodeKind::Element => "element node",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Published node-type constants, in enumeration order
pub fn node_type_constants() -> impl Iterator<Item = (&'static str, u8)> {
    NodeType::ALL
        .into_iter()
        .map(|ty| (ty.constant_name(), ty.as_u8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_round_trips_every_member() {
        for ty in NodeType::ALL {
            assert_eq!(NodeType::from_u8(ty.as_u8()), Some(ty));
        }
    }

    #[test]
    fn test_omitted_kinds_are_rejected() {
        assert_eq!(NodeType::from_u8(5), None);
        assert_eq!(NodeType::from_u8(6), None);
        assert_eq!(NodeType::from_u8(12), None);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(NodeKind::Text.node_type(), NodeType::Text);
        assert_eq!(NodeKind::Element.node_type().as_u8(), ELEMENT_NODE);
        assert_eq!(NodeKind::Node.node_type(), NodeType::Unspecified);
    }

    #[test]
    fn test_constants_published() {
        let constants: Vec<_> = node_type_constants().collect();
        assert_eq!(constants.len(), 10);
        assert!(constants.contains(&("TEXT_NODE", 3)));
        assert!(constants.contains(&("DOCUMENT_FRAGMENT_NODE", 11)));
    }

    #[test]
    fn test_node_type_serializes_by_name() {
        let json = serde_json::to_string(&NodeType::Comment).unwrap();
        assert_eq!(json, "\"Comment\"");
    }
}
