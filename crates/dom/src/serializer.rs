//! Tree serializer - render a node tree for humans and tooling
//!
//! This module handles:
//! - Indented outline rendering (`<tag attr="v">` ... `</tag>`)
//! - Serde snapshots of a tree, exported as JSON
//! - Back-edges of cyclic trees, which are marked instead of followed

use crate::error::{DomError, Result};
use crate::node::Node;
use crate::types::{Attributes, NodeType};
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Serializer configuration
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Deepest nesting rendered before giving up
    pub max_depth: usize,
    pub max_text_length: usize,
    pub include_attributes: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_depth: 512,
            max_text_length: 200,
            include_attributes: true,
        }
    }
}

/// Serializable image of a subtree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeSnapshot {
    Node {
        uuid: Uuid,
        #[serde(rename = "nodeType")]
        node_type: NodeType,
        #[serde(rename = "nodeName")]
        node_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        attributes: Option<BTreeMap<String, String>>,
        children: Vec<NodeSnapshot>,
    },
    /// Edge back to an ancestor already being serialized
    Ref {
        #[serde(rename = "ref")]
        target: Uuid,
    },
}

/// Node tree serializer
pub struct TreeSerializer {
    config: SerializerConfig,
}

impl TreeSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Render an indented outline of the tree
    pub fn serialize(&self, root: &Node) -> Result<String> {
        let mut output = String::with_capacity(4096);
        let mut ancestors = AHashSet::new();
        self.serialize_node(root, 0, &mut ancestors, &mut output)?;
        Ok(output)
    }

    fn serialize_node(
        &self,
        node: &Node,
        depth: usize,
        ancestors: &mut AHashSet<Node>,
        output: &mut String,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let indent = "  ".repeat(depth);

        if ancestors.contains(node) {
            output.push_str(&indent);
            output.push_str(&format!("<{}> (cycle)\n", node.node_name()));
            return Ok(());
        }

        if let Some(data) = node.data() {
            let text = data.trim();
            if !text.is_empty() {
                output.push_str(&indent);
                output.push_str(&cap_text_length(text, self.config.max_text_length));
                output.push('\n');
            }
        } else {
            // Format: <tag id="123" class="foo">
            output.push_str(&indent);
            output.push('<');
            output.push_str(&node.node_name());
            if self.config.include_attributes {
                for (name, value) in sorted(node.attributes().unwrap_or_default()) {
                    output.push_str(&format!(" {}=\"{}\"", name, value));
                }
            }
            output.push_str(">\n");
        }

        ancestors.insert(node.clone());
        for child in node.children().iter() {
            self.serialize_node(&child, depth + 1, ancestors, output)?;
        }
        ancestors.remove(node);

        if !node.is_text() {
            output.push_str(&indent);
            output.push_str("</");
            output.push_str(&node.node_name());
            output.push_str(">\n");
        }

        Ok(())
    }

    /// Capture a serializable snapshot of the tree
    pub fn snapshot(&self, root: &Node) -> Result<NodeSnapshot> {
        let mut ancestors = AHashSet::new();
        self.snapshot_node(root, 0, &mut ancestors)
    }

    fn snapshot_node(
        &self,
        node: &Node,
        depth: usize,
        ancestors: &mut AHashSet<Node>,
    ) -> Result<NodeSnapshot> {
        self.check_depth(depth)?;

        if ancestors.contains(node) {
            return Ok(NodeSnapshot::Ref { target: node.uuid() });
        }

        ancestors.insert(node.clone());
        let children = node
            .children()
            .iter()
            .map(|child| self.snapshot_node(&child, depth + 1, ancestors))
            .collect::<Result<Vec<_>>>();
        ancestors.remove(node);

        let attributes = if self.config.include_attributes {
            node.attributes().map(sorted)
        } else {
            None
        };

        Ok(NodeSnapshot::Node {
            uuid: node.uuid(),
            node_type: node.node_type(),
            node_name: node.node_name(),
            data: node.data(),
            attributes,
            children: children?,
        })
    }

    /// Snapshot rendered as pretty JSON
    pub fn to_json(&self, root: &Node) -> Result<String> {
        let snapshot = self.snapshot(root)?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(DomError::MaxDepthExceeded {
                current: depth,
                max: self.config.max_depth,
            });
        }
        Ok(())
    }
}

impl Default for TreeSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(attributes: Attributes) -> BTreeMap<String, String> {
    attributes.into_iter().collect()
}

/// Cap text length to keep outlines readable
pub fn cap_text_length(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        None => text.to_string(),
        Some((end, _)) => format!("{}...", &text[..end]),
    }
}
