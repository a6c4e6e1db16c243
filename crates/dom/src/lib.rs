//! Paradisi DOM node model
//!
//! A small, extensible tree of nodes shaped like the W3C DOM hierarchy:
//! a base node with an ordered children list, text nodes, and element
//! nodes carrying a tag name and string attributes.
//!
//! ## Core Design
//!
//! ```text
//! Node (Rc handle) ──▶ payload: Raw | Text | Element
//!        │
//!        ├── children: NodeList (shared)  ──▶ Node, Node, ...
//!        ├── weak observers (lazy)        ──▶ WeakNode
//!        └── tracked by gc                ──▶ collect() reclaims cycles
//! ```
//!
//! Appending performs no ancestry check, so cycles are possible; the
//! thread-local collector in [`gc`] finds and clears them.

pub mod error;
pub mod gc;
pub mod node;
pub mod serializer;
pub mod tree;
pub mod types;
pub mod value;
pub mod weak;

pub use error::{DomError, Result};
pub use gc::{collect, CollectStats, CollectorConfig};
pub use node::{fields, Node, NodeList};
pub use serializer::{NodeSnapshot, SerializerConfig, TreeSerializer};
pub use types::*;
pub use value::Value;
pub use weak::WeakNode;
