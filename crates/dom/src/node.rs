//! Reference-counted node handles and their children lists
//!
//! ## Ownership
//!
//! ```text
//! Node ──Rc──▶ NodeCell ──RefCell──▶ NodeList ──Rc──▶ [Node, Node, ...]
//!                  │
//!                  └── payload: Raw | Text { data } | Element { tag_name, attributes }
//! ```
//!
//! A `Node` is a cheap handle; cloning it shares the node. A `NodeList`
//! is shared the same way, so reading `children` hands out the live list
//! rather than a copy. Nothing stops a node from being appended under its
//! own subtree; such cycles are reclaimed by [`crate::gc::collect`] through
//! the [`Node::traverse`] and [`Node::clear`] hooks.

use crate::error::{DomError, Result};
use crate::gc;
use crate::types::{Attributes, NodeKind, NodeType};
use crate::value::Value;
use crate::weak::{WeakNode, WeakRegistry};
use smallvec::SmallVec;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{self, Rc};
use uuid::Uuid;

/// Field names understood by [`Node::get`], [`Node::set`] and [`Node::construct`]
pub mod fields {
    pub const CHILDREN: &str = "children";
    pub const NODE_TYPE: &str = "nodeType";
    pub const NODE_NAME: &str = "nodeName";
    pub const DATA: &str = "data";
    pub const TAG_NAME: &str = "tagName";
    pub const ATTRIBUTES: &str = "attributes";
}

use fields::{ATTRIBUTES, CHILDREN, DATA, NODE_NAME, NODE_TYPE, TAG_NAME};

/// `nodeName` of the raw base node
pub const RAW_NODE_NAME: &str = "#node";
/// `nodeName` of every text node
pub const TEXT_NODE_NAME: &str = "#text";

const APPEND_CHILD: &str = "appendChild";

type Children = SmallVec<[Node; 4]>; // Most nodes have <4 children

/// Kind-specific payload
#[derive(Debug)]
enum Payload {
    Raw,
    Text {
        data: String,
    },
    Element {
        tag_name: String,
        attributes: Attributes,
    },
}

impl Payload {
    fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Node => Payload::Raw,
            NodeKind::Text => Payload::Text {
                data: String::new(),
            },
            NodeKind::Element => Payload::Element {
                tag_name: String::new(),
                attributes: Attributes::new(),
            },
        }
    }
}

/// Shared storage behind a [`Node`] handle
pub(crate) struct NodeCell {
    uuid: Uuid,
    kind: NodeKind,
    children: RefCell<NodeList>,
    payload: RefCell<Payload>,
    /// Created on first `downgrade`
    weak_refs: RefCell<Option<WeakRegistry>>,
}

impl NodeCell {
    /// Invalidate weak observers; must run before anything is released
    fn begin_teardown(&self) {
        let registry = self.weak_refs.borrow_mut().take();
        if let Some(registry) = registry {
            registry.invalidate(self.uuid);
        }
    }

    fn take_children(&self) -> NodeList {
        std::mem::take(&mut *self.children.borrow_mut())
    }
}

impl Drop for NodeCell {
    fn drop(&mut self) {
        self.begin_teardown();

        // Release the subtree with an explicit stack instead of recursing
        // through nested drops, so deep trees can't overflow.
        let mut pending: Vec<Node> = Vec::new();
        release_list(self.take_children(), &mut pending);

        while let Some(node) = pending.pop() {
            if Rc::strong_count(&node.0) == 1 {
                node.0.begin_teardown();
                release_list(node.0.take_children(), &mut pending);
            }
            drop(node);
        }

        tracing::trace!(node = %self.uuid, kind = %self.kind, "node released");
    }
}

/// Move a list's nodes onto `pending` if this was its last handle
fn release_list(list: NodeList, pending: &mut Vec<Node>) {
    if let Ok(children) = Rc::try_unwrap(list.0) {
        pending.extend(children.into_inner());
    }
}

/// Owning handle to a node of any kind
#[derive(Clone)]
pub struct Node(Rc<NodeCell>);

impl Node {
    /// Allocate a node with empty defaults and register it with the collector
    ///
    /// The node is valid before any caller-supplied value is applied.
    fn allocate(kind: NodeKind) -> Self {
        let node = Node(Rc::new(NodeCell {
            uuid: Uuid::new_v4(),
            kind,
            children: RefCell::new(NodeList::new()),
            payload: RefCell::new(Payload::empty(kind)),
            weak_refs: RefCell::new(None),
        }));
        gc::track(&node);
        node
    }

    pub(crate) fn from_cell(cell: Rc<NodeCell>) -> Self {
        Node(cell)
    }

    /// Untracked weak pointer, invisible to `weak_count`
    pub(crate) fn downgrade_raw(&self) -> rc::Weak<NodeCell> {
        Rc::downgrade(&self.0)
    }

    /// Raw base node with an unspecified type
    pub fn new() -> Self {
        Self::allocate(NodeKind::Node)
    }

    pub fn new_text(data: impl Into<String>) -> Self {
        let node = Self::allocate(NodeKind::Text);
        *node.0.payload.borrow_mut() = Payload::Text { data: data.into() };
        node
    }

    pub fn new_element(tag_name: impl Into<String>) -> Self {
        Self::new_element_with_attributes(tag_name, Attributes::new())
    }

    pub fn new_element_with_attributes(tag_name: impl Into<String>, attributes: Attributes) -> Self {
        let node = Self::allocate(NodeKind::Element);
        *node.0.payload.borrow_mut() = Payload::Element {
            tag_name: tag_name.into(),
            attributes,
        };
        node
    }

    /// Build a node from named, dynamically typed arguments
    ///
    /// Defaults are in place before any argument is applied. `tagName` is
    /// applied before everything else. If an argument is rejected the
    /// partially built node is dropped through the normal teardown path.
    pub fn construct<K, I>(kind: NodeKind, kwargs: I) -> Result<Self>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let node = Self::allocate(kind);

        let mut kwargs: Vec<(K, Value)> = kwargs.into_iter().collect();
        kwargs.sort_by_key(|(name, _)| name.as_ref() != TAG_NAME);

        for (name, value) in kwargs {
            let name = name.as_ref();
            if !Self::keywords(kind).iter().any(|keyword| *keyword == name) {
                return Err(DomError::UnexpectedKeyword {
                    kind: kind.type_name().to_string(),
                    keyword: name.to_string(),
                });
            }
            node.set(name, Some(value))?;
        }

        Ok(node)
    }

    fn keywords(kind: NodeKind) -> &'static [&'static str] {
        match kind {
            NodeKind::Node => &[CHILDREN],
            NodeKind::Text => &[CHILDREN, DATA],
            NodeKind::Element => &[CHILDREN, TAG_NAME, ATTRIBUTES],
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.0.kind.node_type()
    }

    /// `#text` for text, the tag name for elements, `#node` otherwise
    pub fn node_name(&self) -> String {
        match &*self.0.payload.borrow() {
            Payload::Raw => RAW_NODE_NAME.to_string(),
            Payload::Text { .. } => TEXT_NODE_NAME.to_string(),
            Payload::Element { tag_name, .. } => tag_name.clone(),
        }
    }

    /// Stable identity assigned at allocation
    pub fn uuid(&self) -> Uuid {
        self.0.uuid
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == NodeKind::Text
    }

    pub fn is_element(&self) -> bool {
        self.0.kind == NodeKind::Element
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    // ----- children -----

    /// The live children list, shared rather than copied
    pub fn children(&self) -> NodeList {
        self.0.children.borrow().clone()
    }

    /// Replace the children list wholesale
    pub fn set_children(&self, children: NodeList) {
        let previous = std::mem::replace(&mut *self.0.children.borrow_mut(), children);
        drop(previous);
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    /// Append `child` to the end of the children list
    ///
    /// No ancestry check is made: appending a node under itself is
    /// accepted and produces a cycle.
    pub fn append_child(&self, child: &Node) {
        self.children().push(child.clone());
    }

    /// `appendChild` for a dynamically typed candidate
    pub fn append_child_value(&self, candidate: Value) -> Result<()> {
        match candidate {
            Value::Node(child) => {
                self.append_child(&child);
                Ok(())
            }
            other => Err(DomError::type_mismatch(APPEND_CHILD, "node", other.type_name())),
        }
    }

    // ----- text payload -----

    pub fn data(&self) -> Option<String> {
        match &*self.0.payload.borrow() {
            Payload::Text { data } => Some(data.clone()),
            _ => None,
        }
    }

    pub fn set_data(&self, value: impl Into<String>) -> Result<()> {
        match &mut *self.0.payload.borrow_mut() {
            Payload::Text { data } => {
                *data = value.into();
                Ok(())
            }
            _ => Err(self.wrong_kind(NodeKind::Text)),
        }
    }

    pub fn reset_data(&self) -> Result<()> {
        self.set_data(String::new())
    }

    // ----- element payload -----

    pub fn tag_name(&self) -> Option<String> {
        match &*self.0.payload.borrow() {
            Payload::Element { tag_name, .. } => Some(tag_name.clone()),
            _ => None,
        }
    }

    /// Set the tag name; `nodeName` follows it
    pub fn set_tag_name(&self, value: impl Into<String>) -> Result<()> {
        match &mut *self.0.payload.borrow_mut() {
            Payload::Element { tag_name, .. } => {
                *tag_name = value.into();
                Ok(())
            }
            _ => Err(self.wrong_kind(NodeKind::Element)),
        }
    }

    pub fn reset_tag_name(&self) -> Result<()> {
        self.set_tag_name(String::new())
    }

    pub fn attributes(&self) -> Option<Attributes> {
        match &*self.0.payload.borrow() {
            Payload::Element { attributes, .. } => Some(attributes.clone()),
            _ => None,
        }
    }

    pub fn set_attributes(&self, value: Attributes) -> Result<()> {
        let previous = match &mut *self.0.payload.borrow_mut() {
            Payload::Element { attributes, .. } => std::mem::replace(attributes, value),
            _ => return Err(self.wrong_kind(NodeKind::Element)),
        };
        drop(previous);
        Ok(())
    }

    pub fn reset_attributes(&self) -> Result<()> {
        self.set_attributes(Attributes::new())
    }

    /// Get a single attribute value
    pub fn attribute(&self, name: &str) -> Option<String> {
        match &*self.0.payload.borrow() {
            Payload::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        match &mut *self.0.payload.borrow_mut() {
            Payload::Element { attributes, .. } => {
                attributes.insert(name.into(), value.into());
                Ok(())
            }
            _ => Err(self.wrong_kind(NodeKind::Element)),
        }
    }

    pub fn remove_attribute(&self, name: &str) -> Result<Option<String>> {
        match &mut *self.0.payload.borrow_mut() {
            Payload::Element { attributes, .. } => Ok(attributes.remove(name)),
            _ => Err(self.wrong_kind(NodeKind::Element)),
        }
    }

    fn wrong_kind(&self, expected: NodeKind) -> DomError {
        DomError::InvalidNodeType {
            expected: expected.type_name().to_string(),
            actual: self.0.kind.type_name().to_string(),
        }
    }

    // ----- dynamic field access -----

    /// Read a field by name
    pub fn get(&self, field: &str) -> Result<Value> {
        match field {
            CHILDREN => return Ok(Value::List(self.children())),
            NODE_TYPE => return Ok(Value::Int(i64::from(self.node_type().as_u8()))),
            NODE_NAME => return Ok(Value::Str(self.node_name())),
            _ => {}
        }

        match (field, &*self.0.payload.borrow()) {
            (DATA, Payload::Text { data }) => Ok(Value::Str(data.clone())),
            (TAG_NAME, Payload::Element { tag_name, .. }) => Ok(Value::Str(tag_name.clone())),
            (ATTRIBUTES, Payload::Element { attributes, .. }) => Ok(Value::Map(attributes.clone())),
            _ => Err(self.unknown_field(field)),
        }
    }

    /// Assign a field by name; `None` is the delete path
    ///
    /// Deleting `children` is an error. Deleting `data`, `tagName` or
    /// `attributes` resets them to empty and succeeds.
    pub fn set(&self, field: &str, value: Option<Value>) -> Result<()> {
        let kind = self.0.kind;
        match field {
            CHILDREN => {
                let list = match value {
                    None => return Err(DomError::CannotDelete(CHILDREN.to_string())),
                    Some(Value::List(list)) => list,
                    Some(Value::Seq(items)) => NodeList::from_values(items)?,
                    Some(other) => {
                        return Err(DomError::type_mismatch(CHILDREN, "node list", other.type_name()))
                    }
                };
                self.set_children(list);
                Ok(())
            }
            NODE_TYPE | NODE_NAME => Err(DomError::ReadOnly(field.to_string())),
            DATA if kind == NodeKind::Text => match value {
                None => self.reset_data(),
                Some(Value::Str(data)) => self.set_data(data),
                Some(other) => Err(DomError::type_mismatch(DATA, "string", other.type_name())),
            },
            TAG_NAME if kind == NodeKind::Element => match value {
                None => self.reset_tag_name(),
                Some(Value::Str(tag_name)) => self.set_tag_name(tag_name),
                Some(other) => Err(DomError::type_mismatch(TAG_NAME, "string", other.type_name())),
            },
            ATTRIBUTES if kind == NodeKind::Element => match value {
                None => self.reset_attributes(),
                Some(Value::Map(attributes)) => self.set_attributes(attributes),
                Some(other) => Err(DomError::type_mismatch(ATTRIBUTES, "mapping", other.type_name())),
            },
            _ => Err(self.unknown_field(field)),
        }
    }

    fn unknown_field(&self, field: &str) -> DomError {
        DomError::UnknownField {
            kind: self.0.kind.type_name().to_string(),
            field: field.to_string(),
        }
    }

    // ----- weak references -----

    pub fn downgrade(&self) -> WeakNode {
        self.register_weak(None)
    }

    /// Weak reference whose callback runs when teardown begins
    ///
    /// The callback is dropped unrun if the returned handle goes away first.
    pub fn downgrade_with(&self, callback: impl FnOnce(Uuid) + 'static) -> WeakNode {
        self.register_weak(Some(Box::new(callback)))
    }

    fn register_weak(&self, callback: Option<crate::weak::WeakCallback>) -> WeakNode {
        self.0
            .weak_refs
            .borrow_mut()
            .get_or_insert_with(WeakRegistry::default)
            .register(Rc::downgrade(&self.0), callback)
    }

    /// Number of weak handles currently observing this node
    pub fn weak_count(&self) -> usize {
        self.0
            .weak_refs
            .borrow()
            .as_ref()
            .map_or(0, WeakRegistry::live_count)
    }

    // ----- collector hooks -----

    /// Visit every strong reference this node owns
    pub fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(&NodeList),
    {
        let children = self.children();
        visit(&children);
    }

    /// Drop the owned children list, leaving an empty one
    ///
    /// Children are released only if nothing else holds them.
    pub fn clear(&self) {
        let previous = self.0.take_children();
        drop(previous);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.payload.borrow() {
            Payload::Raw => f.write_str(RAW_NODE_NAME),
            Payload::Text { data } => write!(f, "{}: '{}'", TEXT_NODE_NAME, data),
            Payload::Element { tag_name, .. } => write!(f, "<{}>", tag_name),
        }
    }
}

/// Text nodes render as their data; other kinds as their debug form
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.payload.borrow() {
            Payload::Text { data } => f.write_str(data),
            _ => fmt::Debug::fmt(self, f),
        }
    }
}

/// Shared, ordered list of child nodes
///
/// Cloning shares the list. Only `Node`s can be stored, so the list is
/// always a valid children sequence.
#[derive(Clone, Default)]
pub struct NodeList(Rc<RefCell<Children>>);

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from host values, rejecting anything that isn't a node
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut children = Children::with_capacity(values.len());
        for value in values {
            match value {
                Value::Node(node) => children.push(node),
                other => return Err(DomError::type_mismatch(CHILDREN, "node", other.type_name())),
            }
        }
        Ok(NodeList(Rc::new(RefCell::new(children))))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.0.borrow().get(index).cloned()
    }

    pub fn first(&self) -> Option<Node> {
        self.0.borrow().first().cloned()
    }

    pub fn last(&self) -> Option<Node> {
        self.0.borrow().last().cloned()
    }

    pub fn push(&self, node: Node) {
        self.0.borrow_mut().push(node);
    }

    /// Identity membership test
    pub fn contains(&self, node: &Node) -> bool {
        self.0.borrow().iter().any(|child| child.ptr_eq(node))
    }

    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.0.borrow_mut());
        drop(previous);
    }

    /// Snapshot of the current members
    pub fn to_vec(&self) -> Vec<Node> {
        self.0.borrow().to_vec()
    }

    /// Iterate over a snapshot, so the list may be mutated while iterating
    pub fn iter(&self) -> std::vec::IntoIter<Node> {
        self.to_vec().into_iter()
    }

    pub fn ptr_eq(&self, other: &NodeList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, Children> {
        self.0.borrow()
    }
}

impl FromIterator<Node> for NodeList {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        NodeList(Rc::new(RefCell::new(iter.into_iter().collect())))
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}
