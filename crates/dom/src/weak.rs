//! Weak (non-owning) references into a node tree
//!
//! Every node lazily grows a registry of observers. The registry is
//! invalidated as the very first step of teardown, so a `WeakNode` never
//! resolves to a node whose children or payload are being released.

use crate::node::{Node, NodeCell};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{self, Rc};
use uuid::Uuid;

/// Callback run once when the observed node starts tearing down
pub type WeakCallback = Box<dyn FnOnce(Uuid)>;

/// State shared by every clone of one `WeakNode`
///
/// Owned by the handles only; the registry holds a `Weak` to it, so the
/// callback (and whatever it captured) is freed with the last handle.
struct WeakToken {
    alive: Cell<bool>,
    callback: RefCell<Option<WeakCallback>>,
}

/// Non-owning handle to a node
///
/// Resolving never extends the node's lifetime implicitly; `upgrade`
/// hands out a new owning `Node` only while the node is alive.
#[derive(Clone)]
pub struct WeakNode {
    target: rc::Weak<NodeCell>,
    token: Rc<WeakToken>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        if !self.token.alive.get() {
            return None;
        }
        self.target.upgrade().map(Node::from_cell)
    }

    /// True once the node has started teardown
    pub fn is_gone(&self) -> bool {
        !self.token.alive.get() || self.target.strong_count() == 0
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_gone() {
            f.write_str("WeakNode(gone)")
        } else {
            f.write_str("WeakNode(alive)")
        }
    }
}

/// Observers registered against one node
#[derive(Default)]
pub(crate) struct WeakRegistry {
    entries: SmallVec<[rc::Weak<WeakToken>; 2]>,
}

impl WeakRegistry {
    pub(crate) fn register(
        &mut self,
        target: rc::Weak<NodeCell>,
        callback: Option<WeakCallback>,
    ) -> WeakNode {
        self.entries.retain(|entry| entry.strong_count() > 0);

        let token = Rc::new(WeakToken {
            alive: Cell::new(true),
            callback: RefCell::new(callback),
        });
        self.entries.push(Rc::downgrade(&token));
        WeakNode { target, token }
    }

    /// Observers still holding a handle
    pub(crate) fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Mark every observer gone, then run callbacks
    ///
    /// All handles report gone before the first callback executes.
    pub(crate) fn invalidate(self, uuid: Uuid) {
        let tokens: Vec<Rc<WeakToken>> = self.entries.iter().filter_map(rc::Weak::upgrade).collect();
        for token in &tokens {
            token.alive.set(false);
        }

        let callbacks: Vec<WeakCallback> = tokens
            .iter()
            .filter_map(|token| token.callback.borrow_mut().take())
            .collect();
        drop(tokens);

        tracing::trace!(
            node = %uuid,
            callbacks = callbacks.len(),
            "invalidated weak references"
        );

        for callback in callbacks {
            callback(uuid);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Node;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_upgrade_while_alive() {
        let node = Node::new_text("alive");
        let weak = node.downgrade();

        let upgraded = weak.upgrade().unwrap();
        assert!(upgraded.ptr_eq(&node));
        assert!(!weak.is_gone());
    }

    #[test]
    fn test_gone_after_last_strong_reference() {
        let node = Node::new_element("div");
        let weak = node.downgrade();

        drop(node);

        assert!(weak.is_gone());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_callback_sees_observers_already_gone() {
        let node = Node::new();
        let uuid = node.uuid();
        let weak = node.downgrade();
        let seen = Rc::new(RefCell::new(None));

        let probe = weak.clone();
        let sink = Rc::clone(&seen);
        let _observer = node.downgrade_with(move |dead| {
            *sink.borrow_mut() = Some((dead, probe.is_gone()));
        });

        drop(node);

        assert_eq!(*seen.borrow(), Some((uuid, true)));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let node = Node::new();
        let first = node.downgrade();
        let second = node.downgrade();
        assert_eq!(node.weak_count(), 2);

        drop(first);
        assert_eq!(node.weak_count(), 1);

        let _third = node.downgrade();
        assert_eq!(node.weak_count(), 2);
        drop(second);
        assert_eq!(node.weak_count(), 1);
    }

    #[test]
    fn test_callback_freed_with_its_handle() {
        let node = Node::new();
        let captured = Rc::new(());
        let held = Rc::clone(&captured);
        let called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&called);

        let observer = node.downgrade_with(move |_| {
            let _ = &held;
            *flag.borrow_mut() = true;
        });
        assert_eq!(Rc::strong_count(&captured), 2);

        drop(observer);
        assert_eq!(Rc::strong_count(&captured), 1);

        drop(node);
        assert!(!*called.borrow());
    }

    #[test]
    fn test_weak_handle_does_not_keep_children_alive() {
        let parent = Node::new_element("ul");
        let child = Node::new_element("li");
        parent.append_child(&child);
        let weak_child = child.downgrade();

        drop(child);
        assert!(weak_child.upgrade().is_some());

        drop(parent);
        assert!(weak_child.is_gone());
    }
}
