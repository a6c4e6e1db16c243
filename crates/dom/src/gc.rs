//! Thread-local cycle collector
//!
//! Reference counting alone never frees a node that is reachable from
//! itself. Every node is tracked here on allocation, and [`collect`] runs
//! a trial-deletion pass over the tracked set:
//!
//! ```text
//! refs(x)      = strong_count(x) - handles held by the pass itself
//! refs(x)     -= edges from other tracked objects   (via Node::traverse)
//! refs(x) > 0  → reachable from outside the heap    (root)
//! roots        → propagate reachability along edges
//! the rest     → Node::clear, then released by ordinary refcounting
//! ```
//!
//! Children lists take part as objects of their own, because a caller
//! holding a `NodeList` keeps its members alive.

use crate::node::{Node, NodeCell, NodeList};
use ahash::AHashMap;
use serde::Serialize;
use std::cell::RefCell;
use std::rc;

/// Collector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Allocations between automatic passes; 0 disables them
    pub threshold: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { threshold: 700 }
    }
}

/// Outcome of one collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    /// Live nodes examined
    pub tracked: usize,
    /// Nodes found unreachable and cleared
    pub unreachable: usize,
}

const MIN_PRUNE_AT: usize = 1024;

struct Heap {
    tracked: Vec<rc::Weak<NodeCell>>,
    allocations: usize,
    prune_at: usize,
    config: CollectorConfig,
    collecting: bool,
}

impl Default for Heap {
    fn default() -> Self {
        Self {
            tracked: Vec::new(),
            allocations: 0,
            prune_at: MIN_PRUNE_AT,
            config: CollectorConfig::default(),
            collecting: false,
        }
    }
}

impl Heap {
    fn prune(&mut self) {
        self.tracked.retain(|weak| weak.strong_count() > 0);
        self.prune_at = (self.tracked.len() * 2).max(MIN_PRUNE_AT);
    }
}

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::default());
}

/// Replace this thread's collector configuration
pub fn configure(config: CollectorConfig) {
    HEAP.with(|heap| heap.borrow_mut().config = config);
}

pub fn config() -> CollectorConfig {
    HEAP.with(|heap| heap.borrow().config)
}

/// Nodes currently alive on this thread
pub fn tracked_count() -> usize {
    HEAP.with(|heap| {
        heap.borrow()
            .tracked
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    })
}

/// Register a freshly allocated node; may trigger an automatic pass
pub(crate) fn track(node: &Node) {
    let due = HEAP
        .try_with(|heap| {
            let mut heap = heap.borrow_mut();
            heap.tracked.push(node.downgrade_raw());
            if heap.tracked.len() >= heap.prune_at {
                heap.prune();
            }
            heap.allocations += 1;

            let threshold = heap.config.threshold;
            threshold > 0 && heap.allocations >= threshold && !heap.collecting
        })
        .unwrap_or(false);

    if due {
        collect();
    }
}

/// Find and reclaim unreachable cycles on this thread
///
/// Not re-entrant: a call made while a pass is running (for instance
/// from a weak-reference callback) returns empty stats.
pub fn collect() -> CollectStats {
    let nodes = HEAP.with(|heap| {
        let mut heap = heap.borrow_mut();
        if heap.collecting {
            return None;
        }
        heap.collecting = true;
        heap.allocations = 0;
        heap.prune();
        Some(
            heap.tracked
                .iter()
                .filter_map(rc::Weak::upgrade)
                .map(Node::from_cell)
                .collect::<Vec<_>>(),
        )
    });

    let Some(nodes) = nodes else {
        tracing::trace!("collection already running, skipped");
        return CollectStats::default();
    };
    let _guard = CollectingGuard;

    let unreachable = find_unreachable(&nodes);
    let stats = CollectStats {
        tracked: nodes.len(),
        unreachable: unreachable.len(),
    };

    for node in &unreachable {
        node.clear();
    }
    drop(unreachable);
    drop(nodes);

    tracing::debug!(
        tracked = stats.tracked,
        unreachable = stats.unreachable,
        "cycle collection finished"
    );
    stats
}

/// Clears the `collecting` flag even if a weak callback panics mid-pass
struct CollectingGuard;

impl Drop for CollectingGuard {
    fn drop(&mut self) {
        let _ = HEAP.try_with(|heap| heap.borrow_mut().collecting = false);
    }
}

enum Work {
    Node(usize),
    List(usize),
}

/// Trial deletion over `nodes`, which must hold one handle per node
fn find_unreachable(nodes: &[Node]) -> Vec<Node> {
    let node_index: AHashMap<*const (), usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.as_ptr(), idx))
        .collect();

    // One handle per distinct children list
    let mut lists: Vec<NodeList> = Vec::new();
    let mut list_index: AHashMap<*const (), usize> = AHashMap::new();
    let mut owned_list: Vec<Option<usize>> = Vec::with_capacity(nodes.len());

    for node in nodes {
        let mut slot = None;
        node.traverse(|list| {
            let idx = *list_index.entry(list.as_ptr()).or_insert_with(|| {
                lists.push(list.clone());
                lists.len() - 1
            });
            slot = Some(idx);
        });
        owned_list.push(slot);
    }

    let members: Vec<Vec<usize>> = lists
        .iter()
        .map(|list| {
            list.borrow()
                .iter()
                .filter_map(|child| node_index.get(&child.as_ptr()).copied())
                .collect()
        })
        .collect();

    let mut node_refs: Vec<isize> = nodes
        .iter()
        .map(|node| node.strong_count() as isize - 1)
        .collect();
    let mut list_refs: Vec<isize> = lists
        .iter()
        .map(|list| list.strong_count() as isize - 1)
        .collect();

    for &list_idx in owned_list.iter().flatten() {
        list_refs[list_idx] -= 1;
    }
    for list_members in &members {
        for &node_idx in list_members {
            node_refs[node_idx] -= 1;
        }
    }

    let mut stack: Vec<Work> = Vec::new();
    stack.extend((0..nodes.len()).filter(|&i| node_refs[i] > 0).map(Work::Node));
    stack.extend((0..lists.len()).filter(|&i| list_refs[i] > 0).map(Work::List));

    let mut node_reachable = vec![false; nodes.len()];
    let mut list_reachable = vec![false; lists.len()];

    while let Some(work) = stack.pop() {
        match work {
            Work::Node(idx) => {
                if node_reachable[idx] {
                    continue;
                }
                node_reachable[idx] = true;
                if let Some(list_idx) = owned_list[idx] {
                    stack.push(Work::List(list_idx));
                }
            }
            Work::List(idx) => {
                if list_reachable[idx] {
                    continue;
                }
                list_reachable[idx] = true;
                stack.extend(members[idx].iter().copied().map(Work::Node));
            }
        }
    }

    nodes
        .iter()
        .zip(node_reachable)
        .filter(|(_, reachable)| !reachable)
        .map(|(node, _)| node.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn manual() {
        configure(CollectorConfig { threshold: 0 });
    }

    #[test]
    fn test_self_cycle_is_reclaimed() {
        manual();
        let node = Node::new();
        node.append_child(&node);
        let weak = node.downgrade();

        drop(node);
        assert!(!weak.is_gone(), "self-reference keeps the node alive");

        let stats = collect();
        assert_eq!(stats.unreachable, 1);
        assert!(weak.is_gone());
        assert_eq!(tracked_count(), 0);
    }

    #[test]
    fn test_cycle_with_external_root_survives() {
        manual();
        let a = Node::new_element("a");
        let b = Node::new_element("b");
        a.append_child(&b);
        b.append_child(&a);
        let weak_b = b.downgrade();
        drop(b);

        assert_eq!(collect().unreachable, 0);
        assert_eq!(a.child_count(), 1);
        assert!(!weak_b.is_gone());

        drop(a);
        let stats = collect();
        assert_eq!(stats.unreachable, 2);
        assert!(weak_b.is_gone());
    }

    #[test]
    fn test_external_children_list_is_a_root() {
        manual();
        let node = Node::new();
        node.append_child(&node);
        let list = node.children();
        let weak = node.downgrade();
        drop(node);

        assert_eq!(collect().unreachable, 0);
        assert!(!weak.is_gone());

        drop(list);
        assert_eq!(collect().unreachable, 1);
        assert!(weak.is_gone());
    }

    #[test]
    fn test_acyclic_trees_are_left_alone() {
        manual();
        let parent = Node::new_element("ul");
        let child = Node::new_element("li");
        parent.append_child(&child);
        drop(child);

        let stats = collect();
        assert_eq!(stats, CollectStats { tracked: 2, unreachable: 0 });
        assert_eq!(parent.child_count(), 1);
    }

    #[test]
    fn test_cycle_hanging_off_a_dead_node_is_reclaimed() {
        manual();
        let root = Node::new();
        let looped = Node::new_text("loop");
        looped.append_child(&looped);
        root.append_child(&looped);
        let weak = looped.downgrade();
        drop(looped);
        drop(root);

        assert!(!weak.is_gone());
        collect();
        assert!(weak.is_gone());
    }

    #[test]
    fn test_collection_is_not_reentrant() {
        manual();
        let node = Node::new();
        node.append_child(&node);

        let nested = Rc::new(Cell::new(None));
        let sink = Rc::clone(&nested);
        let _observer = node.downgrade_with(move |_| {
            let _scratch = Node::new_text("allocated during teardown");
            sink.set(Some(collect()));
        });
        drop(node);

        assert_eq!(collect().unreachable, 1);
        assert_eq!(nested.get(), Some(CollectStats::default()));
    }

    #[test]
    fn test_dropped_observer_does_not_pin_its_parent() {
        manual();
        let a = Node::new_text("a");
        let b = Node::new_element("b");
        b.append_child(&a);

        let captured = b.clone();
        let observer = a.downgrade_with(move |_| {
            let _ = &captured;
        });
        let weak_a = a.downgrade();
        let weak_b = b.downgrade();

        drop(observer);
        drop(a);
        drop(b);
        collect();

        assert!(weak_a.is_gone());
        assert!(weak_b.is_gone());
        assert_eq!(tracked_count(), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_wedge_collector() {
        manual();
        let node = Node::new();
        node.append_child(&node);
        let _observer = node.downgrade_with(|_| panic!("callback failure"));
        drop(node);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(collect));
        assert!(outcome.is_err());

        let again = Node::new();
        again.append_child(&again);
        let weak = again.downgrade();
        drop(again);

        assert_eq!(collect().unreachable, 1);
        assert!(weak.is_gone());
    }

    #[test]
    fn test_automatic_collection_after_threshold() {
        configure(CollectorConfig { threshold: 8 });
        let node = Node::new();
        node.append_child(&node);
        let weak = node.downgrade();
        drop(node);

        let _filler: Vec<Node> = (0..16).map(|_| Node::new()).collect();
        assert!(weak.is_gone());
    }

    #[test]
    fn test_default_config() {
        assert_eq!(CollectorConfig::default().threshold, 700);
    }
}
