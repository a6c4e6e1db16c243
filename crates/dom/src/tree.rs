//! Traversal and search over node trees
//!
//! Trees may contain cycles, so every walk keeps a visited set and
//! reaches each node at most once. Walks are iterative (explicit stack
//! or queue), never recursive.

use crate::error::Result;
use crate::node::Node;
use ahash::AHashSet;
use std::collections::VecDeque;
use std::ops::ControlFlow;

/// Depth-first walk that the visitor can stop early
fn walk_df<F>(start: &Node, mut visit: F)
where
    F: FnMut(&Node) -> ControlFlow<()>,
{
    let mut visited = AHashSet::new();
    let mut stack = vec![start.clone()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }
        if visit(&node).is_break() {
            return;
        }

        // Push children in reverse order (so they're visited left-to-right)
        let children = node.children().to_vec();
        stack.extend(children.into_iter().rev());
    }
}

/// Traverse depth-first, pre-order, children left to right
pub fn traverse_df<F>(start: &Node, mut visit: F) -> Result<()>
where
    F: FnMut(&Node) -> Result<()>,
{
    let mut outcome = Ok(());
    walk_df(start, |node| match visit(node) {
        Ok(()) => ControlFlow::Continue(()),
        Err(err) => {
            outcome = Err(err);
            ControlFlow::Break(())
        }
    });
    outcome
}

/// Traverse breadth-first
pub fn traverse_bf<F>(start: &Node, mut visit: F) -> Result<()>
where
    F: FnMut(&Node) -> Result<()>,
{
    let mut visited = AHashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start.clone());

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }
        visit(&node)?;
        queue.extend(node.children().iter());
    }

    Ok(())
}

/// Find nodes under (and including) `root` matching predicate, in document order
pub fn find<F>(root: &Node, predicate: F) -> Vec<Node>
where
    F: Fn(&Node) -> bool,
{
    let mut found = Vec::new();
    walk_df(root, |node| {
        if predicate(node) {
            found.push(node.clone());
        }
        ControlFlow::Continue(())
    });
    found
}

/// Find first node matching predicate, in document order
pub fn find_one<F>(root: &Node, predicate: F) -> Option<Node>
where
    F: Fn(&Node) -> bool,
{
    let mut found = None;
    walk_df(root, |node| {
        if predicate(node) {
            found = Some(node.clone());
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}

/// Find all elements by tag name (ASCII case-insensitive)
pub fn find_by_tag(root: &Node, tag: &str) -> Vec<Node> {
    find(root, |node| {
        node.tag_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    })
}

/// Find element by ID attribute
pub fn find_by_id(root: &Node, id: &str) -> Option<Node> {
    find_one(root, |node| node.attribute("id").as_deref() == Some(id))
}

/// Concatenated data of every text node under `root`
pub fn text_content(root: &Node) -> String {
    let mut text = String::new();
    walk_df(root, |node| {
        if let Some(data) = node.data() {
            text.push_str(&data);
        }
        ControlFlow::Continue(())
    });
    text
}

/// True if `target` is `root` or reachable through its children
pub fn contains(root: &Node, target: &Node) -> bool {
    find_one(root, |node| node.ptr_eq(target)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomError;
    use std::cell::Cell;

    fn sample() -> Node {
        // div -> [span("a"), p#intro -> ["b"]]
        let root = Node::new_element("div");
        let span = Node::new_element("span");
        span.append_child(&Node::new_text("a"));
        let p = Node::new_element("P");
        p.set_attribute("id", "intro").unwrap();
        p.append_child(&Node::new_text("b"));
        root.append_child(&span);
        root.append_child(&p);
        root
    }

    #[test]
    fn test_traverse_df_order() {
        let root = sample();
        let mut visited = Vec::new();
        traverse_df(&root, |node| {
            visited.push(node.node_name());
            Ok(())
        })
        .unwrap();

        assert_eq!(visited, vec!["div", "span", "#text", "P", "#text"]);
    }

    #[test]
    fn test_traverse_bf_order() {
        let root = sample();
        let mut visited = Vec::new();
        traverse_bf(&root, |node| {
            visited.push(node.node_name());
            Ok(())
        })
        .unwrap();

        assert_eq!(visited, vec!["div", "span", "P", "#text", "#text"]);
    }

    #[test]
    fn test_traversal_terminates_on_cycles() {
        let root = sample();
        root.append_child(&root);
        let span = root.children().first().unwrap();
        span.append_child(&root);

        let mut count = 0;
        traverse_df(&root, |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 5);

        root.clear();
        span.clear();
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let root = sample();
        let mut count = 0;
        let result = traverse_df(&root, |_| {
            count += 1;
            if count == 2 {
                return Err(DomError::ReadOnly("stop".to_string()));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(count, 2);
    }

    #[test]
    fn test_find_helpers() {
        let root = sample();
        assert_eq!(find_by_tag(&root, "p").len(), 1);
        assert_eq!(find_by_tag(&root, "SPAN").len(), 1);

        let intro = find_by_id(&root, "intro").unwrap();
        assert_eq!(intro.node_name(), "P");
        assert!(find_by_id(&root, "missing").is_none());

        assert!(contains(&root, &intro));
        assert!(!contains(&intro, &root));
    }

    #[test]
    fn test_find_one_stops_at_first_match() {
        let root = sample();
        let calls = Cell::new(0);
        let found = find_one(&root, |node| {
            calls.set(calls.get() + 1);
            node.is_text()
        });

        assert_eq!(found.and_then(|node| node.data()).as_deref(), Some("a"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_search_terminates_on_cycles() {
        let root = sample();
        root.append_child(&root);

        assert_eq!(find(&root, |node| node.is_element()).len(), 3);
        assert_eq!(text_content(&root), "ab");
        root.clear();
    }

    #[test]
    fn test_text_content() {
        assert_eq!(text_content(&sample()), "ab");
    }
}
