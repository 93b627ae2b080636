//! Structural context resolution.
//!
//! Locates a node within its enclosing nested blocks by walking the parent
//! relation backwards. Pure reads over the graph; the tie-break rules are
//! load-bearing:
//! - a direct parent that is a body-invocation block-start IS the enclosing
//!   block and takes priority over any other path;
//! - block-end parents are never descended into (they close a sibling scope
//!   that the node is not inside of);
//! - otherwise the search is depth-first in parent order, first match wins.

use crate::graph::{FlowGraph, FlowNode};

/// The ordered list of enclosing block-start ids, outermost first. Empty for
/// a top-level node.
pub fn branch_for<'g>(graph: &'g FlowGraph, node: &'g FlowNode) -> Vec<String> {
    let mut branch = Vec::new();
    let mut current = enclosing_block(graph, node);
    while let Some(block) = current {
        branch.push(block.id.clone());
        current = enclosing_block(graph, block);
    }
    branch.reverse();
    branch
}

/// The nearest enclosing block-start of `node`, or `None` at top level.
///
/// Depth-first over the parent DAG with an explicit frame stack, so
/// pathologically deep graphs cannot overflow the call stack. The graph is
/// append-only and acyclic, so no visited-set is needed.
pub fn enclosing_block<'g>(graph: &'g FlowGraph, node: &'g FlowNode) -> Option<&'g FlowNode> {
    struct Frame<'g> {
        parents: Vec<&'g FlowNode>,
        cursor: usize,
    }

    // All direct parents are scanned for a body-invocation block-start
    // before any parent is descended into. This holds at every level.
    fn direct_hit<'g>(parents: &[&'g FlowNode]) -> Option<&'g FlowNode> {
        parents
            .iter()
            .copied()
            .find(|p| p.kind.is_body_invocation_start())
    }

    let parents: Vec<&FlowNode> = graph.parents_of(node).collect();
    if let Some(hit) = direct_hit(&parents) {
        return Some(hit);
    }
    let mut stack = vec![Frame { parents, cursor: 0 }];

    loop {
        let frame = stack.last_mut()?;
        let mut descend = None;
        while frame.cursor < frame.parents.len() {
            let parent = frame.parents[frame.cursor];
            frame.cursor += 1;
            if !parent.kind.is_block_end() {
                descend = Some(parent);
                break;
            }
        }
        let Some(parent) = descend else {
            stack.pop();
            continue;
        };
        let parents: Vec<&FlowNode> = graph.parents_of(parent).collect();
        if let Some(hit) = direct_hit(&parents) {
            return Some(hit);
        }
        stack.push(Frame { parents, cursor: 0 });
    }
}

/// Serialize a branch as a `/`-joined path. Empty branch gives `""`.
pub fn to_path(branch: &[String]) -> String {
    branch.join("/")
}
