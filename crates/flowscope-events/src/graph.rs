//! The observed flow graph: an append-only DAG of nodes reported by the
//! execution engine.
//!
//! Edges point backward toward the start of execution; a node with more than
//! one parent is a join (e.g. parallel-branch convergence). Node ids are
//! unique within an execution and stable once appended.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The kind discriminator of a flow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A stage marker: a named top-level grouping of steps.
    StageMarker,
    /// Opens a block. `body_invocation` marks a true nested scope (a parallel
    /// branch or step body) as opposed to a step that merely looks like one.
    BlockStart { body_invocation: bool },
    /// Closes the block opened by `start_id`.
    BlockEnd {
        start_id: String,
        body_invocation: bool,
    },
    /// A single executable step.
    AtomicStep,
    /// The final node of an execution.
    FlowEnd,
}

impl NodeKind {
    /// True for a block-start that opens a real nested scope.
    pub fn is_body_invocation_start(&self) -> bool {
        matches!(
            self,
            NodeKind::BlockStart {
                body_invocation: true
            }
        )
    }

    pub fn is_block_end(&self) -> bool {
        matches!(self, NodeKind::BlockEnd { .. })
    }
}

/// One record in an execution's flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub display_name: String,
    /// Parent node ids, in the order reported by the engine. The order is
    /// significant: context resolution is first-match-in-order.
    pub parents: Vec<String>,
    pub kind: NodeKind,
    /// Function name from the step descriptor, when the node exposes one.
    pub step_function: Option<String>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            parents: Vec::new(),
            kind,
            step_function: None,
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_step_function(mut self, function: impl Into<String>) -> Self {
        self.step_function = Some(function.into());
        self
    }
}

/// Append-only node store for one execution.
#[derive(Debug, Default)]
pub struct FlowGraph {
    order: Vec<String>,
    nodes: HashMap<String, FlowNode>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. A duplicate id is ignored with a warning: the graph is
    /// observed, not validated, and an already-recorded node must keep its
    /// identity.
    pub fn append(&mut self, node: FlowNode) {
        if self.nodes.contains_key(&node.id) {
            tracing::warn!(node_id = %node.id, "ignoring duplicate flow node append");
            return;
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    /// Resolve a node's parents, in their recorded order. Parent ids missing
    /// from the graph are skipped.
    pub fn parents_of<'g>(&'g self, node: &'g FlowNode) -> impl Iterator<Item = &'g FlowNode> {
        node.parents.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Nodes in append order.
    pub fn iter(&self) -> impl Iterator<Item = &FlowNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_lookup() {
        let mut graph = FlowGraph::new();
        graph.append(FlowNode::new("2", "Build", NodeKind::StageMarker));
        graph.append(FlowNode::new("3", "sh", NodeKind::AtomicStep).with_parents(["2"]));

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.node("2").unwrap().display_name, "Build");
        assert_eq!(graph.node("3").unwrap().parents, vec!["2"]);
        assert!(graph.node("99").is_none());
    }

    #[test]
    fn duplicate_append_keeps_first_node() {
        let mut graph = FlowGraph::new();
        graph.append(FlowNode::new("1", "original", NodeKind::AtomicStep));
        graph.append(FlowNode::new("1", "imposter", NodeKind::FlowEnd));

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node("1").unwrap().display_name, "original");
        assert_eq!(graph.node("1").unwrap().kind, NodeKind::AtomicStep);
    }

    #[test]
    fn parents_of_preserves_order_and_skips_unknown() {
        let mut graph = FlowGraph::new();
        graph.append(FlowNode::new("a", "a", NodeKind::AtomicStep));
        graph.append(FlowNode::new("b", "b", NodeKind::AtomicStep));
        graph.append(
            FlowNode::new("join", "join", NodeKind::AtomicStep).with_parents(["b", "missing", "a"]),
        );

        let join = graph.node("join").unwrap();
        let parent_ids: Vec<_> = graph.parents_of(join).map(|n| n.id.as_str()).collect();
        assert_eq!(parent_ids, vec!["b", "a"]);
    }

    #[test]
    fn iter_returns_append_order() {
        let mut graph = FlowGraph::new();
        for id in ["3", "1", "2"] {
            graph.append(FlowNode::new(id, id, NodeKind::AtomicStep));
        }
        let ids: Vec<_> = graph.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn body_invocation_predicate() {
        assert!(NodeKind::BlockStart {
            body_invocation: true
        }
        .is_body_invocation_start());
        assert!(!NodeKind::BlockStart {
            body_invocation: false
        }
        .is_body_invocation_start());
        assert!(!NodeKind::StageMarker.is_body_invocation_start());
        assert!(NodeKind::BlockEnd {
            start_id: "4".into(),
            body_invocation: true
        }
        .is_block_end());
    }

    #[test]
    fn node_kind_serde_tagging() {
        let kind = NodeKind::BlockEnd {
            start_id: "4".into(),
            body_invocation: true,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"block_end\""));
        let back: NodeKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
