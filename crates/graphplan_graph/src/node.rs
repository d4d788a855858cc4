// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::slot::{InputSlot, OutputSlot};
use crate::widget::Widget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a node, stable within a graph.
///
/// Outer nodes use plain numbers; inner nodes of a group use
/// `<group-id>:<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// ID of the inner node at `index` inside group `group`
    pub fn inner(group: &NodeId, index: usize) -> Self {
        Self(format!("{}:{index}", group.0))
    }

    /// ID as a plan key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution mode of a node, stored as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeMode {
    /// Runs normally
    #[default]
    Always,
    /// Runs on an event
    OnEvent,
    /// Muted: never runs and is left out of the plan
    Never,
    /// Runs on a trigger
    OnTrigger,
    /// Bypassed: forwards a matching input to its consumers
    Bypass,
}

impl NodeMode {
    /// Whether the node is left out of the plan
    pub fn is_skipped(self) -> bool {
        matches!(self, Self::Never | Self::Bypass)
    }
}

impl From<NodeMode> for u8 {
    fn from(mode: NodeMode) -> Self {
        match mode {
            NodeMode::Always => 0,
            NodeMode::OnEvent => 1,
            NodeMode::Never => 2,
            NodeMode::OnTrigger => 3,
            NodeMode::Bypass => 4,
        }
    }
}

impl TryFrom<u8> for NodeMode {
    type Error = InvalidModeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Always),
            1 => Ok(Self::OnEvent),
            2 => Ok(Self::Never),
            3 => Ok(Self::OnTrigger),
            4 => Ok(Self::Bypass),
            other => Err(InvalidModeError(other)),
        }
    }
}

/// Unknown node mode code
#[derive(Debug, thiserror::Error)]
#[error("Invalid node mode: {0}")]
pub struct InvalidModeError(pub u8);

/// Simple node or group of inner nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The node is its own execution unit
    #[default]
    Simple,
    /// The node expands into an ordered sequence of inner nodes
    Group {
        /// Inner nodes in execution order
        nodes: Vec<Node>,
    },
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node ID
    pub id: NodeId,
    /// Operation class name
    #[serde(rename = "type")]
    pub class_type: String,
    /// Display title
    pub title: String,
    /// Execution mode
    #[serde(default)]
    pub mode: NodeMode,
    /// Input slots
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    /// Output slots
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    /// Widgets in display order
    #[serde(default)]
    pub widgets: Vec<Widget>,
    /// Simple or group
    #[serde(default)]
    pub kind: NodeKind,
}

impl Node {
    /// Create a node whose title is its class name
    pub fn new(id: NodeId, class_type: impl Into<String>) -> Self {
        let class_type = class_type.into();
        Self {
            id,
            title: class_type.clone(),
            class_type,
            mode: NodeMode::Always,
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            kind: NodeKind::Simple,
        }
    }

    /// Create a group node. Inner node IDs are reassigned to `<id>:<index>`.
    pub fn group(id: NodeId, class_type: impl Into<String>, inner: Vec<Node>) -> Self {
        let nodes = inner
            .into_iter()
            .enumerate()
            .map(|(index, mut node)| {
                node.id = NodeId::inner(&id, index);
                node
            })
            .collect();
        Self {
            kind: NodeKind::Group { nodes },
            ..Self::new(id, class_type)
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: NodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append an input
    pub fn with_input(mut self, input: InputSlot) -> Self {
        self.inputs.push(input);
        self
    }

    /// Append an output
    pub fn with_output(mut self, output: OutputSlot) -> Self {
        self.outputs.push(output);
        self
    }

    /// Append a widget
    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    /// Get an input by index
    pub fn input(&self, index: usize) -> Option<&InputSlot> {
        self.inputs.get(index)
    }

    /// Get an output by index
    pub fn output(&self, index: usize) -> Option<&OutputSlot> {
        self.outputs.get(index)
    }

    /// Get a widget by name
    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    /// Get a mutable widget by name
    pub fn widget_mut(&mut self, name: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.name == name)
    }

    /// Whether this node is a group
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group { .. })
    }

    /// Execution units of this node: the inner nodes of a group, or the node itself
    pub fn inner_nodes(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Group { nodes } => nodes,
            NodeKind::Simple => std::slice::from_ref(self),
        }
    }

    pub(crate) fn inner_nodes_mut(&mut self) -> &mut [Node] {
        match self.kind {
            NodeKind::Group { ref mut nodes } => nodes,
            NodeKind::Simple => std::slice::from_mut(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_as_integer() {
        let node = Node::new(NodeId::from(3), "VAEDecode").with_mode(NodeMode::Bypass);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["mode"], 4);
        assert!(serde_json::from_value::<NodeMode>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn test_skipped_modes() {
        assert!(NodeMode::Never.is_skipped());
        assert!(NodeMode::Bypass.is_skipped());
        assert!(!NodeMode::Always.is_skipped());
        assert!(!NodeMode::OnTrigger.is_skipped());
    }

    #[test]
    fn test_group_assigns_inner_ids() {
        let group = Node::group(
            NodeId::from(7),
            "workflow/pipeline",
            vec![
                Node::new(NodeId::from(0), "CheckpointLoader"),
                Node::new(NodeId::from(0), "KSampler"),
            ],
        );
        let ids: Vec<_> = group.inner_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["7:0", "7:1"]);
        assert!(group.is_group());
    }

    #[test]
    fn test_simple_node_is_its_own_inner_node() {
        let node = Node::new(NodeId::from(1), "KSampler");
        assert_eq!(node.inner_nodes().len(), 1);
        assert_eq!(node.inner_nodes()[0].id, node.id);
    }
}
