// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.

use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// A node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Graph identity
    pub id: Uuid,
    /// Highest numeric node ID handed out so far
    #[serde(default)]
    last_node_id: u32,
    /// Highest link ID handed out so far
    #[serde(default)]
    last_link_id: u32,
    /// Outer nodes in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Links between nodes, including links to inner nodes of groups
    #[serde(default)]
    links: IndexMap<LinkId, Link>,
    /// Free-form metadata carried along with the graph
    #[serde(default)]
    pub extra: serde_json::Map<String, Value>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            last_node_id: 0,
            last_link_id: 0,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Add an outer node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        if let Ok(numeric) = node.id.as_str().parse::<u32>() {
            self.last_node_id = self.last_node_id.max(numeric);
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Remove an outer node and every link touching it or its inner nodes
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(node_id)?;
        let unit_ids: Vec<NodeId> = node.inner_nodes().iter().map(|n| n.id.clone()).collect();
        let stale: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| unit_ids.iter().any(|id| l.involves_node(id)))
            .map(|l| l.id)
            .collect();
        for link_id in stale {
            self.disconnect(link_id);
        }
        Some(node)
    }

    /// Get a node by ID, looking inside groups for inner nodes
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id).or_else(|| {
            self.nodes
                .values()
                .filter(|n| n.is_group())
                .flat_map(Node::inner_nodes)
                .find(|n| n.id == *node_id)
        })
    }

    /// Get a mutable node by ID, looking inside groups for inner nodes
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        if self.nodes.contains_key(node_id) {
            return self.nodes.get_mut(node_id);
        }
        self.nodes
            .values_mut()
            .filter(|n| n.is_group())
            .flat_map(Node::inner_nodes_mut)
            .find(|n| n.id == *node_id)
    }

    /// Every execution unit: simple outer nodes and the inner nodes of groups
    pub fn execution_units(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().flat_map(Node::inner_nodes)
    }

    /// Number of outer nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link a producer output to a consumer input
    pub fn connect(
        &mut self,
        origin_id: &NodeId,
        origin_slot: usize,
        target_id: &NodeId,
        target_slot: usize,
    ) -> Result<LinkId, ConnectionError> {
        if origin_id == target_id {
            return Err(ConnectionError::SelfLoop);
        }

        let origin = self
            .node(origin_id)
            .ok_or_else(|| ConnectionError::NodeNotFound(origin_id.clone()))?;
        let target = self
            .node(target_id)
            .ok_or_else(|| ConnectionError::NodeNotFound(target_id.clone()))?;

        let output = origin.output(origin_slot).ok_or_else(|| ConnectionError::SlotNotFound {
            node: origin_id.clone(),
            slot: origin_slot,
        })?;
        let input = target.input(target_slot).ok_or_else(|| ConnectionError::SlotNotFound {
            node: target_id.clone(),
            slot: target_slot,
        })?;

        if !output.slot_type.can_connect_to(&input.slot_type) {
            return Err(ConnectionError::IncompatibleTypes {
                from: output.slot_type.to_string(),
                to: input.slot_type.to_string(),
            });
        }
        if input.is_connected() {
            return Err(ConnectionError::SlotAlreadyConnected {
                node: target_id.clone(),
                slot: target_slot,
            });
        }

        let link_type = output.slot_type.clone();
        self.last_link_id += 1;
        let id = LinkId(self.last_link_id);
        let link = Link::new(id, origin_id.clone(), origin_slot, target_id.clone(), target_slot, link_type);

        if let Some(output) = self.node_mut(origin_id).and_then(|n| n.outputs.get_mut(origin_slot)) {
            output.links.push(id);
        }
        if let Some(input) = self.node_mut(target_id).and_then(|n| n.inputs.get_mut(target_slot)) {
            input.link = Some(id);
        }
        self.links.insert(id, link);
        Ok(id)
    }

    /// Remove a link and clear the slots that reference it
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        if let Some(output) = self
            .node_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            output.links.retain(|id| *id != link_id);
        }
        if let Some(input) = self
            .node_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if input.link == Some(link_id) {
                input.link = None;
            }
        }
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// All links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Links leaving any output of a node
    pub fn links_from<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |l| l.origin_id == *node_id)
    }

    /// Link attached to an input of `node`
    pub fn input_link(&self, node: &Node, slot: usize) -> Option<&Link> {
        node.input(slot)?.link.and_then(|id| self.links.get(&id))
    }

    /// Outer nodes in execution order, producers before consumers.
    ///
    /// Ties are broken by insertion order so an unchanged graph always yields
    /// the same order. Links that touch an inner node count for its group.
    pub fn compute_execution_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let owners: HashMap<&NodeId, &NodeId> = self
            .nodes
            .values()
            .flat_map(|outer| outer.inner_nodes().iter().map(move |inner| (&inner.id, &outer.id)))
            .chain(self.nodes.keys().map(|id| (id, id)))
            .collect();

        let mut in_degree: IndexMap<&NodeId, usize> = self.nodes.keys().map(|id| (id, 0)).collect();
        let mut dependents: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

        for link in self.links.values() {
            let (Some(from), Some(to)) = (owners.get(&link.origin_id), owners.get(&link.target_id)) else {
                continue;
            };
            if from == to {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(*to) {
                *degree += 1;
            }
            dependents.entry(*from).or_default().push(*to);
        }

        let mut ready: VecDeque<&NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id.clone());
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(*dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(CycleError);
        }
        Ok(order)
    }

    /// Workflow snapshot of the whole graph
    pub fn serialize(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Load a graph from RON
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Serialize the graph to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when creating a link
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot index out of range
    #[error("Node {node} has no slot {slot}")]
    SlotNotFound {
        /// Node
        node: NodeId,
        /// Slot index
        slot: usize,
    },

    /// Incompatible slot types
    #[error("Incompatible slot types: {from} -> {to}")]
    IncompatibleTypes {
        /// Producer type
        from: String,
        /// Consumer type
        to: String,
    },

    /// Input already has a link
    #[error("Input {slot} of node {node} is already connected")]
    SlotAlreadyConnected {
        /// Node
        node: NodeId,
        /// Slot index
        slot: usize,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
