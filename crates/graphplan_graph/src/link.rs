// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use crate::slot::SlotType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a link, unique within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed link from a producer's output slot to a consumer's input slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link ID
    pub id: LinkId,
    /// Producer node
    pub origin_id: NodeId,
    /// Producer output index
    pub origin_slot: usize,
    /// Consumer node
    pub target_id: NodeId,
    /// Consumer input index
    pub target_slot: usize,
    /// Data type carried by the link
    #[serde(rename = "type")]
    pub link_type: SlotType,
}

impl Link {
    /// Create a new link
    pub fn new(
        id: LinkId,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
        link_type: SlotType,
    ) -> Self {
        Self {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            link_type,
        }
    }

    /// Check if this link touches a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.origin_id == *node_id || self.target_id == *node_id
    }

    /// Copy of this link presented as coming from another producer slot
    pub fn with_origin(&self, origin_id: NodeId, origin_slot: usize) -> Self {
        Self {
            origin_id,
            origin_slot,
            ..self.clone()
        }
    }
}
