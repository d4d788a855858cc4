// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reroute nodes route a wire through an extra point in the editor.

use super::NodeBehavior;
use crate::graph::Graph;
use crate::link::Link;
use crate::node::Node;

/// Virtual node whose output slot `k` forwards input slot `k`
#[derive(Debug, Clone, Copy, Default)]
pub struct Reroute;

impl NodeBehavior for Reroute {
    fn class_type(&self) -> &str {
        "Reroute"
    }

    fn remap_link(&self, node: &Node, link: &Link, graph: &Graph) -> Option<Link> {
        graph.input_link(node, link.origin_slot).cloned()
    }
}
