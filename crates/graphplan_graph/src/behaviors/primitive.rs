// SPDX-License-Identifier: MIT OR Apache-2.0
//! Primitive nodes hold one value and push it into the widgets of the
//! inputs they are wired to.

use super::NodeBehavior;
use crate::graph::Graph;
use crate::node::NodeId;

/// Virtual node that writes its value into downstream widgets
#[derive(Debug, Clone, Copy, Default)]
pub struct Primitive;

impl NodeBehavior for Primitive {
    fn class_type(&self) -> &str {
        "PrimitiveNode"
    }

    fn apply_to_graph(&self, node_id: &NodeId, graph: &mut Graph) {
        let Some(value) = graph
            .node(node_id)
            .and_then(|n| n.widgets.first())
            .map(|w| w.value.clone())
        else {
            tracing::debug!("Primitive {node_id} has no value to apply");
            return;
        };

        let targets: Vec<(NodeId, usize)> = graph
            .links_from(node_id)
            .filter(|l| l.origin_slot == 0)
            .map(|l| (l.target_id.clone(), l.target_slot))
            .collect();

        for (target_id, slot) in targets {
            let Some(target) = graph.node_mut(&target_id) else {
                tracing::warn!("Primitive {node_id} is linked to missing node {target_id}");
                continue;
            };
            let Some(widget_name) = target.input(slot).and_then(|i| i.widget.clone()) else {
                continue;
            };
            match target.widget_mut(&widget_name) {
                Some(widget) => widget.value = value.clone(),
                None => tracing::warn!(
                    "Node {target_id} has no widget {widget_name} for primitive {node_id}"
                ),
            }
        }
    }
}
