// SPDX-License-Identifier: MIT OR Apache-2.0
//! Class-level node behaviours.
//!
//! A behaviour is attached to every node of a class type. Virtual behaviours
//! mark frontend-only nodes that never reach the plan but may rewrite the
//! graph before it is compiled or forward links to their own inputs.

pub mod note;
pub mod primitive;
pub mod reroute;

use crate::graph::Graph;
use crate::link::Link;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use std::sync::Arc;

pub use note::Note;
pub use primitive::Primitive;
pub use reroute::Reroute;

/// Hooks a node class exposes to the plan compiler
pub trait NodeBehavior: Send + Sync {
    /// Class type this behaviour is registered for
    fn class_type(&self) -> &str;

    /// Whether nodes of this class are frontend-only and left out of the plan
    fn is_virtual(&self) -> bool {
        true
    }

    /// Apply side effects to the graph before any plan entry is built
    fn apply_to_graph(&self, _node_id: &NodeId, _graph: &mut Graph) {}

    /// Map a link leaving `node` to the link that really feeds it.
    ///
    /// Returns `None` when the node does not forward that output.
    fn remap_link(&self, _node: &Node, _link: &Link, _graph: &Graph) -> Option<Link> {
        None
    }

    /// Adjust how a link from `node` is presented to its consumers
    fn update_link(&self, _node: &Node, link: Link) -> Link {
        link
    }
}

/// Registry of behaviours by class type
#[derive(Clone)]
pub struct BehaviorRegistry {
    behaviors: IndexMap<String, Arc<dyn NodeBehavior>>,
}

impl BehaviorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            behaviors: IndexMap::new(),
        }
    }

    /// Registry with the built-in virtual nodes
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Reroute);
        registry.register(Primitive);
        registry.register(Note::new("Note"));
        registry.register(Note::new("MarkdownNote"));
        registry
    }

    /// Register a behaviour, replacing any previous one for the same class
    pub fn register(&mut self, behavior: impl NodeBehavior + 'static) {
        self.behaviors
            .insert(behavior.class_type().to_string(), Arc::new(behavior));
    }

    /// Get the behaviour for a class type
    pub fn get(&self, class_type: &str) -> Option<&dyn NodeBehavior> {
        self.behaviors.get(class_type).map(|b| b.as_ref())
    }

    /// Whether `node` is a virtual node
    pub fn is_virtual(&self, node: &Node) -> bool {
        self.get(&node.class_type).is_some_and(|b| b.is_virtual())
    }

    /// Registered class types
    pub fn class_types(&self) -> impl Iterator<Item = &str> {
        self.behaviors.keys().map(String::as_str)
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.class_types()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_virtual() {
        let registry = BehaviorRegistry::with_builtins();
        for class_type in ["Reroute", "PrimitiveNode", "Note", "MarkdownNote"] {
            let node = Node::new(NodeId::from(1), class_type);
            assert!(registry.is_virtual(&node), "{class_type} should be virtual");
        }
        assert!(!registry.is_virtual(&Node::new(NodeId::from(1), "KSampler")));
    }

    #[test]
    fn test_register_replaces_existing_class() {
        struct RealReroute;
        impl NodeBehavior for RealReroute {
            fn class_type(&self) -> &str {
                "Reroute"
            }
            fn is_virtual(&self) -> bool {
                false
            }
        }

        let mut registry = BehaviorRegistry::with_builtins();
        registry.register(RealReroute);
        assert!(!registry.is_virtual(&Node::new(NodeId::from(1), "Reroute")));
        assert_eq!(registry.class_types().count(), 4);
    }
}
