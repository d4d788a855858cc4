// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution plan produced by the compiler.
//!
//! The JSON shape is
//! `{ "<id>": { "inputs": { "<name>": <literal> | ["<id>", <slot>] }, "class_type": "...", "title": "..." } }`.

use crate::node::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to an output slot of another plan entry, serialized as `["<id>", <slot>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef(pub String, pub usize);

impl NodeRef {
    /// Reference to `slot` of `node`
    pub fn new(node: &NodeId, slot: usize) -> Self {
        Self(node.to_string(), slot)
    }

    /// Producer key
    pub fn node(&self) -> &str {
        &self.0
    }

    /// Producer output slot
    pub fn slot(&self) -> usize {
        self.1
    }
}

/// Value of one plan input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanInput {
    /// Output of another node
    Link(NodeRef),
    /// Literal widget value
    Value(Value),
}

impl PlanInput {
    /// The referenced producer, if this is a link
    pub fn as_link(&self) -> Option<&NodeRef> {
        match self {
            Self::Link(link) => Some(link),
            Self::Value(_) => None,
        }
    }
}

/// One node of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Inputs by name
    pub inputs: IndexMap<String, PlanInput>,
    /// Operation class name
    pub class_type: String,
    /// Display title
    pub title: String,
}

/// Input removed because its producer is not part of the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedInput {
    /// Consuming node
    pub node: String,
    /// Input name
    pub input: String,
    /// Missing producer
    pub producer: String,
}

/// Mapping from node ID to plan entry, in emission order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    entries: IndexMap<String, PlanEntry>,
}

impl Plan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for a node
    pub fn insert(&mut self, node_id: &NodeId, entry: PlanEntry) {
        self.entries.insert(node_id.to_string(), entry);
    }

    /// Entry for a node key
    pub fn get(&self, key: &str) -> Option<&PlanEntry> {
        self.entries.get(key)
    }

    /// Whether a node key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in emission order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlanEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Link inputs whose producer key is missing from the plan
    pub fn dangling_references(&self) -> Vec<PrunedInput> {
        self.entries
            .iter()
            .flat_map(|(node, entry)| {
                entry.inputs.iter().filter_map(move |(input, value)| {
                    let link = value.as_link()?;
                    (!self.contains(link.node())).then(|| PrunedInput {
                        node: node.clone(),
                        input: input.clone(),
                        producer: link.node().to_string(),
                    })
                })
            })
            .collect()
    }

    /// Remove every link input whose producer is not in the plan.
    ///
    /// Runs once over the finished plan; entry order carries no dependency
    /// meaning, so forward references are kept.
    pub fn sanitize(&mut self) -> Vec<PrunedInput> {
        let pruned = self.dangling_references();
        for dangling in &pruned {
            if let Some(entry) = self.entries.get_mut(&dangling.node) {
                entry.inputs.shift_remove(&dangling.input);
            }
        }
        pruned
    }
}
