// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input and output slot definitions for nodes.

use crate::link::LinkId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type carried by a slot, e.g. `INT`, `STRING` or `MODEL`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotType(pub String);

impl SlotType {
    /// Wildcard type accepted by every slot
    pub const ANY: &'static str = "*";

    /// Create a slot type from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The wildcard type
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Whether this is the wildcard type
    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    /// Check if a link of this type can feed a slot of `other` type
    pub fn can_connect_to(&self, other: &SlotType) -> bool {
        self.is_any() || other.is_any() || self == other
    }

    /// Type name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// An input slot on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSlot {
    /// Slot name, used as the key in the compiled plan
    pub name: String,
    /// Accepted data type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Incoming link, if connected
    #[serde(default)]
    pub link: Option<LinkId>,
    /// Name of the widget this input replaces, if it was converted from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,
}

impl InputSlot {
    /// Create a new unconnected input
    pub fn new(name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        Self {
            name: name.into(),
            slot_type: slot_type.into(),
            link: None,
            widget: None,
        }
    }

    /// Mark this input as standing in for the named widget
    pub fn for_widget(mut self, widget: impl Into<String>) -> Self {
        self.widget = Some(widget.into());
        self
    }

    /// Whether a link is attached
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// An output slot on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSlot {
    /// Slot name
    pub name: String,
    /// Produced data type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Outgoing links, in creation order
    #[serde(default)]
    pub links: Vec<LinkId>,
}

impl OutputSlot {
    /// Create a new output with no links
    pub fn new(name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        Self {
            name: name.into(),
            slot_type: slot_type.into(),
            links: Vec::new(),
        }
    }
}
