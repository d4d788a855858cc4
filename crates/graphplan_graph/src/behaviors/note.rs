// SPDX-License-Identifier: MIT OR Apache-2.0
//! Annotation nodes. They carry text for the reader and nothing else.

use super::NodeBehavior;

/// Virtual node with no side effects and no outputs to forward
#[derive(Debug, Clone)]
pub struct Note {
    class_type: String,
}

impl Note {
    /// Note behaviour for the given class type
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
        }
    }
}

impl NodeBehavior for Note {
    fn class_type(&self) -> &str {
        &self.class_type
    }
}
