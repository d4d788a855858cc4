// SPDX-License-Identifier: MIT OR Apache-2.0
//! Widgets hold the literal parameters of a node.
//!
//! A widget is either static (its stored value is serialized as-is) or
//! computed (an asynchronous [`ValueResolver`] produces the value at compile
//! time). Resolvers are runtime-only and never part of the serialized graph.

use crate::node::Node;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Produces the value a widget contributes to the plan
#[async_trait]
pub trait ValueResolver: Send + Sync {
    /// Resolve the value of the widget at `index` on `node`
    async fn resolve(&self, node: &Node, index: usize) -> Result<Value, WidgetError>;
}

/// Error raised by a [`ValueResolver`]
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// The value could not be produced
    #[error("value unavailable: {0}")]
    Unavailable(String),

    /// An underlying operation failed
    #[error(transparent)]
    Failed(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Widget kind, derived from whether a resolver is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// Stored value is used directly
    Static,
    /// Value comes from an asynchronous resolver
    Computed,
}

/// Widget options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetOptions {
    /// Whether the widget value is written into the plan
    #[serde(default = "default_serialize")]
    pub serialize: bool,
}

fn default_serialize() -> bool {
    true
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self { serialize: true }
    }
}

/// A named value on a node
#[derive(Clone, Serialize, Deserialize)]
pub struct Widget {
    /// Widget name, used as the key in the compiled plan
    pub name: String,
    /// Stored value
    pub value: Value,
    /// Options
    #[serde(default)]
    pub options: WidgetOptions,
    #[serde(skip)]
    resolver: Option<Arc<dyn ValueResolver>>,
}

impl Widget {
    /// Create a static widget
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options: WidgetOptions::default(),
            resolver: None,
        }
    }

    /// Attach an asynchronous resolver, turning this into a computed widget
    pub fn with_resolver(mut self, resolver: Arc<dyn ValueResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Exclude this widget from the plan
    pub fn skip_serialization(mut self) -> Self {
        self.options.serialize = false;
        self
    }

    /// Whether this widget is written into the plan
    pub fn is_serialized(&self) -> bool {
        self.options.serialize
    }

    /// Widget kind
    pub fn kind(&self) -> WidgetKind {
        if self.resolver.is_some() {
            WidgetKind::Computed
        } else {
            WidgetKind::Static
        }
    }

    /// Value this widget contributes to the plan.
    ///
    /// Computed widgets await their resolver; static widgets return a copy of
    /// the stored value.
    pub async fn serialized_value(&self, node: &Node, index: usize) -> Result<Value, WidgetError> {
        match &self.resolver {
            Some(resolver) => resolver.resolve(node, index).await,
            None => Ok(self.value.clone()),
        }
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("options", &self.options)
            .field("kind", &self.kind())
            .finish()
    }
}
