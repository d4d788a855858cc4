// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph model and execution plan compiler.
//!
//! This crate turns an editor node graph into a plan an execution backend can
//! run. The plan maps each node ID to its operation class, its widget values
//! and references to the outputs it consumes.
//!
//! ## Architecture
//!
//! - [`Graph`] owns nodes and links and computes the execution order
//! - [`Node`]s are simple or groups of inner nodes, with typed slots and widgets
//! - [`BehaviorRegistry`] gives node classes virtual (frontend-only) behaviour
//! - [`PlanCompiler`] materializes virtual nodes, emits plan entries and
//!   sanitizes references to nodes that were left out

pub mod behaviors;
pub mod compile;
pub mod graph;
pub mod link;
pub mod node;
pub mod plan;
pub mod slot;
pub mod widget;

pub use behaviors::{BehaviorRegistry, NodeBehavior};
pub use compile::{CompileError, CompileOptions, CompileReport, CompiledPrompt, PlanCompiler, Resolution};
pub use graph::{ConnectionError, CycleError, Graph};
pub use link::{Link, LinkId};
pub use node::{Node, NodeId, NodeKind, NodeMode};
pub use plan::{NodeRef, Plan, PlanEntry, PlanInput, PrunedInput};
pub use slot::{InputSlot, OutputSlot, SlotType};
pub use widget::{ValueResolver, Widget, WidgetError, WidgetKind};
