// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph to plan compilation.
//!
//! A compile runs four steps over one execution order:
//! 1. Expand the outer execution order into inner nodes.
//! 2. Let virtual nodes apply their side effects to the graph.
//! 3. Emit a plan entry for every active, non-virtual node, collecting widget
//!    values and resolving links through reroutes and bypassed nodes.
//! 4. Drop link inputs whose producer never made it into the plan.

use crate::behaviors::BehaviorRegistry;
use crate::graph::{CycleError, Graph};
use crate::link::Link;
use crate::node::{Node, NodeId, NodeMode};
use crate::plan::{NodeRef, Plan, PlanEntry, PlanInput, PrunedInput};
use crate::slot::SlotType;
use crate::widget::WidgetError;
use indexmap::IndexMap;
use serde_json::{json, Value};

/// Compiler options
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Upper bound on pass-through hops per input. Defaults to the number of
    /// execution units in the graph plus one.
    pub max_link_hops: Option<usize>,
}

/// How the backward walk for an input ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Reached a node that is neither virtual nor bypassed
    Resolved,
    /// A bypassed node had no input to forward
    Stalled,
    /// The input a pass-through node would forward is not connected
    Disconnected,
    /// The link points at a node that no longer exists
    MissingProducer,
    /// Gave up after the hop limit
    HopLimit,
}

impl Resolution {
    /// Whether the walk ran out of links rather than stopping on one.
    ///
    /// A widget input whose walk ends this way keeps its widget value.
    pub fn is_link_lost(self) -> bool {
        matches!(self, Self::Disconnected | Self::MissingProducer)
    }
}

/// Final producer of an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Link as presented by the final producer
    pub link: Link,
    /// Pass-through nodes crossed on the way
    pub hops: usize,
    /// How the walk ended
    pub resolution: Resolution,
}

/// Input whose walk did not reach an emittable producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedLink {
    /// Consuming node
    pub node: NodeId,
    /// Input name
    pub input: String,
    /// Node the walk stopped at
    pub stalled_at: NodeId,
    /// Why it stopped
    pub resolution: Resolution,
}

/// Diagnostics gathered during a compile
#[derive(Debug, Clone, Default)]
pub struct CompileReport {
    /// Inner nodes visited by the materialization pass
    pub materialize_order: Vec<NodeId>,
    /// Inner nodes visited by the emission pass
    pub emit_order: Vec<NodeId>,
    /// Inputs whose walk stalled before a real producer
    pub unresolved: Vec<UnresolvedLink>,
    /// Inputs removed by the sanitizer
    pub pruned: Vec<PrunedInput>,
}

/// Result of a compile
#[derive(Debug, Clone)]
pub struct CompiledPrompt {
    /// Graph snapshot with the plan under `extra.api`
    pub workflow: Value,
    /// The plan
    pub output: Plan,
    /// Diagnostics
    pub report: CompileReport,
}

/// Compiles graphs into plans
#[derive(Debug, Clone, Default)]
pub struct PlanCompiler {
    behaviors: BehaviorRegistry,
    options: CompileOptions,
}

impl PlanCompiler {
    /// Create a compiler with the given behaviours
    pub fn new(behaviors: BehaviorRegistry) -> Self {
        Self {
            behaviors,
            options: CompileOptions::default(),
        }
    }

    /// Set the options
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Registered behaviours
    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    /// Compile `graph` into a plan.
    ///
    /// Virtual nodes may modify the graph before emission. The plan is stored
    /// under `extra.api` of the returned workflow next to empty `inputs` and
    /// `outputs` maps; other keys already in `extra` are kept rather than
    /// replaced.
    pub async fn compile(&self, graph: &mut Graph) -> Result<CompiledPrompt, CompileError> {
        tracing::debug!("Compiling graph {} ({} nodes)", graph.id, graph.node_count());
        let mut report = CompileReport {
            materialize_order: self.materialize(graph)?,
            ..CompileReport::default()
        };

        let graph: &Graph = graph;
        let mut workflow = graph.serialize()?;
        let mut output = self.build(graph, &mut report).await?;

        report.pruned = output.sanitize();
        for pruned in &report.pruned {
            tracing::warn!(
                "Dropped input {} of node {}: producer {} is not in the plan",
                pruned.input,
                pruned.node,
                pruned.producer
            );
        }

        if let Some(root) = workflow.as_object_mut() {
            let extra = root.entry("extra").or_insert_with(|| json!({}));
            if let Some(extra) = extra.as_object_mut() {
                extra.insert("api".to_string(), serde_json::to_value(&output)?);
                extra.insert("inputs".to_string(), json!({}));
                extra.insert("outputs".to_string(), json!({}));
            }
        }

        tracing::info!(
            "Compiled {} plan entries ({} inputs pruned)",
            output.len(),
            report.pruned.len()
        );
        Ok(CompiledPrompt {
            workflow,
            output,
            report,
        })
    }

    /// Inner nodes in execution order
    pub fn execution_order(&self, graph: &Graph) -> Result<Vec<NodeId>, CycleError> {
        Ok(graph
            .compute_execution_order()?
            .iter()
            .filter_map(|id| graph.node(id))
            .flat_map(Node::inner_nodes)
            .map(|n| n.id.clone())
            .collect())
    }

    /// Run the side effects of every virtual node. Returns the visit order.
    pub fn materialize(&self, graph: &mut Graph) -> Result<Vec<NodeId>, CompileError> {
        let order = self.execution_order(graph)?;
        for id in &order {
            let behavior = graph
                .node(id)
                .and_then(|n| self.behaviors.get(&n.class_type))
                .filter(|b| b.is_virtual());
            if let Some(behavior) = behavior {
                tracing::trace!("Applying virtual node {id} ({})", behavior.class_type());
                behavior.apply_to_graph(id, graph);
            }
        }
        Ok(order)
    }

    /// Emit plan entries for every active, non-virtual node
    pub async fn build(&self, graph: &Graph, report: &mut CompileReport) -> Result<Plan, CompileError> {
        report.emit_order = self.execution_order(graph)?;
        let mut plan = Plan::new();

        for id in &report.emit_order {
            let Some(node) = graph.node(id) else {
                continue;
            };
            if self.behaviors.is_virtual(node) || node.mode.is_skipped() {
                tracing::trace!("Skipping node {id} ({:?})", node.mode);
                continue;
            }

            let mut inputs = IndexMap::new();
            for (index, widget) in node.widgets.iter().enumerate() {
                if !widget.is_serialized() {
                    continue;
                }
                let value = widget
                    .serialized_value(node, index)
                    .await
                    .map_err(|source| CompileError::Widget {
                        node: id.clone(),
                        widget: widget.name.clone(),
                        source,
                    })?;
                inputs.insert(widget.name.clone(), PlanInput::Value(value));
            }

            for (slot, input) in node.inputs.iter().enumerate() {
                let Some(resolved) = self.resolve_input(graph, node, slot) else {
                    continue;
                };
                if resolved.resolution != Resolution::Resolved {
                    report.unresolved.push(UnresolvedLink {
                        node: id.clone(),
                        input: input.name.clone(),
                        stalled_at: resolved.link.origin_id.clone(),
                        resolution: resolved.resolution,
                    });
                    // A widget input left without a link keeps its widget value,
                    // e.g. the one a primitive wrote during materialization.
                    let keeps_widget = input.widget.is_some() && inputs.contains_key(&input.name);
                    if keeps_widget && resolved.resolution.is_link_lost() {
                        tracing::debug!("Keeping widget value for {id}.{}", input.name);
                        continue;
                    }
                    tracing::warn!(
                        "Unresolvable link into {id}.{}: stopped at node {} ({:?})",
                        input.name,
                        resolved.link.origin_id,
                        resolved.resolution
                    );
                }
                inputs.insert(
                    input.name.clone(),
                    PlanInput::Link(NodeRef::new(&resolved.link.origin_id, resolved.link.origin_slot)),
                );
            }

            plan.insert(
                id,
                PlanEntry {
                    inputs,
                    class_type: node.class_type.clone(),
                    title: node.title.clone(),
                },
            );
        }
        Ok(plan)
    }

    /// Walk back from an input of `node` to its effective producer.
    ///
    /// Returns `None` when the input has no link.
    pub fn resolve_input(&self, graph: &Graph, node: &Node, slot: usize) -> Option<ResolvedLink> {
        let wanted = &node.input(slot)?.slot_type;
        let mut link = graph.input_link(node, slot)?.clone();
        let max_hops = self
            .options
            .max_link_hops
            .unwrap_or_else(|| graph.execution_units().count() + 1);
        let mut hops = 0;

        let resolution = loop {
            let Some(producer) = graph.node(&link.origin_id) else {
                break Resolution::MissingProducer;
            };
            let behavior = self.behaviors.get(&producer.class_type).filter(|b| b.is_virtual());
            if behavior.is_none() && producer.mode != NodeMode::Bypass {
                break Resolution::Resolved;
            }
            if hops >= max_hops {
                break Resolution::HopLimit;
            }

            let next = match behavior {
                Some(behavior) => behavior
                    .remap_link(producer, &link, graph)
                    .ok_or(Resolution::Disconnected),
                None => bypass_link(graph, producer, &link, wanted),
            };
            match next {
                Ok(next) => {
                    tracing::trace!("Link {} -> {} via {}", link.id, next.id, producer.id);
                    link = next;
                    hops += 1;
                }
                Err(resolution) => break resolution,
            }
        };

        if let Some(producer) = graph.node(&link.origin_id) {
            if let Some(behavior) = self.behaviors.get(&producer.class_type) {
                link = behavior.update_link(producer, link);
            }
        }

        Some(ResolvedLink {
            link,
            hops,
            resolution,
        })
    }
}

/// Link feeding the input a bypassed node forwards to a consumer of type `wanted`.
///
/// The first input of the same type wins; otherwise the input at the index of
/// the output being read. Fails with `Stalled` when there is no such input and
/// with `Disconnected` when the chosen input has no link.
fn bypass_link(graph: &Graph, bypassed: &Node, link: &Link, wanted: &SlotType) -> Result<Link, Resolution> {
    let slot = bypassed
        .inputs
        .iter()
        .position(|input| input.slot_type == *wanted)
        .or_else(|| (link.origin_slot < bypassed.inputs.len()).then_some(link.origin_slot))
        .ok_or(Resolution::Stalled)?;
    graph
        .input_link(bypassed, slot)
        .cloned()
        .ok_or(Resolution::Disconnected)
}

/// Error during compilation
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Graph contains a cycle
    #[error("Graph contains a cycle")]
    CycleDetected(#[from] CycleError),

    /// A widget resolver failed
    #[error("Widget {widget} on node {node} failed: {source}")]
    Widget {
        /// Node
        node: NodeId,
        /// Widget name
        widget: String,
        /// Resolver error
        source: WidgetError,
    },

    /// Workflow snapshot could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::NodeBehavior;
    use crate::slot::{InputSlot, OutputSlot};
    use crate::widget::{ValueResolver, Widget};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn producer(id: u32, ty: &str) -> Node {
        Node::new(NodeId::from(id), "Producer").with_output(OutputSlot::new("out", ty))
    }

    fn consumer(id: u32, ty: &str) -> Node {
        Node::new(NodeId::from(id), "Consumer").with_input(InputSlot::new("in", ty))
    }

    fn reroute(id: u32) -> Node {
        Node::new(NodeId::from(id), "Reroute")
            .with_input(InputSlot::new("", "*"))
            .with_output(OutputSlot::new("", "*"))
    }

    #[test]
    fn test_reroute_chain_resolves_to_producer() {
        let mut graph = Graph::new();
        let a = graph.add_node(producer(1, "LATENT"));
        let r1 = graph.add_node(reroute(2));
        let r2 = graph.add_node(reroute(3));
        let b = graph.add_node(consumer(4, "LATENT"));
        graph.connect(&a, 0, &r1, 0).unwrap();
        graph.connect(&r1, 0, &r2, 0).unwrap();
        graph.connect(&r2, 0, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.link.origin_id, a);
        assert_eq!(resolved.hops, 2);
        assert_eq!(resolved.resolution, Resolution::Resolved);
    }

    #[test]
    fn test_unlinked_input_resolves_to_none() {
        let mut graph = Graph::new();
        let b = graph.add_node(consumer(1, "INT"));
        let compiler = PlanCompiler::default();
        assert!(compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).is_none());
    }

    #[test]
    fn test_bypass_falls_back_to_origin_slot() {
        let mut graph = Graph::new();
        let a = graph.add_node(producer(1, "IMAGE"));
        let bypassed = graph.add_node(
            Node::new(NodeId::from(2), "Upscale")
                .with_mode(NodeMode::Bypass)
                .with_input(InputSlot::new("image", "*"))
                .with_output(OutputSlot::new("IMAGE", "IMAGE")),
        );
        let b = graph.add_node(consumer(3, "IMAGE"));
        graph.connect(&a, 0, &bypassed, 0).unwrap();
        graph.connect(&bypassed, 0, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.link.origin_id, a);
        assert_eq!(resolved.resolution, Resolution::Resolved);
    }

    #[test]
    fn test_bypass_without_candidate_stalls() {
        let mut graph = Graph::new();
        let bypassed = graph.add_node(
            Node::new(NodeId::from(1), "EmptyLatent")
                .with_mode(NodeMode::Bypass)
                .with_output(OutputSlot::new("out", "INT"))
                .with_output(OutputSlot::new("LATENT", "LATENT")),
        );
        let b = graph.add_node(consumer(2, "LATENT"));
        graph.connect(&bypassed, 1, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.link.origin_id, bypassed);
        assert_eq!(resolved.resolution, Resolution::Stalled);
        assert!(!resolved.resolution.is_link_lost());
    }

    #[test]
    fn test_bypass_with_unlinked_match_is_disconnected() {
        let mut graph = Graph::new();
        let bypassed = graph.add_node(
            Node::new(NodeId::from(1), "Blur")
                .with_mode(NodeMode::Bypass)
                .with_input(InputSlot::new("image", "IMAGE"))
                .with_output(OutputSlot::new("IMAGE", "IMAGE")),
        );
        let b = graph.add_node(consumer(2, "IMAGE"));
        graph.connect(&bypassed, 0, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.link.origin_id, bypassed);
        assert_eq!(resolved.resolution, Resolution::Disconnected);
        assert!(resolved.resolution.is_link_lost());
    }

    #[test]
    fn test_unlinked_reroute_is_disconnected() {
        let mut graph = Graph::new();
        let r = graph.add_node(reroute(1));
        let b = graph.add_node(consumer(2, "INT"));
        graph.connect(&r, 0, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.resolution, Resolution::Disconnected);
    }

    #[test]
    fn test_muted_producer_is_not_a_hop() {
        let mut graph = Graph::new();
        let a = graph.add_node(producer(1, "INT"));
        let muted = graph.add_node(
            Node::new(NodeId::from(2), "Passthrough")
                .with_mode(NodeMode::Never)
                .with_input(InputSlot::new("in", "INT"))
                .with_output(OutputSlot::new("out", "INT")),
        );
        let b = graph.add_node(consumer(3, "INT"));
        graph.connect(&a, 0, &muted, 0).unwrap();
        graph.connect(&muted, 0, &b, 0).unwrap();

        let compiler = PlanCompiler::default();
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.link.origin_id, muted);
        assert_eq!(resolved.hops, 0);
    }

    struct Loopback;

    impl NodeBehavior for Loopback {
        fn class_type(&self) -> &str {
            "Loopback"
        }

        fn remap_link(&self, _node: &Node, link: &Link, _graph: &Graph) -> Option<Link> {
            Some(link.clone())
        }
    }

    #[test]
    fn test_walk_stops_at_hop_limit() {
        let mut graph = Graph::new();
        let looped = graph.add_node(Node::new(NodeId::from(1), "Loopback").with_output(OutputSlot::new("", "*")));
        let b = graph.add_node(consumer(2, "INT"));
        graph.connect(&looped, 0, &b, 0).unwrap();

        let mut behaviors = BehaviorRegistry::with_builtins();
        behaviors.register(Loopback);
        let compiler = PlanCompiler::new(behaviors).with_options(CompileOptions {
            max_link_hops: Some(8),
        });
        let resolved = compiler.resolve_input(&graph, graph.node(&b).unwrap(), 0).unwrap();
        assert_eq!(resolved.resolution, Resolution::HopLimit);
        assert_eq!(resolved.hops, 8);
    }

    struct ShiftSlot;

    impl NodeBehavior for ShiftSlot {
        fn class_type(&self) -> &str {
            "Producer"
        }

        fn is_virtual(&self) -> bool {
            false
        }

        fn update_link(&self, node: &Node, link: Link) -> Link {
            let id = node.id.clone();
            link.with_origin(id, 7)
        }
    }

    #[tokio::test]
    async fn test_update_link_rewrites_final_reference() {
        let mut graph = Graph::new();
        let a = graph.add_node(producer(1, "INT"));
        let b = graph.add_node(consumer(2, "INT"));
        graph.connect(&a, 0, &b, 0).unwrap();

        let mut behaviors = BehaviorRegistry::with_builtins();
        behaviors.register(ShiftSlot);
        let compiled = PlanCompiler::new(behaviors).compile(&mut graph).await.unwrap();

        assert!(compiled.output.contains("1"));
        assert_eq!(
            compiled.output.get("2").unwrap().inputs["in"],
            PlanInput::Link(NodeRef("1".to_string(), 7))
        );
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl ValueResolver for Counting {
        async fn resolve(&self, _node: &Node, _index: usize) -> Result<Value, WidgetError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!(format!("call-{n}")))
        }
    }

    #[tokio::test]
    async fn test_resolvers_run_in_widget_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = Graph::new();
        graph.add_node(
            Node::new(NodeId::from(1), "Text")
                .with_widget(Widget::new("a", "").with_resolver(Arc::new(Counting(calls.clone()))))
                .with_widget(Widget::new("b", "").with_resolver(Arc::new(Counting(calls.clone())))),
        );

        let compiled = PlanCompiler::default().compile(&mut graph).await.unwrap();
        let inputs = &compiled.output.get("1").unwrap().inputs;
        assert_eq!(inputs["a"], PlanInput::Value(json!("call-0")));
        assert_eq!(inputs["b"], PlanInput::Value(json!("call-1")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_same_widget_name_last_write_wins() {
        let mut graph = Graph::new();
        graph.add_node(
            Node::new(NodeId::from(1), "Text")
                .with_widget(Widget::new("text", "first"))
                .with_widget(Widget::new("text", "second")),
        );

        let compiled = PlanCompiler::default().compile(&mut graph).await.unwrap();
        let inputs = &compiled.output.get("1").unwrap().inputs;
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs["text"], PlanInput::Value(json!("second")));
    }

    #[tokio::test]
    async fn test_workflow_carries_plan_under_extra() {
        let mut graph = Graph::new();
        graph.extra.insert("ds".to_string(), json!({"scale": 1.0}));
        graph.add_node(Node::new(NodeId::from(1), "Text").with_widget(Widget::new("text", "hi")));

        let compiled = PlanCompiler::default().compile(&mut graph).await.unwrap();
        let extra = &compiled.workflow["extra"];
        assert_eq!(extra["api"], serde_json::to_value(&compiled.output).unwrap());
        assert_eq!(extra["inputs"], json!({}));
        assert_eq!(extra["outputs"], json!({}));
        assert_eq!(extra["ds"], json!({"scale": 1.0}));
    }
}
