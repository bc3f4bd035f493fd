//! Layered tree layout
//!
//! Nodes are assigned to layers by breadth-first distance from the root.
//! Within a layer, nodes are ordered by the position of their parent in the
//! layer above, which keeps edges from crossing for a tree. Every layer is
//! centered on the widest one.

use crate::explain::{ExecutionPlan, PlanNode};
use crate::settings::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Placement of one node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub node_id: usize,
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Breadth-first distance from the root
    pub layer: usize,
}

impl NodePosition {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

/// A parent-to-child edge, from the parent's bottom-center to the child's
/// top-center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub from_id: usize,
    pub to_id: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Computed layout of a plan tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Positions, layer by layer, left to right
    pub nodes: Vec<NodePosition>,
    pub edges: Vec<LayoutEdge>,
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
}

impl LayoutResult {
    /// Position of the node with the given id
    pub fn position(&self, node_id: usize) -> Option<&NodePosition> {
        self.nodes.iter().find(|p| p.node_id == node_id)
    }

    pub fn layer_count(&self) -> usize {
        self.nodes.iter().map(|p| p.layer + 1).max().unwrap_or(0)
    }

    /// Positions in one layer, left to right
    pub fn layer(&self, layer: usize) -> impl Iterator<Item = &NodePosition> {
        self.nodes.iter().filter(move |p| p.layer == layer)
    }
}

/// A node reached by the breadth-first walk
struct Visit<'a> {
    node: &'a PlanNode,
    layer: usize,
    /// Index of the parent visit
    parent: Option<usize>,
}

/// Computes layered layouts for plan trees
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lays out the plan's tree
    pub fn layout_plan(&self, plan: &ExecutionPlan) -> LayoutResult {
        self.layout(&plan.root)
    }

    /// Lays out the tree rooted at `root`. Identical trees always produce
    /// identical coordinates.
    pub fn layout(&self, root: &PlanNode) -> LayoutResult {
        let visits = breadth_first(root);
        let layers = order_layers(&visits);

        let config = &self.config;
        let widest = layers.iter().map(Vec::len).max().unwrap_or(0);
        let max_width = self.layer_width(widest);

        let mut placed: Vec<Option<NodePosition>> = vec![None; visits.len()];
        let mut nodes = Vec::with_capacity(visits.len());

        for (layer, members) in layers.iter().enumerate() {
            let offset = (max_width - self.layer_width(members.len())) / 2.0;
            let y = config.padding + layer as f64 * config.row_pitch();

            for (slot, &index) in members.iter().enumerate() {
                let position = NodePosition {
                    node_id: visits[index].node.id,
                    x: config.padding + offset + slot as f64 * config.column_pitch(),
                    y,
                    width: config.node_width,
                    height: config.node_height,
                    layer,
                };
                placed[index] = Some(position);
                nodes.push(position);
            }
        }

        let edges: Vec<LayoutEdge> = layers
            .iter()
            .flatten()
            .filter_map(|&index| {
                let child = placed[index]?;
                let parent = placed[visits[index].parent?]?;
                Some(LayoutEdge {
                    from_id: parent.node_id,
                    to_id: child.node_id,
                    x1: parent.center_x(),
                    y1: parent.bottom(),
                    x2: child.center_x(),
                    y2: child.y,
                })
            })
            .collect();

        let width = nodes.iter().map(NodePosition::right).fold(0.0, f64::max) + config.padding;
        let height = config.padding + layers.len() as f64 * config.row_pitch();

        tracing::trace!(
            nodes = nodes.len(),
            layers = layers.len(),
            width,
            height,
            "computed plan layout"
        );

        LayoutResult {
            nodes,
            edges,
            width,
            height,
        }
    }

    fn layer_width(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            count as f64 * self.config.node_width
                + (count - 1) as f64 * self.config.horizontal_spacing
        }
    }
}

fn breadth_first(root: &PlanNode) -> Vec<Visit<'_>> {
    let mut visits = Vec::new();
    let mut queue = VecDeque::from([(root, 0, None)]);

    while let Some((node, layer, parent)) = queue.pop_front() {
        let index = visits.len();
        visits.push(Visit {
            node,
            layer,
            parent,
        });
        for child in &node.children {
            queue.push_back((child, layer + 1, Some(index)));
        }
    }

    visits
}

/// Groups visits by layer, ordering each layer by the slot of the parent in
/// the layer above (stable, so siblings keep their child order)
fn order_layers(visits: &[Visit<'_>]) -> Vec<Vec<usize>> {
    let layer_count = visits.iter().map(|v| v.layer + 1).max().unwrap_or(0);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for (index, visit) in visits.iter().enumerate() {
        layers[visit.layer].push(index);
    }

    let mut slots = vec![0usize; visits.len()];
    for layer in &mut layers {
        layer.sort_by_key(|&index| visits[index].parent.map_or(0, |parent| slots[parent]));
        for (slot, &index) in layer.iter().enumerate() {
            slots[index] = slot;
        }
    }

    layers
}
