//! Cost Analyzer - read-only cost queries over a plan

use crate::explain::{ExecutionPlan, PlanNode};
use serde::{Deserialize, Serialize};

/// Cost percentage at or above which an operation counts as expensive
pub const DEFAULT_EXPENSIVE_THRESHOLD: f64 = 20.0;

/// Read-only cost queries over one plan
#[derive(Debug, Clone, Copy)]
pub struct CostAnalyzer<'a> {
    plan: &'a ExecutionPlan,
}

impl<'a> CostAnalyzer<'a> {
    pub fn new(plan: &'a ExecutionPlan) -> Self {
        Self { plan }
    }

    /// Operations whose cost percentage is at or above `threshold`, most
    /// expensive first. Equal costs keep traversal order.
    pub fn expensive_operations(&self, threshold: f64) -> Vec<&'a PlanNode> {
        let mut nodes: Vec<_> = self
            .plan
            .iter_nodes()
            .filter(|n| n.cost.cost_percentage >= threshold)
            .collect();
        nodes.sort_by(|a, b| b.cost.cost_percentage.total_cmp(&a.cost.cost_percentage));
        nodes
    }

    /// The node with the highest cost percentage; the first in traversal
    /// order wins a tie
    pub fn most_expensive(&self) -> Option<&'a PlanNode> {
        self.plan.iter_nodes().fold(None, |best, node| match best {
            Some(b) if b.cost.cost_percentage >= node.cost.cost_percentage => Some(b),
            _ => Some(node),
        })
    }

    /// Nodes whose CPU cost exceeds twice their IO cost
    pub fn cpu_bound_operations(&self) -> Vec<&'a PlanNode> {
        self.plan
            .iter_nodes()
            .filter(|n| n.cost.cpu_cost > n.cost.io_cost * 2.0)
            .collect()
    }

    /// Nodes whose IO cost exceeds twice their CPU cost
    pub fn io_bound_operations(&self) -> Vec<&'a PlanNode> {
        self.plan
            .iter_nodes()
            .filter(|n| n.cost.io_cost > n.cost.cpu_cost * 2.0)
            .collect()
    }

    /// Combined cost percentage of every scan operator
    pub fn scan_cost_percentage(&self) -> f64 {
        self.plan
            .iter_nodes()
            .filter(|n| n.kind.is_scan())
            .map(|n| n.cost.cost_percentage)
            .sum()
    }

    /// Summarizes the plan's cost profile
    pub fn summary(&self, threshold: f64) -> CostSummary {
        let (cpu, io) = self
            .plan
            .iter_nodes()
            .fold((0.0, 0.0), |(cpu, io), n| (cpu + n.cost.cpu_cost, io + n.cost.io_cost));

        CostSummary {
            total_cost: self.plan.total_cost(),
            total_cpu_cost: cpu,
            total_io_cost: io,
            max_cost_percentage: self.plan.max_cost_percentage(),
            most_expensive_node: self.most_expensive().map(|n| n.id),
            expensive_node_ids: self
                .expensive_operations(threshold)
                .iter()
                .map(|n| n.id)
                .collect(),
            scan_cost_percentage: self.scan_cost_percentage(),
        }
    }
}

/// Snapshot of a plan's cost profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_cpu_cost: f64,
    pub total_io_cost: f64,
    pub max_cost_percentage: f64,
    pub most_expensive_node: Option<usize>,
    /// Expensive node ids, most expensive first
    pub expensive_node_ids: Vec<usize>,
    pub scan_cost_percentage: f64,
}

#[cfg(test)]
mod tests;
