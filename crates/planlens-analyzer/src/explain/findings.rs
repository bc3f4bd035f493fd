//! Analysis results attached to an execution plan

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Maps an estimated improvement percentage onto a severity
    pub fn from_improvement(pct: f64) -> Self {
        if pct >= 90.0 {
            Self::Critical
        } else if pct >= 50.0 {
            Self::High
        } else if pct >= 20.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns true for `High` and `Critical`
    pub fn is_high_or_above(&self) -> bool {
        *self >= Self::High
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected performance issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BottleneckInfo {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Id of the node that triggered the finding, resolved with
    /// `ExecutionPlan::find_node`
    pub node_id: Option<usize>,
    pub recommendation: String,
    /// Share of plan cost affected, 0-100
    pub impact_percentage: f64,
}

impl BottleneckInfo {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            node_id: None,
            recommendation: recommendation.into(),
            impact_percentage: 0.0,
        }
    }

    pub fn with_node(mut self, node_id: usize) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_impact(mut self, pct: f64) -> Self {
        self.impact_percentage = pct.clamp(0.0, 100.0);
        self
    }
}

/// A proposed index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSuggestion {
    pub schema: String,
    pub table: String,
    pub key_columns: Vec<String>,
    pub included_columns: Vec<String>,
    pub reason: String,
    /// Estimated improvement, 0-100
    pub estimated_improvement: f64,
    pub impact: Severity,
}

impl IndexSuggestion {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        key_columns: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            key_columns,
            included_columns: Vec::new(),
            reason: reason.into(),
            estimated_improvement: 0.0,
            impact: Severity::Low,
        }
    }

    pub fn with_included_columns(mut self, columns: Vec<String>) -> Self {
        self.included_columns = columns;
        self
    }

    pub fn with_improvement(mut self, pct: f64, impact: Severity) -> Self {
        self.estimated_improvement = pct.clamp(0.0, 100.0);
        self.impact = impact;
        self
    }

    /// `IX_<table>_<key1>_<key2>...`
    pub fn index_name(&self) -> String {
        let mut name = format!("IX_{}", self.table);
        for key in &self.key_columns {
            name.push('_');
            name.push_str(key);
        }
        name
    }

    /// The `CREATE INDEX` statement for this suggestion, derived from the
    /// other fields on every call
    pub fn create_statement(&self) -> String {
        let mut sql = format!(
            "CREATE NONCLUSTERED INDEX [{}] ON [{}.{}] ({})",
            self.index_name(),
            self.schema,
            self.table,
            self.key_columns.join(", ")
        );
        if !self.included_columns.is_empty() {
            sql.push_str(&format!(" INCLUDE ({})", self.included_columns.join(", ")));
        }
        sql.push(';');
        sql
    }
}
