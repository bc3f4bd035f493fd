//! Database engines whose plans can be analyzed

use serde::{Deserialize, Serialize};
use std::fmt;

/// The engine (and plan dialect) a raw plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEngine {
    /// SQL Server showplan XML
    SqlServer,
    /// PostgreSQL EXPLAIN (FORMAT JSON)
    PostgreSql,
}

impl PlanEngine {
    /// Returns the display name of the engine
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "SQL Server",
            Self::PostgreSql => "PostgreSQL",
        }
    }

    /// Schema assumed when a plan omits one
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::SqlServer => "dbo",
            Self::PostgreSql => "public",
        }
    }
}

impl fmt::Display for PlanEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
