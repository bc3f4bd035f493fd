//! Execution Plan Module
//!
//! This module holds the canonical plan model and the parsers that produce it:
//! - SQL Server showplan XML
//! - PostgreSQL `EXPLAIN (FORMAT JSON)`
//!
//! # Example
//!
//! ```
//! use planlens_analyzer::explain::{OperatorKind, parse_postgres_explain};
//!
//! let pg_json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users", "Total Cost": 10.0}}]"#;
//! let plan = parse_postgres_explain(pg_json).unwrap();
//! assert_eq!(plan.root.kind, OperatorKind::SequentialScan);
//! ```

pub mod findings;
pub mod normalizer;
pub mod operator;
pub mod parser;
pub mod plan;
pub mod postgres;
pub mod showplan;

pub use findings::{BottleneckInfo, IndexSuggestion, Severity};
pub use normalizer::PlanNormalizer;
pub use operator::{OperatorCategory, OperatorKind};
pub use parser::{PlanParser, cost_percentage};
pub use plan::{
    ExecutionPlan, IndexReference, OperationCost, PlanNode, PlanNodeIterator, QueryMetrics,
    TableReference,
};
pub use postgres::{PostgresJsonParser, parse_postgres_explain};
pub use showplan::{SHOWPLAN_NAMESPACE, ShowplanParser, parse_showplan};
