//! Operator taxonomy shared by every plan dialect
//!
//! Each dialect maps its own operator names onto `OperatorKind` through a
//! fixed lookup table. Names that are not in the table become
//! `OperatorKind::Other`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad family an operator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCategory {
    Scan,
    Seek,
    Lookup,
    Join,
    Aggregate,
    Sort,
    Filter,
    Top,
    Dml,
    Compute,
    Other,
}

/// Type of operation performed by a plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    // Scan operations
    TableScan,
    ClusteredIndexScan,
    IndexScan,
    SequentialScan,
    IndexOnlyScan,
    BitmapHeapScan,
    BitmapIndexScan,

    // Seek operations
    ClusteredIndexSeek,
    IndexSeek,

    // Lookups
    KeyLookup,
    RidLookup,

    // Join operations
    NestedLoops,
    HashJoin,
    MergeJoin,

    // Aggregation operations
    HashAggregate,
    StreamAggregate,
    Aggregate,

    Sort,
    Filter,
    Top,

    // Modification operations
    Insert,
    Update,
    Delete,

    // Compute and plumbing
    ComputeScalar,
    Hash,
    Materialize,
    Spool,
    Parallelism,
    Concatenation,

    Other,
}

impl OperatorKind {
    /// Maps a SQL Server showplan physical operator onto the shared taxonomy.
    ///
    /// `Hash Match` is split on the logical operator, since SQL Server uses
    /// the same physical operator for hash joins and hash aggregates.
    pub fn from_showplan(physical_op: &str, logical_op: &str) -> Self {
        match physical_op {
            "Table Scan" => Self::TableScan,
            "Clustered Index Scan" => Self::ClusteredIndexScan,
            "Index Scan" | "Columnstore Index Scan" => Self::IndexScan,
            "Clustered Index Seek" => Self::ClusteredIndexSeek,
            "Index Seek" => Self::IndexSeek,
            "Key Lookup" => Self::KeyLookup,
            "RID Lookup" => Self::RidLookup,
            "Nested Loops" => Self::NestedLoops,
            "Hash Match" => match logical_op {
                "Aggregate" | "Partial Aggregate" | "Flow Distinct" => Self::HashAggregate,
                _ => Self::HashJoin,
            },
            "Merge Join" => Self::MergeJoin,
            "Stream Aggregate" => Self::StreamAggregate,
            "Sort" => Self::Sort,
            "Filter" => Self::Filter,
            "Top" => Self::Top,
            "Table Insert" | "Clustered Index Insert" | "Index Insert" => Self::Insert,
            "Table Update" | "Clustered Index Update" | "Index Update" => Self::Update,
            "Table Delete" | "Clustered Index Delete" | "Index Delete" => Self::Delete,
            "Compute Scalar" => Self::ComputeScalar,
            "Table Spool" | "Index Spool" | "Row Count Spool" | "Window Spool" => Self::Spool,
            "Parallelism" => Self::Parallelism,
            "Concatenation" => Self::Concatenation,
            _ => Self::Other,
        }
    }

    /// Maps a PostgreSQL `Node Type` onto the shared taxonomy
    pub fn from_postgres(node_type: &str) -> Self {
        match node_type {
            "Seq Scan" => Self::SequentialScan,
            "Index Scan" => Self::IndexScan,
            "Index Only Scan" => Self::IndexOnlyScan,
            "Bitmap Heap Scan" => Self::BitmapHeapScan,
            "Bitmap Index Scan" => Self::BitmapIndexScan,
            "Nested Loop" => Self::NestedLoops,
            "Hash Join" => Self::HashJoin,
            "Merge Join" => Self::MergeJoin,
            "HashAggregate" | "Hash Aggregate" => Self::HashAggregate,
            "GroupAggregate" | "Group Aggregate" => Self::StreamAggregate,
            "Aggregate" => Self::Aggregate,
            "Sort" | "Incremental Sort" => Self::Sort,
            "Limit" => Self::Top,
            "Result" | "ProjectSet" => Self::ComputeScalar,
            "Hash" => Self::Hash,
            "Materialize" | "Memoize" => Self::Materialize,
            "Gather" | "Gather Merge" => Self::Parallelism,
            "Append" | "Merge Append" => Self::Concatenation,
            _ => Self::Other,
        }
    }

    /// Returns the family this operator belongs to
    pub fn category(&self) -> OperatorCategory {
        match self {
            Self::TableScan
            | Self::ClusteredIndexScan
            | Self::IndexScan
            | Self::SequentialScan
            | Self::IndexOnlyScan
            | Self::BitmapHeapScan
            | Self::BitmapIndexScan => OperatorCategory::Scan,
            Self::ClusteredIndexSeek | Self::IndexSeek => OperatorCategory::Seek,
            Self::KeyLookup | Self::RidLookup => OperatorCategory::Lookup,
            Self::NestedLoops | Self::HashJoin | Self::MergeJoin => OperatorCategory::Join,
            Self::HashAggregate | Self::StreamAggregate | Self::Aggregate => {
                OperatorCategory::Aggregate
            }
            Self::Sort => OperatorCategory::Sort,
            Self::Filter => OperatorCategory::Filter,
            Self::Top => OperatorCategory::Top,
            Self::Insert | Self::Update | Self::Delete => OperatorCategory::Dml,
            Self::ComputeScalar
            | Self::Hash
            | Self::Materialize
            | Self::Spool
            | Self::Parallelism
            | Self::Concatenation => OperatorCategory::Compute,
            Self::Other => OperatorCategory::Other,
        }
    }

    /// Returns true for any scan operator, including index scans
    pub fn is_scan(&self) -> bool {
        self.category() == OperatorCategory::Scan
    }

    /// Returns true for operators that read every row of a table
    pub fn is_full_scan(&self) -> bool {
        matches!(
            self,
            Self::TableScan | Self::ClusteredIndexScan | Self::SequentialScan
        )
    }

    pub fn is_seek(&self) -> bool {
        self.category() == OperatorCategory::Seek
    }

    pub fn is_lookup(&self) -> bool {
        self.category() == OperatorCategory::Lookup
    }

    pub fn is_join(&self) -> bool {
        self.category() == OperatorCategory::Join
    }

    pub fn is_sort(&self) -> bool {
        self.category() == OperatorCategory::Sort
    }

    /// Lower-case name of the kind, e.g. `"clustered index seek"`
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TableScan => "table scan",
            Self::ClusteredIndexScan => "clustered index scan",
            Self::IndexScan => "index scan",
            Self::SequentialScan => "sequential scan",
            Self::IndexOnlyScan => "index only scan",
            Self::BitmapHeapScan => "bitmap heap scan",
            Self::BitmapIndexScan => "bitmap index scan",
            Self::ClusteredIndexSeek => "clustered index seek",
            Self::IndexSeek => "index seek",
            Self::KeyLookup => "key lookup",
            Self::RidLookup => "rid lookup",
            Self::NestedLoops => "nested loops",
            Self::HashJoin => "hash join",
            Self::MergeJoin => "merge join",
            Self::HashAggregate => "hash aggregate",
            Self::StreamAggregate => "stream aggregate",
            Self::Aggregate => "aggregate",
            Self::Sort => "sort",
            Self::Filter => "filter",
            Self::Top => "top",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ComputeScalar => "compute scalar",
            Self::Hash => "hash",
            Self::Materialize => "materialize",
            Self::Spool => "spool",
            Self::Parallelism => "parallelism",
            Self::Concatenation => "concatenation",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
