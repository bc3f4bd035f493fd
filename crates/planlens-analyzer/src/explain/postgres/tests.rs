//! Tests for the PostgreSQL EXPLAIN parser

use super::*;
use pretty_assertions::assert_eq;

const HASH_JOIN_PLAN: &str = r#"[
    {
        "Plan": {
            "Node Type": "Hash Join",
            "Join Type": "Inner",
            "Hash Cond": "(o.user_id = u.id)",
            "Startup Cost": 10.00,
            "Total Cost": 100.00,
            "Plan Rows": 500,
            "Plan Width": 72,
            "Plans": [
                {
                    "Node Type": "Seq Scan",
                    "Parent Relationship": "Outer",
                    "Relation Name": "orders",
                    "Schema": "sales",
                    "Alias": "o",
                    "Startup Cost": 0.00,
                    "Total Cost": 50.00,
                    "Plan Rows": 1000,
                    "Plan Width": 36,
                    "Output": ["o.id", "o.user_id", "o.total"]
                },
                {
                    "Node Type": "Hash",
                    "Parent Relationship": "Inner",
                    "Startup Cost": 5.00,
                    "Total Cost": 10.00,
                    "Plan Rows": 100,
                    "Plan Width": 36,
                    "Plans": [
                        {
                            "Node Type": "Index Scan",
                            "Relation Name": "users",
                            "Alias": "users",
                            "Index Name": "users_pkey",
                            "Index Cond": "(id < 100)",
                            "Startup Cost": 0.00,
                            "Total Cost": 5.00,
                            "Plan Rows": 100,
                            "Plan Width": 36
                        }
                    ]
                }
            ]
        },
        "Planning Time": 0.25,
        "Execution Time": 12.5
    }
]"#;

#[test]
fn test_can_parse() {
    let parser = PostgresJsonParser::new();
    assert!(parser.can_parse(HASH_JOIN_PLAN));
    assert!(parser.can_parse(r#"{"plan": {"Node Type": "Result"}}"#));
    assert!(!parser.can_parse(r#"[{"query_block": {}}]"#));
    assert!(!parser.can_parse("[not json"));
    assert!(!parser.can_parse("<ShowPlanXML/>"));
    assert_eq!(parser.engine(), PlanEngine::PostgreSql);
}

#[test]
fn test_parse_hash_join_tree() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");

    assert_eq!(plan.node_count(), 4);
    assert_eq!(plan.root.kind, OperatorKind::HashJoin);
    assert_eq!(plan.root.kind.display_name(), "hash join");
    assert_eq!(plan.root.children.len(), 2);
    assert_eq!(plan.root.children[0].kind, OperatorKind::SequentialScan);
    assert_eq!(plan.root.children[1].kind, OperatorKind::Hash);
    assert_eq!(
        plan.root.children[1].children[0].kind,
        OperatorKind::IndexScan
    );
    assert_eq!(plan.root.max_depth(), 3);
}

#[test]
fn test_ids_are_depth_first() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");
    let ids: Vec<_> = plan.iter_nodes().map(|n| (n.id, n.depth)).collect();
    assert_eq!(ids, vec![(0, 0), (1, 1), (2, 1), (3, 2)]);
}

#[test]
fn test_own_cost_subtracts_children() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");

    let own: Vec<f64> = plan.iter_nodes().map(|n| n.cost.total_cost).collect();
    assert_eq!(own, vec![40.0, 50.0, 5.0, 5.0]);

    let pcts: Vec<f64> = plan.iter_nodes().map(|n| n.cost.cost_percentage).collect();
    assert_eq!(pcts, vec![40.0, 50.0, 5.0, 5.0]);
    assert_eq!(plan.root.cost.subtree_cost, 100.0);
    assert_eq!(plan.metrics.total_cost, 100.0);
}

#[test]
fn test_table_and_index_references() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");

    let orders = plan.root.children[0].table.as_ref().expect("table");
    assert_eq!(orders.name, "orders");
    assert_eq!(orders.schema, "sales");
    assert_eq!(orders.alias.as_deref(), Some("o"));

    let users_scan = &plan.root.children[1].children[0];
    let users = users_scan.table.as_ref().expect("table");
    assert_eq!(users.schema, "public");
    assert!(users.alias.is_none());
    let index = users_scan.index.as_ref().expect("index");
    assert_eq!(index.name, "users_pkey");
    assert_eq!(index.table, "users");

    assert!(plan.root.table.is_none());
    assert!(plan.root.children[1].table.is_none());
}

#[test]
fn test_predicates_and_output() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");
    assert_eq!(plan.root.predicate, "(o.user_id = u.id)");
    assert_eq!(plan.root.children[1].children[0].predicate, "(id < 100)");
    assert_eq!(plan.root.children[1].predicate, "");
    assert_eq!(
        plan.root.children[0].output_columns,
        vec!["o.id", "o.user_id", "o.total"]
    );
}

#[test]
fn test_filter_preferred_over_join_conditions() {
    let json = r#"[{"Plan": {
        "Node Type": "Nested Loop",
        "Join Filter": "(a.x = b.x)",
        "Filter": "(a.y > 5)",
        "Total Cost": 1.0
    }}]"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(plan.root.predicate, "(a.y > 5)");
}

#[test]
fn test_unknown_keys_are_kept_as_properties() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");
    assert_eq!(
        plan.root.properties.get("Join Type").map(String::as_str),
        Some("Inner")
    );
    assert_eq!(
        plan.root.properties.get("Plan Width").map(String::as_str),
        Some("72")
    );
    assert!(!plan.root.properties.contains_key("Plans"));
}

#[test]
fn test_timing_metrics() {
    let plan = parse_postgres_explain(HASH_JOIN_PLAN).expect("parse failed");
    assert_eq!(plan.engine, PlanEngine::PostgreSql);
    assert_eq!(plan.metrics.planning_time_ms, 0.25);
    assert_eq!(plan.metrics.elapsed_time_ms, 12.5);
    assert_eq!(plan.metrics.degree_of_parallelism, 1);
    assert_eq!(plan.metrics.scan_count, 2);
    assert_eq!(plan.metrics.join_count, 1);
}

#[test]
fn test_explain_analyze_fields() {
    let json = r#"[
        {
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "events",
                "Total Cost": 20.0,
                "Plan Rows": 100,
                "Actual Rows": 5,
                "Actual Loops": 3,
                "Filter": "(kind = 'click'::text)",
                "Rows Removed by Filter": 9995,
                "Shared Hit Blocks": 40,
                "Shared Read Blocks": 10
            },
            "Execution Time": 3.5
        }
    ]"#;

    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(plan.root.cost.actual_rows, 5.0);
    assert_eq!(plan.root.cost.execution_count, 3);
    assert_eq!(plan.metrics.logical_reads, 50);
    assert_eq!(plan.metrics.physical_reads, 10);
    assert_eq!(plan.metrics.rows_affected, 5);
    assert!(plan.root.has_warning);
    assert_eq!(
        plan.root.warning_message.as_deref(),
        Some("Filter removed 9995 rows to return 5")
    );
}

#[test]
fn test_small_filter_removal_is_not_a_warning() {
    let json = r#"[{"Plan": {
        "Node Type": "Seq Scan",
        "Relation Name": "t",
        "Total Cost": 1.0,
        "Actual Rows": 50,
        "Rows Removed by Filter": 100
    }}]"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert!(!plan.root.has_warning);
}

#[test]
fn test_spill_warnings() {
    let json = r#"[{"Plan": {
        "Node Type": "Sort",
        "Total Cost": 10.0,
        "Sort Space Type": "Disk",
        "Plans": [
            {"Node Type": "Hash", "Total Cost": 5.0, "Hash Batches": 4}
        ]
    }}]"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(
        plan.root.warning_message.as_deref(),
        Some("Sort spilled to disk")
    );
    assert_eq!(
        plan.root.children[0].warning_message.as_deref(),
        Some("Hash spilled to disk in 4 batches")
    );
}

#[test]
fn test_aggregate_strategy_and_modify_table() {
    let json = r#"{"Plan": {
        "Node Type": "ModifyTable",
        "Operation": "Delete",
        "Total Cost": 3.0,
        "Plans": [
            {"Node Type": "Aggregate", "Strategy": "Hashed", "Total Cost": 2.0},
            {"Node Type": "Aggregate", "Strategy": "Sorted", "Total Cost": 1.0},
            {"Node Type": "Aggregate", "Strategy": "Plain", "Total Cost": 0.0}
        ]
    }}"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(plan.root.kind, OperatorKind::Delete);
    let kinds: Vec<_> = plan.root.children.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperatorKind::HashAggregate,
            OperatorKind::StreamAggregate,
            OperatorKind::Aggregate,
        ]
    );
}

#[test]
fn test_zero_total_cost_yields_zero_percentages() {
    let json = r#"[{"Plan": {"Node Type": "Result", "Total Cost": 0.0}}]"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(plan.root.cost.cost_percentage, 0.0);
    assert!(!plan.root.cost.cost_percentage.is_nan());
}

#[test]
fn test_parallel_workers_set_parallelism() {
    let json = r#"[{"Plan": {
        "Node Type": "Gather",
        "Workers Planned": 2,
        "Workers Launched": 2,
        "Total Cost": 5.0,
        "Plans": [{"Node Type": "Seq Scan", "Relation Name": "big", "Total Cost": 4.0}]
    }}]"#;
    let plan = parse_postgres_explain(json).expect("parse failed");
    assert_eq!(plan.root.kind, OperatorKind::Parallelism);
    assert_eq!(plan.metrics.degree_of_parallelism, 3);
}

#[test]
fn test_invalid_json_fails() {
    let err = parse_postgres_explain("[{").unwrap_err();
    assert!(matches!(err, PlanError::ParseFailure(_)));
}

#[test]
fn test_missing_plan_fails() {
    let err = parse_postgres_explain(r#"[{"Query": {}}]"#).unwrap_err();
    assert!(matches!(err, PlanError::ParseFailure(ref m) if m.contains("Plan")));
}

#[test]
fn test_missing_node_type_fails() {
    let err = parse_postgres_explain(r#"[{"Plan": {"Total Cost": 1.0}}]"#).unwrap_err();
    assert!(matches!(err, PlanError::ParseFailure(ref m) if m.contains("Node Type")));
}

#[test]
fn test_empty_array_fails() {
    assert!(parse_postgres_explain("[]").is_err());
}

#[tokio::test]
async fn test_parse_checks_cancellation_first() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = PostgresJsonParser::new()
        .parse(HASH_JOIN_PLAN, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
