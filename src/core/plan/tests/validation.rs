//! Per-spec validation: bad specs are dropped, the rest of the plan survives.

use crate::core::plan::{
    Plan, PlanValidationError, QuerySpec, RejectedSpec, TargetServers, is_table_identifier,
};

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn empty_target_tables_rejects_only_that_spec() {
    let text = r#"[
        {"sql": "SELECT * FROM oracle_tb", "target_tables": [], "target_servers": ["all"]},
        {"sql": "SELECT * FROM mysql_tb", "target_tables": ["mysql_tb"], "target_servers": ["all"]}
    ]"#;
    let plan = Plan::parse(text).unwrap();
    assert_eq!(plan.specs.len(), 1);
    assert_eq!(plan.specs[0].target_tables(), ["mysql_tb".to_string()]);
    assert_eq!(
        plan.rejected,
        vec![RejectedSpec {
            index: 0,
            error: PlanValidationError::EmptyTargetTables
        }]
    );
}

#[test]
fn empty_target_servers_is_rejected() {
    let text = r#"[
        {"sql": "SELECT 1 FROM t", "target_tables": ["t"], "target_servers": []},
        {"sql": "SELECT 1 FROM t", "target_tables": ["t"], "target_servers": ["  "]},
        {"sql": "SELECT 1 FROM t", "target_tables": ["t"], "target_servers": ""}
    ]"#;
    let plan = Plan::parse(text).unwrap();
    assert!(plan.specs.is_empty());
    assert_eq!(plan.rejected.len(), 3);
    assert!(
        plan.rejected
            .iter()
            .all(|r| r.error == PlanValidationError::EmptyTargetServers)
    );
}

#[test]
fn blank_sql_template_is_rejected() {
    let err = QuerySpec::new(
        "   ",
        names(&["oracle_tb"]),
        TargetServers::All,
        "",
        "",
    )
    .unwrap_err();
    assert_eq!(err, PlanValidationError::EmptySqlTemplate);
}

#[test]
fn table_names_must_be_identifiers() {
    let err = QuerySpec::new(
        "SELECT * FROM {table}",
        names(&["oracle_tb; DROP TABLE users"]),
        TargetServers::All,
        "",
        "",
    )
    .unwrap_err();
    assert!(matches!(err, PlanValidationError::InvalidTableName(_)));
}

#[test]
fn all_sentinel_only_counts_when_alone() {
    let spec = QuerySpec::new(
        "SELECT 1 FROM t",
        names(&["t"]),
        TargetServers::Named(names(&["all", " all"])),
        "",
        "",
    )
    .unwrap();
    assert_eq!(spec.target_servers(), &TargetServers::All);

    let mixed = QuerySpec::new(
        "SELECT 1 FROM t",
        names(&["t"]),
        TargetServers::Named(names(&["all", "DC4"])),
        "",
        "",
    )
    .unwrap();
    assert_eq!(
        mixed.target_servers(),
        &TargetServers::Named(names(&["all", "DC4"]))
    );
}

#[test]
fn uppercase_all_is_just_a_name() {
    let spec = QuerySpec::new(
        "SELECT 1 FROM t",
        names(&["t"]),
        TargetServers::Named(names(&["ALL"])),
        "",
        "",
    )
    .unwrap();
    assert_eq!(spec.target_servers(), &TargetServers::Named(names(&["ALL"])));
}

#[test]
fn duplicate_targets_are_collapsed_in_order() {
    let spec = QuerySpec::new(
        "SELECT 1 FROM t",
        names(&["mysql_tb", " oracle_tb", "mysql_tb"]),
        TargetServers::Named(names(&["GB00", "DC4", "GB00 "])),
        "",
        "",
    )
    .unwrap();
    assert_eq!(
        spec.target_tables(),
        ["mysql_tb".to_string(), "oracle_tb".to_string()]
    );
    assert_eq!(
        spec.target_servers(),
        &TargetServers::Named(names(&["GB00", "DC4"]))
    );
}

#[test]
fn unknown_server_names_still_validate() {
    let spec = QuerySpec::new(
        "SELECT 1 FROM t",
        names(&["t"]),
        TargetServers::Named(names(&["UNKNOWN_DC"])),
        "",
        "",
    );
    assert!(spec.is_ok());
}

#[test]
fn identifier_rules() {
    assert!(is_table_identifier("oracle_tb"));
    assert!(is_table_identifier("_staging"));
    assert!(is_table_identifier("inventory.mysql_tb"));
    assert!(!is_table_identifier(""));
    assert!(!is_table_identifier("1table"));
    assert!(!is_table_identifier("inventory."));
    assert!(!is_table_identifier("my-table"));
    assert!(!is_table_identifier("t where 1=1"));
}
