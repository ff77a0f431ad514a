//! Tests for locating and parsing plan documents.

use crate::core::plan::{Plan, PlanParseError, TargetServers, extract_json_block};

const ORACLE_DC4: &str = r#"[
    {
        "sql": "SELECT hostname, database_name, database_status FROM oracle_tb ORDER BY hostname",
        "target_tables": ["oracle_tb"],
        "target_servers": ["DC4"],
        "reason": "Oracle servers in DC4",
        "expected_result": "List of Oracle servers"
    }
]"#;

#[test]
fn parse_raw_json_array() {
    let plan = Plan::parse(ORACLE_DC4).expect("valid plan");
    assert_eq!(plan.specs.len(), 1);
    assert!(plan.rejected.is_empty());
    let spec = &plan.specs[0];
    assert_eq!(spec.target_tables(), ["oracle_tb".to_string()]);
    assert_eq!(
        spec.target_servers(),
        &TargetServers::Named(vec!["DC4".to_string()])
    );
    assert_eq!(spec.reason(), "Oracle servers in DC4");
    assert_eq!(spec.expected_result(), "List of Oracle servers");
}

#[test]
fn parse_fenced_block_with_surrounding_prose() {
    let text = format!("Here is the plan:\n```json\n{}\n```\nLet me know.", ORACLE_DC4);
    let plan = Plan::parse(&text).expect("fenced plan");
    assert_eq!(plan.specs.len(), 1);
}

#[test]
fn parse_unlabelled_fence() {
    let text = format!("```\n{}\n```", ORACLE_DC4);
    assert_eq!(Plan::parse(&text).unwrap().specs.len(), 1);
}

#[test]
fn sql_template_field_name_is_accepted() {
    let text = r#"[{"sql_template": "database_status = 'DOWN'", "target_tables": ["mysql_tb"], "target_servers": "all"}]"#;
    let plan = Plan::parse(text).unwrap();
    assert_eq!(plan.specs[0].sql_template(), "database_status = 'DOWN'");
    assert_eq!(plan.specs[0].target_servers(), &TargetServers::All);
    assert_eq!(plan.specs[0].reason(), "");
}

#[test]
fn prose_without_json_is_rejected() {
    assert!(matches!(
        Plan::parse("I could not produce a plan for that."),
        Err(PlanParseError::NoJson)
    ));
    assert!(matches!(Plan::parse(""), Err(PlanParseError::NoJson)));
}

#[test]
fn object_document_is_rejected() {
    let text = r#"{"queries": []}"#;
    assert!(matches!(Plan::parse(text), Err(PlanParseError::NotAnArray)));
}

#[test]
fn missing_required_field_rejects_whole_document() {
    let text = r#"[{"sql": "SELECT 1 FROM oracle_tb", "target_servers": ["all"]}]"#;
    assert!(matches!(Plan::parse(text), Err(PlanParseError::Schema(_))));
}

#[test]
fn wrong_field_type_rejects_whole_document() {
    let text = r#"[{"sql": "SELECT 1 FROM t", "target_tables": "oracle_tb", "target_servers": 4}]"#;
    assert!(matches!(Plan::parse(text), Err(PlanParseError::Schema(_))));
}

#[test]
fn empty_array_is_an_empty_plan() {
    let plan = Plan::parse("[]").unwrap();
    assert!(plan.is_empty());
    assert!(plan.rejected.is_empty());
}

#[test]
fn extract_prefers_json_fence() {
    let text = "```text\nnot json\n```\n```json\n[1]\n```";
    assert_eq!(extract_json_block(text), Some("[1]"));
}

#[test]
fn extract_raw_json() {
    assert_eq!(extract_json_block("  [1, 2] "), Some("[1, 2]"));
    assert_eq!(extract_json_block("plain"), None);
}
