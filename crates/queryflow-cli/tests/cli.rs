use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;
use tempfile::tempdir;

fn queryflow() -> Command {
    Command::new(env!("CARGO_BIN_EXE_queryflow"))
}

#[test]
fn json_report_for_file_input() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("orders.sql");
    std::fs::write(
        &sql_path,
        "SELECT customer_id, COUNT(order_id) AS order_count FROM orders GROUP BY customer_id",
    )
    .expect("write sql");

    let output = queryflow()
        .args(["-f", "json", "--compact", sql_path.to_str().expect("sql path")])
        .output()
        .expect("run CLI");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["summary"]["statementCount"], 1);
    let statement = &value["statements"][0];
    assert_eq!(statement["statementType"], "SELECT");
    let flows = statement["columnFlows"].as_array().expect("flows");
    let count = flows
        .iter()
        .find(|f| f["outputColumn"] == "order_count")
        .expect("order_count flow");
    assert_eq!(count["lineagePath"][0]["transformation"], "source");
    assert_eq!(count["lineagePath"][0]["columnName"], "order_id");
}

#[test]
fn table_report_from_stdin_written_to_file() {
    let dir = tempdir().expect("temp dir");
    let output_path = dir.path().join("report.txt");

    let mut child = queryflow()
        .args(["-o", output_path.to_str().expect("output path")])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn CLI");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"SELECT a.id, b.name FROM a JOIN b ON a.id = b.a_id")
        .expect("write stdin");
    let status = child.wait().expect("wait CLI");

    assert!(status.success());
    let report = std::fs::read_to_string(&output_path).expect("report exists");
    assert!(report.contains("QueryFlow Analysis"));
    assert!(report.contains("Stages: a → b → JOIN → Select"));
    assert!(report.contains("b.name"));
}

#[test]
fn parse_errors_exit_with_failure() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("broken.sql");
    std::fs::write(&sql_path, "SELEC id FROM users").expect("write sql");

    let output = queryflow()
        .args(["-f", "json", sql_path.to_str().expect("sql path")])
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(1));
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["statements"][0]["nodes"][0]["label"], "Parse Error");
}

#[test]
fn statement_limit_rejects_input() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("many.sql");
    std::fs::write(&sql_path, "SELECT 1; SELECT 2; SELECT 3;").expect("write sql");

    let output = queryflow()
        .args([
            "-f",
            "json",
            "--max-statements",
            "2",
            sql_path.to_str().expect("sql path"),
        ])
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(1));
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["rejection"]["reason"], "query_count_limit");
    assert_eq!(value["rejection"]["actual"], 3);
}

#[test]
fn missing_file_is_a_config_error() {
    let output = queryflow()
        .arg("/nonexistent/queryflow/input.sql")
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(66));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read file"));
}

#[test]
fn prints_result_schema() {
    let output = queryflow()
        .arg("--print-schema")
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(schema["properties"]["statements"].is_object());
}

#[test]
fn json_ast_input() {
    let dir = tempdir().expect("temp dir");
    let ast_path = dir.path().join("query.json");
    std::fs::write(
        &ast_path,
        r#"{"type":"select","columns":[{"expr":{"type":"column_ref","table":null,"column":"email"},"as":null}],"from":[{"db":null,"table":"users","as":null}]}"#,
    )
    .expect("write ast");

    let output = queryflow()
        .args(["--ast", "-f", "json", ast_path.to_str().expect("ast path")])
        .output()
        .expect("run CLI");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let flow = &value["statements"][0]["columnFlows"][0];
    assert_eq!(flow["outputColumn"], "email");
    assert_eq!(flow["lineagePath"][0]["nodeName"], "users");
}

#[test]
fn malformed_json_ast_is_a_config_error() {
    let dir = tempdir().expect("temp dir");
    let ast_path = dir.path().join("broken.json");
    std::fs::write(&ast_path, "{ not json").expect("write ast");

    let output = queryflow()
        .args(["--ast", ast_path.to_str().expect("ast path")])
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(66));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse JSON AST"));
}

#[test]
fn dash_reads_stdin_between_files() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("first.sql");
    std::fs::write(&sql_path, "SELECT id FROM users").expect("write sql");

    let mut child = queryflow()
        .args(["-f", "json", "--compact", sql_path.to_str().expect("sql path"), "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn CLI");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"SELECT name FROM customers")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait CLI");

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let items = value.as_array().expect("one entry per input");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["source"], "<stdin>");
}

#[test]
fn stdin_given_twice_is_a_config_error() {
    let output = queryflow()
        .args(["-", "-"])
        .stdin(Stdio::null())
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(66));
    assert!(String::from_utf8_lossy(&output.stderr).contains("only once"));
}
