//! Tests for the shell capability

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use kestrel_agent::tools::{ExecTool, PathGuard, ToolTrait};

fn fixture() -> (TempDir, ExecTool) {
    let temp_dir = TempDir::new().unwrap();
    let guard = Arc::new(PathGuard::new([temp_dir.path()]));
    let tool = ExecTool::new(guard, temp_dir.path().to_path_buf());
    (temp_dir, tool)
}

#[tokio::test]
async fn test_exec_captures_stdout() {
    let (_temp_dir, tool) = fixture();

    let out = tool
        .execute(json!({"command": "echo $((40 + 2))"}))
        .await
        .unwrap();

    assert!(out.contains("42"));
}

#[tokio::test]
async fn test_exec_reports_exit_code_and_stderr() {
    let (_temp_dir, tool) = fixture();

    let out = tool
        .execute(json!({"command": "echo oops >&2; exit 3"}))
        .await
        .unwrap();

    assert!(out.contains("STDERR:"));
    assert!(out.contains("oops"));
    assert!(out.contains("EXIT CODE: 3"));
}

#[tokio::test]
async fn test_exec_runs_in_default_dir() {
    let (temp_dir, tool) = fixture();

    let out = tool.execute(json!({"command": "pwd"})).await.unwrap();

    assert!(out.contains(temp_dir.path().file_name().unwrap().to_str().unwrap()));
}

#[tokio::test]
async fn test_exec_working_dir_outside_roots_is_denied() {
    let (_temp_dir, tool) = fixture();

    let result = tool
        .execute(json!({"command": "ls", "working_dir": "/etc"}))
        .await;

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("outside allowed roots"));
}

#[tokio::test]
async fn test_exec_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let guard = Arc::new(PathGuard::new([temp_dir.path()]));
    let tool = ExecTool::new(guard, temp_dir.path().to_path_buf()).with_timeout(1);

    let out = tool.execute(json!({"command": "sleep 5"})).await.unwrap();

    assert!(out.contains("Timed out after 1 seconds"));
}

#[tokio::test]
async fn test_exec_no_output() {
    let (_temp_dir, tool) = fixture();

    let out = tool.execute(json!({"command": "true"})).await.unwrap();

    assert_eq!(out, "(no output)");
}
