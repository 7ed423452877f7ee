//! Tests for filesystem capabilities against a temp workspace

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use kestrel_agent::tools::{
    EditFileTool, ListDirTool, PathGuard, ReadFileTool, ToolTrait, WriteFileTool,
};

fn fixture() -> (TempDir, Arc<PathGuard>) {
    let temp_dir = TempDir::new().unwrap();
    let guard = Arc::new(PathGuard::new([temp_dir.path()]));
    (temp_dir, guard)
}

#[tokio::test]
async fn test_read_file() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("a.txt");
    fs::write(&path, "content here").unwrap();

    let tool = ReadFileTool::new(guard);
    let out = tool
        .execute(json!({"path": path.to_str().unwrap()}))
        .await
        .unwrap();

    assert_eq!(out, "content here");
}

#[tokio::test]
async fn test_read_missing_file_is_an_error() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("absent.txt");

    let tool = ReadFileTool::new(guard);
    let result = tool.execute(json!({"path": path.to_str().unwrap()})).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("no file at"));
}

#[tokio::test]
async fn test_read_outside_roots_is_denied() {
    let (_temp_dir, guard) = fixture();

    let tool = ReadFileTool::new(guard);
    let result = tool.execute(json!({"path": "/etc/passwd"})).await;

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("outside allowed roots"));
}

#[tokio::test]
async fn test_write_creates_parent_directories() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("deep/nested/b.txt");

    let tool = WriteFileTool::new(guard);
    let out = tool
        .execute(json!({"path": path.to_str().unwrap(), "content": "hello"}))
        .await
        .unwrap();

    assert!(out.contains("Wrote 5 bytes"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
}

#[tokio::test]
async fn test_write_outside_roots_is_denied() {
    let other_dir = TempDir::new().unwrap();
    let (_temp_dir, guard) = fixture();
    let target = other_dir.path().join("escape.txt");

    let tool = WriteFileTool::new(guard);
    let result = tool
        .execute(json!({"path": target.to_str().unwrap(), "content": "nope"}))
        .await;

    assert!(result.is_err());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_traversal_escape_is_denied() {
    let (temp_dir, guard) = fixture();
    let sneaky = format!("{}/../escape.txt", temp_dir.path().to_str().unwrap());

    let tool = WriteFileTool::new(guard);
    let result = tool.execute(json!({"path": sneaky, "content": "x"})).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_edit_file_single_match() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("c.txt");
    fs::write(&path, "one two three").unwrap();

    let tool = EditFileTool::new(guard);
    let out = tool
        .execute(json!({
            "path": path.to_str().unwrap(),
            "old_text": "two",
            "new_text": "2"
        }))
        .await
        .unwrap();

    assert!(out.contains("Edited"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "one 2 three");
}

#[tokio::test]
async fn test_edit_file_ambiguous_match_refused() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("d.txt");
    fs::write(&path, "dup dup").unwrap();

    let tool = EditFileTool::new(guard);
    let out = tool
        .execute(json!({
            "path": path.to_str().unwrap(),
            "old_text": "dup",
            "new_text": "x"
        }))
        .await
        .unwrap();

    assert!(out.contains("ambiguous"));
    // File untouched
    assert_eq!(fs::read_to_string(&path).unwrap(), "dup dup");
}

#[tokio::test]
async fn test_edit_file_old_text_not_found() {
    let (temp_dir, guard) = fixture();
    let path = temp_dir.path().join("e.txt");
    fs::write(&path, "abc").unwrap();

    let tool = EditFileTool::new(guard);
    let out = tool
        .execute(json!({
            "path": path.to_str().unwrap(),
            "old_text": "zzz",
            "new_text": "x"
        }))
        .await
        .unwrap();

    assert!(out.contains("not found"));
}

#[tokio::test]
async fn test_list_dir() {
    let (temp_dir, guard) = fixture();
    fs::write(temp_dir.path().join("file.txt"), "x").unwrap();
    fs::create_dir(temp_dir.path().join("sub")).unwrap();

    let tool = ListDirTool::new(guard);
    let out = tool
        .execute(json!({"path": temp_dir.path().to_str().unwrap()}))
        .await
        .unwrap();

    assert!(out.contains("[file] file.txt"));
    assert!(out.contains("[dir] sub"));
}

#[tokio::test]
async fn test_list_empty_dir() {
    let (temp_dir, guard) = fixture();

    let tool = ListDirTool::new(guard);
    let out = tool
        .execute(json!({"path": temp_dir.path().to_str().unwrap()}))
        .await
        .unwrap();

    assert!(out.contains("Empty directory"));
}

#[tokio::test]
async fn test_missing_required_argument_fails_deserialization() {
    let (_temp_dir, guard) = fixture();

    let tool = ReadFileTool::new(guard);
    let result = tool.execute(json!({})).await;

    assert!(result.is_err());
}
