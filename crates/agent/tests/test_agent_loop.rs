//! Tests for the run loop state machine, using a mocked provider

use async_trait::async_trait;
use mockall::mock;
use mockall::Sequence;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use kestrel_agent::tools::{PathGuard, ReadFileTool, ToolDispatcher, ToolTrait};
use kestrel_agent::{AgentError, AgentLoop, ContextMemory, StopReason};
use kestrel_provider::{
    ChatParams, ChatResponse, Provider, ProviderError, ToolCall,
};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

struct EchoTool;

#[async_trait]
impl ToolTrait for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the given text."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }
    async fn execute(
        &self,
        args: Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(args["text"].as_str().unwrap_or_default().to_string())
    }
}

fn echo_call(id: &str) -> ChatResponse {
    ChatResponse::tool_calls(vec![ToolCall {
        id: id.to_string(),
        name: "echo".to_string(),
        arguments: json!({"text": "ping"}),
    }])
}

fn loop_with(provider: MockProvider, max_iterations: u32) -> AgentLoop<MockProvider> {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(EchoTool);
    let context = ContextMemory::new("You are a test assistant.", 4000);
    AgentLoop::new(provider, "test-model", max_iterations, context, dispatcher)
}

#[tokio::test]
async fn test_immediate_finish_ends_done_in_one_iteration() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::text("30")));

    let mut agent = loop_with(mock, 10);
    let outcome = agent.run("10 + 20").await.unwrap();

    assert_eq!(outcome.reason, StopReason::Done);
    assert_eq!(outcome.answer, "30");
    assert_eq!(outcome.iterations, 1);

    // Final answer is recorded in the log
    let log = agent.context().log();
    assert_eq!(log.last().unwrap().role, "assistant");
    assert_eq!(log.last().unwrap().content.as_deref(), Some("30"));
}

#[tokio::test]
async fn test_budget_exhausted_after_exactly_two_thinking_phases() {
    let mut mock = MockProvider::new();
    // A model that always asks for a tool call; the budget caps the loop
    mock.expect_chat()
        .times(2)
        .returning(|_| Ok(echo_call("call_1")));

    let mut agent = loop_with(mock, 2);
    let outcome = agent.run("loop forever").await.unwrap();

    assert_eq!(outcome.reason, StopReason::BudgetExhausted);
    assert_eq!(outcome.iterations, 2);
}

#[tokio::test]
async fn test_provider_fault_is_fatal_and_not_retried() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::Api("boom".to_string())));

    let mut agent = loop_with(mock, 10);
    let result = agent.run("hello").await;

    match result {
        Err(AgentError::Provider(msg)) => assert!(msg.contains("boom")),
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_failure_does_not_terminate_loop() {
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    // Unknown capability first; the loop must carry on to a second call
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(ChatResponse::tool_calls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "no_such_tool".to_string(),
                arguments: json!({}),
            }]))
        });
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("recovered")));

    let mut agent = loop_with(mock, 10);
    let outcome = agent.run("try it").await.unwrap();

    assert_eq!(outcome.reason, StopReason::Done);
    assert_eq!(outcome.answer, "recovered");

    // The failure is visible as transcript text
    let log = agent.context().log();
    let tool_msg = log.iter().find(|m| m.role == "tool").unwrap();
    assert!(tool_msg
        .content
        .as_deref()
        .unwrap()
        .contains("unknown capability"));
}

#[tokio::test]
async fn test_valid_identifier_is_attached_to_tool_message() {
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(echo_call("call_abc123")));
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let mut agent = loop_with(mock, 10);
    agent.run("go").await.unwrap();

    let log = agent.context().log();
    let tool_msg = log.iter().find(|m| m.role == "tool").unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_abc123"));
}

#[tokio::test]
async fn test_malformed_identifier_is_omitted_from_tool_message() {
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(echo_call("list_directory:0")));
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let mut agent = loop_with(mock, 10);
    let outcome = agent.run("go").await.unwrap();

    // The result is recorded and the run completes; only the id is dropped
    assert_eq!(outcome.reason, StopReason::Done);
    let log = agent.context().log();
    let tool_msg = log.iter().find(|m| m.role == "tool").unwrap();
    assert!(tool_msg.tool_call_id.is_none());
    assert_eq!(tool_msg.content.as_deref(), Some("ping"));
}

#[tokio::test]
async fn test_missing_identifier_gets_placeholder() {
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(echo_call("")));
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let mut agent = loop_with(mock, 10);
    agent.run("go").await.unwrap();

    let log = agent.context().log();
    let tool_msg = log.iter().find(|m| m.role == "tool").unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_echo_0"));
}

#[tokio::test]
async fn test_dispatch_results_follow_request_order() {
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(ChatResponse::tool_calls(vec![
                ToolCall {
                    id: "call_a".to_string(),
                    name: "echo".to_string(),
                    arguments: json!({"text": "first"}),
                },
                ToolCall {
                    id: "call_b".to_string(),
                    name: "echo".to_string(),
                    arguments: json!({"text": "second"}),
                },
            ]))
        });
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let mut agent = loop_with(mock, 10);
    agent.run("go").await.unwrap();

    let tool_msgs: Vec<_> = agent
        .context()
        .log()
        .iter()
        .filter(|m| m.role == "tool")
        .collect();
    assert_eq!(tool_msgs.len(), 2);
    assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(tool_msgs[0].content.as_deref(), Some("first"));
    assert_eq!(tool_msgs[1].tool_call_id.as_deref(), Some("call_b"));
    assert_eq!(tool_msgs[1].content.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_cancelled_token_stops_before_any_provider_call() {
    let mut mock = MockProvider::new();
    mock.expect_chat().times(0);

    let mut agent = loop_with(mock, 10);
    agent.cancellation_token().cancel();

    let outcome = agent.run("hello").await.unwrap();
    assert_eq!(outcome.reason, StopReason::Cancelled);
    assert_eq!(outcome.iterations, 0);
}

#[tokio::test]
async fn test_successful_read_file_is_tracked_in_context() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("notes.txt");
    fs::write(&file_path, "remember this").unwrap();
    let path_arg = file_path.to_str().unwrap().to_string();

    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    let call_path = path_arg.clone();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| {
            Ok(ChatResponse::tool_calls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "read_file".to_string(),
                arguments: json!({"path": call_path}),
            }]))
        });
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let guard = Arc::new(PathGuard::new([temp_dir.path()]));
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(ReadFileTool::new(guard));
    let context = ContextMemory::new("sys", 4000);
    let mut agent = AgentLoop::new(mock, "test-model", 10, context, dispatcher);

    agent.run("read my notes").await.unwrap();

    assert_eq!(agent.context().file_count(), 1);
    let tracked = agent.context().file(&path_arg).unwrap();
    assert_eq!(tracked.content.as_deref(), Some("remember this"));
    assert_eq!(tracked.summary, "remember this");

    // The next assembly carries the file block before the log
    let messages = agent.context().assemble();
    assert!(messages[1]
        .content
        .as_deref()
        .unwrap()
        .contains("notes.txt"));
}

#[tokio::test]
async fn test_failed_read_file_is_not_tracked() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.txt");
    let path_arg = missing.to_str().unwrap().to_string();

    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();
    let call_path = path_arg.clone();
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| {
            Ok(ChatResponse::tool_calls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "read_file".to_string(),
                arguments: json!({"path": call_path}),
            }]))
        });
    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(ChatResponse::text("done")));

    let guard = Arc::new(PathGuard::new([temp_dir.path()]));
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(ReadFileTool::new(guard));
    let context = ContextMemory::new("sys", 4000);
    let mut agent = AgentLoop::new(mock, "test-model", 10, context, dispatcher);

    agent.run("read it").await.unwrap();

    assert_eq!(agent.context().file_count(), 0);
}
