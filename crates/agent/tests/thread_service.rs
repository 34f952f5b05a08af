use std::sync::Arc;
use std::time::Duration;

use pilot_agent::{
    build_service_with, FileWorkflowStore, MemoryWorkflowStore, ServiceError, ThreadService,
    WorkflowStore,
};
use pilot_core::config::{AgentConfig, Config, LlmConfig, StorageConfig};
use pilot_tool_runtime::model::mock::MockModelClient;
use pilot_tool_runtime::{
    Decision, DecisionKind, ModelClient, ModelError, Phase, ResumeError, Role, ToolCall,
    WorkflowError, WorkflowEvent,
};
use serde_json::json;

fn config(data_dir: &std::path::Path) -> Config {
    Config {
        profile: String::new(),
        llm: LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
        },
        agent: AgentConfig {
            policy_file: None,
            system_prompt_file: None,
            max_rounds: 25,
            tool_concurrency: 4,
        },
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
        },
    }
}

fn service(model: &Arc<MockModelClient>, store: Arc<dyn WorkflowStore>) -> ThreadService {
    pilot_core::telemetry::init_test_tracing();
    let cfg = config(std::path::Path::new("unused"));
    build_service_with(&cfg, model.clone() as Arc<dyn ModelClient>, store).unwrap()
}

fn browser_state_call(id: &str) -> ToolCall {
    ToolCall::new(id, "get_browser_state", json!({"description": "current url"}))
}

fn js_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        "execute_javascript",
        json!({"description": "click", "js_code": "async function main(context) { return 1; }"}),
    )
}

#[tokio::test]
async fn created_thread_is_idle_with_system_prompt() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));

    let snapshot = svc.create_thread().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Done);
    assert_eq!(snapshot.turn, 0);
    assert!(snapshot.messages.is_empty());

    model.queue_text("Hi there.");
    svc.send_message(&snapshot.id, "hello").await.unwrap();
    let request = &model.requests()[0];
    assert_eq!(
        request.system_prompt.as_deref(),
        Some(pilot_agent::config::DEFAULT_SYSTEM_PROMPT)
    );
    assert_eq!(request.tools.len(), 2);
}

#[tokio::test]
async fn decision_flow_end_to_end() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));
    let thread = svc.create_thread().await.unwrap();

    model.queue_tool_calls(vec![browser_state_call("b1"), js_call("j1")]);
    let outcome = svc.send_message(&thread.id, "what's on the page?").await.unwrap();

    assert_eq!(outcome.snapshot.phase, Phase::Suspended);
    assert_eq!(outcome.snapshot.pending.len(), 2);
    let b1 = &outcome.snapshot.pending[0];
    assert_eq!(b1.tool, "get_browser_state");
    assert_eq!(
        b1.allowed_decisions.iter().copied().collect::<Vec<_>>(),
        vec![DecisionKind::Respond, DecisionKind::Reject]
    );
    let j1 = outcome.snapshot.pending[1].clone();

    // Not allowed for execute_javascript; the request stays open.
    let err = svc
        .submit_decision(&thread.id, &j1.request_id, Decision::reject(None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Decision(ResumeError::InvalidDecisionKind { .. })
    ));
    assert_eq!(svc.snapshot(&thread.id).await.unwrap().pending.len(), 2);

    let partial = svc
        .submit_decision(&thread.id, &b1.request_id, Decision::reject(Some("not needed")))
        .await
        .unwrap();
    assert_eq!(partial.snapshot.phase, Phase::Suspended);
    assert_eq!(model.call_count(), 1);

    model.queue_text("Clicked it.");
    let done = svc
        .submit_decision(&thread.id, &j1.request_id, Decision::respond("1"))
        .await
        .unwrap();
    assert_eq!(done.snapshot.phase, Phase::Done);
    assert!(done
        .events
        .iter()
        .any(|e| matches!(e, WorkflowEvent::TurnCompleted { content } if content == "Clicked it.")));
    assert_eq!(done.snapshot.messages.last().unwrap().content, "Clicked it.");

    let second_call = &model.requests()[1];
    let tool_results = second_call
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .count();
    assert_eq!(tool_results, 2);

    let err = svc
        .submit_decision(&thread.id, &j1.request_id, Decision::respond("again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Decision(ResumeError::UnknownRequest(_))));
}

#[tokio::test]
async fn message_while_suspended_is_refused() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));
    let thread = svc.create_thread().await.unwrap();

    model.queue_tool_calls(vec![browser_state_call("b1")]);
    svc.send_message(&thread.id, "look").await.unwrap();

    let err = svc.send_message(&thread.id, "hurry up").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Workflow(WorkflowError::TurnInProgress { phase: Phase::Suspended, .. })
    ));
}

#[tokio::test]
async fn model_failure_is_persisted_as_running_and_retryable() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));
    let thread = svc.create_thread().await.unwrap();

    model.queue_error(ModelError::Unavailable("timeout".to_string()));
    let err = svc.send_message(&thread.id, "hi").await.unwrap_err();
    assert!(matches!(err, ServiceError::Orchestrator(_)));

    let snapshot = svc.snapshot(&thread.id).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Running);
    assert_eq!(snapshot.messages.len(), 1);

    model.queue_text("hello!");
    let outcome = svc.retry(&thread.id).await.unwrap();
    assert_eq!(outcome.snapshot.phase, Phase::Done);
}

#[tokio::test]
async fn unknown_thread_is_reported() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));

    let err = svc.send_message("missing", "hi").await.unwrap_err();
    assert!(matches!(err, ServiceError::ThreadNotFound(id) if id == "missing"));
    assert!(!svc.delete_thread("missing").await.unwrap());
}

#[tokio::test]
async fn suspended_thread_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(MockModelClient::new());

    let (thread_id, request_id) = {
        let store = Arc::new(FileWorkflowStore::new(dir.path()).unwrap());
        let svc = service(&model, store);
        let thread = svc.create_thread().await.unwrap();
        model.queue_tool_calls(vec![browser_state_call("b1")]);
        let outcome = svc.send_message(&thread.id, "where am I?").await.unwrap();
        (thread.id, outcome.snapshot.pending[0].request_id.clone())
    };

    let store = Arc::new(FileWorkflowStore::new(dir.path()).unwrap());
    let svc = service(&model, store);
    let threads = svc.list_threads().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].phase, Phase::Suspended);
    assert_eq!(threads[0].open_requests, 1);

    model.queue_text("You are on example.com.");
    let outcome = svc
        .submit_decision(&thread_id, &request_id, Decision::respond("https://example.com"))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.phase, Phase::Done);

    assert!(svc.delete_thread(&thread_id).await.unwrap());
    assert!(svc.list_threads().await.unwrap().is_empty());
}

#[tokio::test]
async fn threads_run_independently() {
    let model = Arc::new(MockModelClient::new());
    let svc = Arc::new(service(&model, Arc::new(MemoryWorkflowStore::new())));
    let a = svc.create_thread().await.unwrap();
    let b = svc.create_thread().await.unwrap();

    model.queue_tool_calls(vec![browser_state_call("b1")]);
    svc.send_message(&a.id, "thread a").await.unwrap();
    model.queue_text("b done");
    svc.send_message(&b.id, "thread b").await.unwrap();

    assert_eq!(svc.snapshot(&a.id).await.unwrap().phase, Phase::Suspended);
    assert_eq!(svc.snapshot(&b.id).await.unwrap().phase, Phase::Done);
}

#[tokio::test]
async fn spawned_threads_advance_concurrently() {
    let model = Arc::new(MockModelClient::new());
    let svc = Arc::new(service(&model, Arc::new(MemoryWorkflowStore::new())));

    let mut handles = Vec::new();
    for i in 0..4 {
        let thread = svc.create_thread().await.unwrap();
        model.queue_text("answered");
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.send_message(&thread.id, &format!("question {i}")).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.snapshot.phase, Phase::Done);
        assert_eq!(outcome.snapshot.messages.len(), 2);
    }
    assert_eq!(svc.list_threads().await.unwrap().len(), 4);
}

#[tokio::test]
async fn concurrent_decisions_on_one_thread_are_serialized() {
    let model = Arc::new(MockModelClient::new().with_delay(Duration::from_millis(20)));
    let svc = Arc::new(service(&model, Arc::new(MemoryWorkflowStore::new())));
    let thread = svc.create_thread().await.unwrap();

    model.queue_tool_calls(vec![browser_state_call("b1"), js_call("j1")]);
    let outcome = svc.send_message(&thread.id, "inspect the page").await.unwrap();
    let request_ids: Vec<String> = outcome
        .snapshot
        .pending
        .iter()
        .map(|p| p.request_id.clone())
        .collect();
    assert_eq!(request_ids.len(), 2);

    model.queue_text("All answered.");
    let handles: Vec<_> = request_ids
        .into_iter()
        .map(|request_id| {
            let svc = svc.clone();
            let thread_id = thread.id.clone();
            tokio::spawn(async move {
                svc.submit_decision(&thread_id, &request_id, Decision::respond("ok"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = svc.snapshot(&thread.id).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Done);
    assert!(snapshot.pending.is_empty());
    assert_eq!(
        snapshot.messages.iter().filter(|m| m.role == Role::Tool).count(),
        2
    );
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn concurrent_messages_on_one_thread_run_one_turn_at_a_time() {
    let model = Arc::new(MockModelClient::new().with_delay(Duration::from_millis(20)));
    let svc = Arc::new(service(&model, Arc::new(MemoryWorkflowStore::new())));
    let thread = svc.create_thread().await.unwrap();
    model.queue_text("first answer").queue_text("second answer");

    let handles: Vec<_> = ["one", "two"]
        .into_iter()
        .map(|text| {
            let svc = svc.clone();
            let thread_id = thread.id.clone();
            tokio::spawn(async move { svc.send_message(&thread_id, text).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let snapshot = svc.snapshot(&thread.id).await.unwrap();
    assert_eq!(snapshot.turn, 2);
    assert_eq!(snapshot.phase, Phase::Done);
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(model.requests()[1].messages.len(), 3);
}

#[tokio::test]
async fn model_failure_after_decision_keeps_the_decision() {
    let model = Arc::new(MockModelClient::new());
    let svc = service(&model, Arc::new(MemoryWorkflowStore::new()));
    let thread = svc.create_thread().await.unwrap();

    model.queue_tool_calls(vec![browser_state_call("b1")]);
    let outcome = svc.send_message(&thread.id, "where am I?").await.unwrap();
    let request_id = outcome.snapshot.pending[0].request_id.clone();

    model.queue_error(ModelError::Unavailable("connection reset".to_string()));
    let err = svc
        .submit_decision(&thread.id, &request_id, Decision::respond("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Orchestrator(_)));

    let snapshot = svc.snapshot(&thread.id).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Running);
    assert!(snapshot.pending.is_empty());
    let tool_message = snapshot.messages.last().unwrap();
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("b1"));
    assert_eq!(tool_message.content, "https://example.com");

    let err = svc
        .submit_decision(&thread.id, &request_id, Decision::respond("again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Decision(ResumeError::UnknownRequest(_))));

    model.queue_text("You are on example.com.");
    let outcome = svc.retry(&thread.id).await.unwrap();
    assert_eq!(outcome.snapshot.phase, Phase::Done);
    assert_eq!(model.call_count(), 3);
}

#[test]
fn build_service_requires_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let err = pilot_agent::build_service(&config(dir.path())).err().unwrap();
    assert!(format!("{err:#}").contains("OPENAI_API_KEY"));
}
