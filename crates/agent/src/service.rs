//! Transport-facing thread API.
//!
//! Each call loads the thread from the [`WorkflowStore`], applies one step
//! under a per-thread lock, and writes it back. Calls on one thread are
//! serialized; calls on different threads run concurrently.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use pilot_tool_runtime::{
    Conversation, Decision, DecisionKind, DecisionRequest, Message, Orchestrator,
    OrchestratorError, Phase, ResumeError, WorkflowError, WorkflowEvent, WorkflowState,
};

use crate::store::{ThreadSummary, WorkflowStore};

/// An open decision request as shown to the human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub request_id: String,
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    pub allowed_decisions: BTreeSet<DecisionKind>,
}

impl From<&DecisionRequest> for PendingDecision {
    fn from(request: &DecisionRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            call_id: request.tool_call.id.clone(),
            tool: request.tool_call.name.clone(),
            arguments: request.tool_call.arguments.clone(),
            allowed_decisions: request.allowed_decisions.clone(),
        }
    }
}

/// Everything a client needs to render a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: String,
    pub phase: Phase,
    pub turn: u32,
    pub pending: Vec<PendingDecision>,
    pub messages: Vec<Message>,
}

impl From<&WorkflowState> for ThreadSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            id: state.id().to_string(),
            phase: state.phase(),
            turn: state.turn(),
            pending: state.open_requests().iter().map(PendingDecision::from).collect(),
            messages: state.conversation().messages().to_vec(),
        }
    }
}

/// Result of a call that moved a thread forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub snapshot: ThreadSnapshot,
    pub events: Vec<WorkflowEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Decision(#[from] ResumeError),
    #[error("workflow store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub struct ThreadService {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn WorkflowStore>,
    system_prompt: Option<String>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadService {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            orchestrator,
            store,
            system_prompt: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// System prompt given to every thread created from now on.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Give back a handle from [`Self::thread_lock`]; the entry is dropped
    /// once no other caller holds or waits on it.
    async fn release_lock(&self, thread_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks
            .get(thread_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(thread_id);
        }
    }

    fn load(&self, thread_id: &str) -> Result<WorkflowState, ServiceError> {
        self.store
            .load(thread_id)?
            .ok_or_else(|| ServiceError::ThreadNotFound(thread_id.to_string()))
    }

    /// Advance a running thread and persist what it reached. On error the
    /// state (still `running`, last complete round) is persisted too.
    async fn drive(
        &self,
        state: &mut WorkflowState,
        mut events: Vec<WorkflowEvent>,
    ) -> Result<StepOutcome, ServiceError> {
        let result = self.orchestrator.advance(state).await;
        self.store.save(state)?;
        let report = result.map_err(|e| {
            warn!(thread_id = %state.id(), error = %e, "turn stopped with error");
            e
        })?;
        events.extend(report.events);
        Ok(StepOutcome {
            snapshot: ThreadSnapshot::from(&*state),
            events,
        })
    }

    /// Create an empty thread. It does nothing until its first message.
    pub async fn create_thread(&self) -> Result<ThreadSnapshot, ServiceError> {
        let mut conversation = Conversation::new();
        if let Some(prompt) = &self.system_prompt {
            conversation = conversation.with_system_prompt(prompt.clone());
        }
        let state = WorkflowState::idle(Uuid::new_v4().to_string(), conversation);
        self.store.save(&state)?;
        info!(thread_id = %state.id(), "thread created");
        Ok(ThreadSnapshot::from(&state))
    }

    /// Start a new turn with `text` and drive it until it finishes or
    /// suspends. Fails with [`WorkflowError::TurnInProgress`] unless the
    /// previous turn is done.
    pub async fn send_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<StepOutcome, ServiceError> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.start_turn(thread_id, text).await
        };
        self.release_lock(thread_id, lock).await;
        result
    }

    async fn start_turn(&self, thread_id: &str, text: &str) -> Result<StepOutcome, ServiceError> {
        let mut state = self.load(thread_id)?;
        state.next_turn(text)?;
        self.store.save(&state)?;
        info!(thread_id, turn = state.turn(), "turn started");

        self.drive(&mut state, Vec::new()).await
    }

    /// Re-drive a thread left `running` by a failed model call.
    pub async fn retry(&self, thread_id: &str) -> Result<StepOutcome, ServiceError> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            match self.load(thread_id) {
                Ok(mut state) => self.drive(&mut state, Vec::new()).await,
                Err(e) => Err(e),
            }
        };
        self.release_lock(thread_id, lock).await;
        result
    }

    /// Apply a human decision. Once the last open request is resolved the
    /// thread is driven on. A rejected decision leaves the thread as it was.
    ///
    /// If driving on fails (e.g. the model is unavailable) the decision is
    /// already saved and the thread stays `running` for [`Self::retry`].
    pub async fn submit_decision(
        &self,
        thread_id: &str,
        request_id: &str,
        decision: Decision,
    ) -> Result<StepOutcome, ServiceError> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_decision(thread_id, request_id, decision).await
        };
        self.release_lock(thread_id, lock).await;
        result
    }

    async fn apply_decision(
        &self,
        thread_id: &str,
        request_id: &str,
        decision: Decision,
    ) -> Result<StepOutcome, ServiceError> {
        let mut state = self.load(thread_id)?;
        let outcome = self
            .orchestrator
            .resume(&mut state, request_id, decision)
            .await?;
        self.store.save(&state)?;

        if state.phase() == Phase::Running {
            self.drive(&mut state, outcome.events).await
        } else {
            Ok(StepOutcome {
                snapshot: ThreadSnapshot::from(&state),
                events: outcome.events,
            })
        }
    }

    pub async fn snapshot(&self, thread_id: &str) -> Result<ThreadSnapshot, ServiceError> {
        let state = self.load(thread_id)?;
        Ok(ThreadSnapshot::from(&state))
    }

    pub async fn list_threads(&self) -> Result<Vec<ThreadSummary>, ServiceError> {
        Ok(self.store.list()?)
    }

    /// Drop a thread in any phase. Returns `false` if it did not exist.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool, ServiceError> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.store.delete(thread_id)
        };
        self.release_lock(thread_id, lock).await;

        let deleted = result?;
        if deleted {
            info!(thread_id, "thread deleted");
        }
        Ok(deleted)
    }
}
