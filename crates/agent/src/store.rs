use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

use pilot_tool_runtime::{Phase, WorkflowState};

/// Lightweight thread summary (no messages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub phase: Phase,
    pub turn: u32,
    pub open_requests: usize,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowState> for ThreadSummary {
    fn from(state: &WorkflowState) -> Self {
        Self {
            id: state.id().to_string(),
            phase: state.phase(),
            turn: state.turn(),
            open_requests: state.open_requests().len(),
            message_count: state.conversation().len(),
            created_at: state.created_at(),
            updated_at: state.updated_at(),
        }
    }
}

/// Persistence for suspended (and finished) threads.
pub trait WorkflowStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<WorkflowState>>;
    /// Insert or replace.
    fn save(&self, state: &WorkflowState) -> Result<()>;
    /// Returns `false` if there was nothing to delete.
    fn delete(&self, id: &str) -> Result<bool>;
    /// All threads sorted by `updated_at` descending.
    fn list(&self) -> Result<Vec<ThreadSummary>>;
}

fn sort_recent_first(summaries: &mut [ThreadSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Process-local store; states are lost on restart.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    states: RwLock<HashMap<String, WorkflowState>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn load(&self, id: &str) -> Result<Option<WorkflowState>> {
        let states = self
            .states
            .read()
            .map_err(|_| anyhow::anyhow!("workflow store lock poisoned"))?;
        Ok(states.get(id).cloned())
    }

    fn save(&self, state: &WorkflowState) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| anyhow::anyhow!("workflow store lock poisoned"))?;
        states.insert(state.id().to_string(), state.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut states = self
            .states
            .write()
            .map_err(|_| anyhow::anyhow!("workflow store lock poisoned"))?;
        Ok(states.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<ThreadSummary>> {
        let states = self
            .states
            .read()
            .map_err(|_| anyhow::anyhow!("workflow store lock poisoned"))?;
        let mut summaries: Vec<ThreadSummary> = states.values().map(ThreadSummary::from).collect();
        sort_recent_first(&mut summaries);
        Ok(summaries)
    }
}

/// File-based store: one JSON file per thread under `<data_dir>/workflows`.
pub struct FileWorkflowStore {
    dir: PathBuf,
}

impl FileWorkflowStore {
    /// Create a new store, ensuring the storage directory exists.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("workflows");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create workflow dir: {}", dir.display()))?;
        info!(path = %dir.display(), "workflow store initialized");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("invalid thread id: {:?}", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl WorkflowStore for FileWorkflowStore {
    fn load(&self, id: &str) -> Result<Option<WorkflowState>> {
        let path = self.state_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read workflow: {}", id))?;
        let state = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse workflow: {}", id))?;
        Ok(Some(state))
    }

    fn save(&self, state: &WorkflowState) -> Result<()> {
        let path = self.state_path(state.id())?;
        let data = serde_json::to_string_pretty(state)?;
        // Atomic replace.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)
            .with_context(|| format!("failed to write workflow: {}", state.id()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to commit workflow: {}", state.id()))?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let path = self.state_path(id)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).with_context(|| format!("failed to delete workflow: {}", id))?;
        info!(id = %id, "workflow deleted");
        Ok(true)
    }

    fn list(&self) -> Result<Vec<ThreadSummary>> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match std::fs::read_to_string(&path) {
                    Ok(data) => match serde_json::from_str::<WorkflowState>(&data) {
                        Ok(state) => summaries.push(ThreadSummary::from(&state)),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping corrupt workflow");
                        }
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read workflow");
                    }
                }
            }
        }
        sort_recent_first(&mut summaries);
        Ok(summaries)
    }
}
