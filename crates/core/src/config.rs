use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load `.env` into the process environment if one exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// `{PROFILE}_{KEY}` wins over plain `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32_opt(profile: &str, key: &str) -> Option<u32> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Profile name; empty for the default profile.
    pub profile: String,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Config for the profile named by `PILOT_PROFILE` (e.g. `PROD`): every
    /// key is looked up as `{PROFILE}_{KEY}`, then `{KEY}`. Call
    /// `load_dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        let profile = env_or("PILOT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Config for one named profile; "" selects the unprefixed keys.
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            llm: LlmConfig::from_env_profiled(p),
            agent: AgentConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Log the active settings without secrets.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  llm:      provider={}, model={}, base_url={}",
            self.llm.provider,
            self.llm.model,
            self.llm.base_url.as_deref().unwrap_or("(default)")
        );
        tracing::info!(
            "  agent:    policy_file={}, max_rounds={}, tool_concurrency={}",
            self.agent
                .policy_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(reference)".to_string()),
            self.agent.max_rounds,
            self.agent.tool_concurrency
        );
        tracing::info!("  storage:  data_dir={}", self.storage.data_dir.display());
    }

    /// JSON view of the settings with secrets reduced to presence flags.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "llm": {
                "provider": self.llm.provider,
                "model": self.llm.model,
                "base_url": self.llm.base_url,
                "temperature": self.llm.temperature,
                "configured": self.llm.is_configured(),
            },
            "agent": {
                "policy_file": self.agent.policy_file,
                "system_prompt_file": self.agent.system_prompt_file,
                "max_rounds": self.agent.max_rounds,
                "tool_concurrency": self.agent.tool_concurrency,
            },
            "storage": { "data_dir": self.storage.data_dir },
        })
    }
}

// ── LLM (OpenAI-compatible) ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Only "openai" (any OpenAI-compatible endpoint) is built in.
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "openai"),
            model: profiled_env_or(p, "LLM_MODEL_NAME", "gpt-4o"),
            api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0")
                .parse()
                .unwrap_or(0.0),
            max_tokens: profiled_env_u32_opt(p, "LLM_MAX_TOKENS"),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.api_key.is_some(),
            _ => false,
        }
    }
}

// ── Agent loop ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// YAML interrupt policy; the built-in reference policy is used when unset.
    pub policy_file: Option<PathBuf>,
    pub system_prompt_file: Option<PathBuf>,
    pub max_rounds: usize,
    pub tool_concurrency: usize,
}

impl AgentConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            policy_file: profiled_env_opt(p, "PILOT_POLICY_FILE").map(PathBuf::from),
            system_prompt_file: profiled_env_opt(p, "PILOT_SYSTEM_PROMPT_FILE").map(PathBuf::from),
            max_rounds: profiled_env_usize(p, "PILOT_MAX_ROUNDS", 25).max(1),
            tool_concurrency: profiled_env_usize(p, "PILOT_TOOL_CONCURRENCY", 4).max(1),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
        }
    }
}
