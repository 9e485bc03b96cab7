use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::agent::dialogue::DialogueRecorder;
use crate::agent::episode::EpisodeConfig;
use crate::agent::harness::PipelineConfig;
use crate::agent::parallel::DEFAULT_MAX_CONCURRENCY;
use crate::agent::prompt::PromptConfig;
use crate::agent::retry::RetryPolicy;

pub const CONFIG_FILE: &str = "agent.toml";
pub const CONFIG_DIR_ENV: &str = "CIV_AGENT_CONFIG_DIR";

/// Locates and parses `agent.toml`.
///
/// Search order:
/// 1) `CIV_AGENT_CONFIG_DIR/agent.toml`
/// 2) `./agent.toml`
/// 3) `<repo_root>/config/agent.toml`
///
/// No file anywhere means built-in defaults; a file that exists but does not parse is an error.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn search_paths(
        file_name: &str,
        config_dir: Option<PathBuf>,
        cwd: Option<PathBuf>,
    ) -> Vec<PathBuf> {
        // This crate lives at <repo_root>/crates/agent-core.
        let repo_config = Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)
            .map(|root| root.join("config"));
        [config_dir, cwd, repo_config]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(file_name))
            .collect()
    }

    /// Parses the first existing candidate, returning it together with its path.
    pub fn load_first<T: DeserializeOwned>(
        candidates: &[PathBuf],
    ) -> anyhow::Result<Option<(T, PathBuf)>> {
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let parsed = Self::parse_from_string(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(Some((parsed, path.clone())))
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).context("parse TOML")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmSection,
    pub retry: RetrySection,
    pub agent: AgentSection,
    pub debug: DebugSection,
    pub environment: EnvironmentSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
            model: "mistral-large-latest".to_string(),
            api_key_env: "MISTRAL_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl LlmSection {
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        self.resolve_api_key_with(|name| env::var(name).ok())
    }

    pub fn resolve_api_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<String> {
        lookup(&self.api_key_env)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "missing LLM credential: set the {} environment variable",
                    self.api_key_env
                )
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    #[default]
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub mode: AgentMode,
    pub max_concurrency: usize,
    pub dialogue_dir: PathBuf,
    pub record_dialogues: bool,
    pub readable_actions: bool,
    pub city_keep_activity: bool,
    pub task_description: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            mode: AgentMode::Serial,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dialogue_dir: PathBuf::from("saved_dialogues"),
            record_dialogues: true,
            readable_actions: true,
            city_keep_activity: false,
            task_description: None,
        }
    }
}

impl AgentSection {
    pub fn recorder(&self) -> DialogueRecorder {
        if self.record_dialogues {
            DialogueRecorder::new(&self.dialogue_dir)
        } else {
            DialogueRecorder::disabled()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    /// Seed the agent from the process id.
    pub randomly_generate_seeds: bool,
    pub agent_seed: Option<u64>,
}

impl DebugSection {
    pub fn agent_seed(&self) -> Option<u64> {
        if self.randomly_generate_seeds {
            Some(u64::from(std::process::id()))
        } else {
            self.agent_seed
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentSection {
    /// JSON-lines control port of the environment bridge.
    pub control_addr: String,
    pub max_steps: Option<u64>,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        Self {
            control_addr: "127.0.0.1:7979".to_string(),
            max_steps: None,
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl AgentConfig {
    /// Reads `agent.toml` (defaults when absent) and applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let candidates = ConfigLoader::search_paths(
            CONFIG_FILE,
            env::var_os(CONFIG_DIR_ENV).map(PathBuf::from),
            env::current_dir().ok(),
        );
        let mut cfg = match ConfigLoader::load_first::<Self>(&candidates)? {
            Some((cfg, path)) => {
                tracing::info!(path = %path.display(), "config.loaded");
                cfg
            }
            None => {
                tracing::info!("config.defaults");
                Self::default()
            }
        };
        cfg.apply_overrides(env_nonempty);
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("CIV_AGENT_CONTROL_ADDR") {
            self.environment.control_addr = addr;
        }
        if let Some(endpoint) = lookup("CIV_AGENT_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(model) = lookup("CIV_AGENT_LLM_MODEL") {
            self.llm.model = model;
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut prompt = PromptConfig::default();
        if let Some(task) = self.agent.task_description.as_deref() {
            prompt.task_description = task.to_string();
        }
        PipelineConfig {
            prompt,
            retry: self.retry.policy(),
            readable_actions: self.agent.readable_actions,
            city_keep_activity: self.agent.city_keep_activity,
        }
    }

    pub fn episode_config(&self) -> EpisodeConfig {
        EpisodeConfig {
            max_steps: self.environment.max_steps,
        }
    }
}
