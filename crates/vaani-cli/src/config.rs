use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use vaani_core::CueSet;
pub use vaani_core::api::mask_secret;
use vaani_core::capabilities::files::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_RESULTS, DEFAULT_ROOTS};
use vaani_core::capabilities::messaging::DEFAULT_LINK_BASE;
use vaani_core::history::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaaniConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── LLM Config ──────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Empty disables the model: heuristic routing and template replies only
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn default_llm_base_url() -> String {
    vaani_core::api::DEFAULT_BASE_URL.to_string()
}

fn default_llm_model() -> String {
    vaani_core::api::DEFAULT_MODEL.to_string()
}

fn default_llm_max_tokens() -> u32 {
    1000
}

fn default_llm_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
        }
    }
}

impl LlmConfig {
    pub fn enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// ── Router Config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_true")]
    pub use_model_fallback: bool,
    #[serde(default)]
    pub cues: CueSet,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            use_model_fallback: true,
            cues: CueSet::default(),
        }
    }
}

// ── Files Config ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_file_roots")]
    pub roots: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_file_roots() -> Vec<String> {
    DEFAULT_ROOTS.iter().map(|r| r.to_string()).collect()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            roots: default_file_roots(),
            max_depth: default_max_depth(),
            max_results: default_max_results(),
        }
    }
}

// ── Contacts / Messaging Config ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    /// Seed the directory with the built-in demo contacts
    #[serde(default = "default_true")]
    pub use_mock_directory: bool,
    /// name -> phone number, merged over the seed
    #[serde(default)]
    pub entries: HashMap<String, String>,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            use_mock_directory: true,
            entries: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "default_link_base")]
    pub link_base: String,
}

fn default_link_base() -> String {
    DEFAULT_LINK_BASE.to_string()
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            link_base: default_link_base(),
        }
    }
}

// ── Conversation Config ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_context_turns() -> usize {
    3
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            context_turns: default_context_turns(),
        }
    }
}

// ── Gateway Config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vaani")
}

impl VaaniConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // Refuse group/other readable configs, they may hold an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `vaani init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        Ok(config)
    }

    /// Expand allow-listed env vars and parse
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;

        if config.llm.api_key.starts_with("gsk_") || config.llm.api_key.starts_with("sk-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{GROQ_API_KEY}}\""
            );
        }

        Ok(config)
    }
}

const ALLOWED_ENV_VARS: &[&str] = &["GROQ_API_KEY", "OPENAI_API_KEY", "HOME", "USER"];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}
