//! Application configuration and strategy factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use candor_core::profile::ScoringProfile;
use candor_core::scoring::{RuleBasedStrategy, RULE_BASED};
use candor_core::traits::ScoringStrategy;

use crate::anthropic::{self, AnthropicStrategy};
use crate::ollama::{self, OllamaStrategy};
use crate::openai::{self, OpenAiStrategy};

/// Configuration for a single model provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                model,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                model,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { model, base_url } => f
                .debug_struct("Ollama")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
        }
    }
}

fn default_openai_model() -> String {
    openai::DEFAULT_MODEL.to_string()
}
fn default_anthropic_model() -> String {
    anthropic::DEFAULT_MODEL.to_string()
}
fn default_ollama_model() -> String {
    ollama::DEFAULT_MODEL.to_string()
}
fn default_ollama_url() -> String {
    ollama::DEFAULT_BASE_URL.to_string()
}

/// Top-level candor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandorConfig {
    /// Scoring strategy: `rule-based` or the name of a configured provider.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Time budget for one strategy call before falling back to rules.
    #[serde(default = "default_strategy_timeout")]
    pub strategy_timeout_ms: u64,
    /// Scoring profile file; the built-in profile is used when unset.
    #[serde(default)]
    pub profile: Option<PathBuf>,
    /// Output directory for session files and reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_strategy() -> String {
    RULE_BASED.to_string()
}
fn default_strategy_timeout() -> u64 {
    10_000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./candor-results")
}

impl Default for CandorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            providers: HashMap::new(),
            strategy_timeout_ms: default_strategy_timeout(),
            profile: None,
            output_dir: default_output_dir(),
        }
    }
}

impl CandorConfig {
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }

    /// Load the configured scoring profile, or the built-in one.
    pub fn load_profile(&self) -> Result<ScoringProfile> {
        match &self.profile {
            Some(path) => candor_core::profile::load_profile(path),
            None => Ok(ScoringProfile::default()),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            model,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            model: model.clone(),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::Anthropic {
            api_key,
            model,
            base_url,
        } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            model: model.clone(),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::Ollama { model, base_url } => ProviderConfig::Ollama {
            model: model.clone(),
            base_url: resolve_env_vars(base_url),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `candor.toml` in the current directory
/// 2. `~/.config/candor/config.toml`
///
/// Environment variable overrides: `CANDOR_OPENAI_KEY`, `CANDOR_ANTHROPIC_KEY`.
pub fn load_config() -> Result<CandorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CandorConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("candor.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let mut config = toml::from_str::<CandorConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            // A relative profile path is relative to the config file.
            if let (Some(profile), Some(dir)) = (&config.profile, path.parent()) {
                if profile.is_relative() && !dir.as_os_str().is_empty() {
                    config.profile = Some(dir.join(profile));
                }
            }
            config
        }
        None => CandorConfig::default(),
    };

    apply_env_overrides(&mut config);

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn apply_env_overrides(config: &mut CandorConfig) {
    if let Ok(key) = std::env::var("CANDOR_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                model: default_anthropic_model(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("CANDOR_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                model: default_openai_model(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("candor"))
}

/// Create a provider-backed strategy from its configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ScoringStrategy>> {
    Ok(match config {
        ProviderConfig::Anthropic {
            api_key,
            model,
            base_url,
        } => Arc::new(AnthropicStrategy::new(api_key, model, base_url.clone())?),
        ProviderConfig::OpenAI {
            api_key,
            model,
            base_url,
            org_id,
        } => Arc::new(OpenAiStrategy::new(
            api_key,
            model,
            base_url.clone(),
            org_id.clone(),
        )?),
        ProviderConfig::Ollama { model, base_url } => {
            Arc::new(OllamaStrategy::new(base_url, model)?)
        }
    })
}

/// Resolve a strategy name: `rule-based`, or a key of `config.providers`.
pub fn create_strategy(
    name: &str,
    config: &CandorConfig,
    profile: Arc<ScoringProfile>,
) -> Result<Arc<dyn ScoringStrategy>> {
    if name == RULE_BASED {
        return Ok(Arc::new(RuleBasedStrategy::new(profile)));
    }
    let provider = config.providers.get(name).with_context(|| {
        let mut known: Vec<&str> = config.providers.keys().map(String::as_str).collect();
        known.sort_unstable();
        known.insert(0, RULE_BASED);
        format!(
            "unknown scoring strategy '{name}' (available: {})",
            known.join(", ")
        )
    })?;
    create_provider(provider)
}
