use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::outreach::prompts::PromptSet;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PROMPTS_PATH: &str = "prompts.yaml";

/// Application configuration: provider credentials from the environment plus
/// tunables and prompt templates from YAML.
///
/// Built once at startup, wrapped in `Arc`, and never mutated afterwards.
/// Startup fails if either provider API key is missing.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub perplexity_api_key: String,
    pub openai_base_url: String,
    pub perplexity_base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub settings: Settings,
    pub prompts: PromptSet,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"[redacted]")
            .field("perplexity_api_key", &"[redacted]")
            .field("openai_base_url", &self.openai_base_url)
            .field("perplexity_base_url", &self.perplexity_base_url)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        build_config(|key| std::env::var(key))
    }
}

/// Builds the configuration from an env-var lookup function so tests can feed
/// a plain map instead of touching the process environment.
fn build_config<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |key: &str| -> Result<String> {
        lookup(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    };
    let or_default =
        |key: &str, default: &str| -> String { lookup(key).unwrap_or_else(|_| default.to_string()) };

    let openai_api_key = require("OPENAI_API_KEY")?;
    let perplexity_api_key = require("PERPLEXITY_API_KEY")?;

    let port = or_default("PORT", "5000")
        .parse::<u16>()
        .context("PORT must be a valid port number")?;

    let settings: Settings = load_yaml_or_default(
        lookup("OUTREACH_CONFIG_PATH").ok().map(PathBuf::from),
        DEFAULT_CONFIG_PATH,
    )?;
    settings.validate()?;

    let prompts: PromptSet = load_yaml_or_default(
        lookup("OUTREACH_PROMPTS_PATH").ok().map(PathBuf::from),
        DEFAULT_PROMPTS_PATH,
    )?;

    Ok(Config {
        openai_api_key,
        perplexity_api_key,
        openai_base_url: or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
        perplexity_base_url: or_default("PERPLEXITY_BASE_URL", DEFAULT_PERPLEXITY_BASE_URL),
        port,
        rust_log: or_default("RUST_LOG", "info"),
        settings,
        prompts,
    })
}

/// Loads a YAML document. An explicitly configured path must exist; the default
/// path is optional and falls back to built-in defaults.
fn load_yaml_or_default<T>(explicit: Option<PathBuf>, default_path: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match explicit {
        Some(path) => load_yaml(&path),
        None => {
            let path = Path::new(default_path);
            if path.exists() {
                load_yaml(path)
            } else {
                tracing::debug!("{default_path} not found, using built-in defaults");
                Ok(T::default())
            }
        }
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

// ────────────────────────────────────────────────────────────────────────────
// YAML settings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models: ModelSettings,
    pub message_rules: MessageRules,
    pub output: OutputSettings,
    pub api: ApiSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("api.delay_between_companies", self.api.delay_between_companies),
            ("api.delay_between_messages", self.api.delay_between_messages),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                bail!("{name} must be a non-negative number of seconds, got {secs}");
            }
        }
        if self.api.agent_max_steps == 0 {
            bail!("api.agent_max_steps must be at least 1");
        }
        if self.api.llm_max_attempts == 0 {
            bail!("api.llm_max_attempts must be at least 1");
        }
        if self.message_rules.max_words == 0 {
            bail!("message_rules.max_words must be at least 1");
        }
        Ok(())
    }
}

/// One model binding: provider model id plus optional sampling temperature.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ModelConfig {
    fn new(model: &str, temperature: Option<f32>) -> Self {
        Self {
            model: model.to_string(),
            temperature,
        }
    }
}

/// `research` runs on the research provider. `generator` writes variants.
/// `agent` scores employees, judges variants (at temperature 0) and drives the
/// agent strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub research: ModelConfig,
    pub generator: ModelConfig,
    pub agent: ModelConfig,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            research: ModelConfig::new("sonar", None),
            generator: ModelConfig::new("gpt-4o", Some(0.9)),
            agent: ModelConfig::new("gpt-4o-mini", Some(0.3)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessageRules {
    pub max_words: u32,
    pub tone: String,
    pub cta_style: String,
}

impl Default for MessageRules {
    fn default() -> Self {
        Self {
            max_words: 75,
            tone: "conversational, peer-to-peer, no sales jargon".to_string(),
            cta_style: "soft question, low commitment".to_string(),
        }
    }
}

/// Verbosity switches. Each maps onto extra `tracing` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub debug_mode: bool,
    pub verbose: bool,
    pub show_all_variants: bool,
    pub show_prompts: bool,
    pub show_tool_calls: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            verbose: true,
            show_all_variants: false,
            show_prompts: false,
            show_tool_calls: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Scripted,
    Agent,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Scripted => write!(f, "scripted"),
            StrategyKind::Agent => write!(f, "agent"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub max_targets_per_company: usize,
    /// Seconds the worker sleeps after each company batch.
    pub delay_between_companies: f64,
    /// Seconds between two webhook deliveries of the same batch.
    pub delay_between_messages: f64,
    pub webhook_timeout_secs: u64,
    pub strategy: StrategyKind,
    pub agent_max_steps: usize,
    pub llm_max_attempts: u32,
    pub llm_timeout_secs: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            max_targets_per_company: 3,
            delay_between_companies: 5.0,
            delay_between_messages: 0.5,
            webhook_timeout_secs: 30,
            strategy: StrategyKind::Scripted,
            agent_max_steps: 12,
            llm_max_attempts: 1,
            llm_timeout_secs: None,
        }
    }
}

impl ApiSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_companies)
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_messages)
    }
}
