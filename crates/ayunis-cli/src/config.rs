use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ayunis_models::{
    InferenceSettings, Model, ModelConfig, ModelProvider, ModelRegistry, ModelWithConfig,
    ProviderSettings, RetryPolicy, DEFAULT_REQUEST_TIMEOUT,
};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CONF_DIR_NAME: &str = ".ayunis";
const DEFAULT_CONFIG_FILE_NAME: &str = "ayunis.toml";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse ayunis.toml failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AyunisConfig {
    pub log: LogConfig,
    pub inference: InferenceSettings,
    pub models: ModelRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// `None` disables the log file.
    pub file_path: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file_path: Some(default_conf_dir().join("logs").join("ayunis.log")),
            stderr: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AyunisTomlFile {
    #[serde(default)]
    log: AyunisTomlLog,
    #[serde(default)]
    retry: AyunisTomlRetry,
    #[serde(default)]
    providers: HashMap<String, AyunisTomlProvider>,
    #[serde(default)]
    models: Vec<AyunisTomlModel>,
    #[serde(default)]
    env: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
struct AyunisTomlLog {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    stderr: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AyunisTomlRetry {
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    base_delay_ms: Option<u64>,
    #[serde(default)]
    max_delay_ms: Option<u64>,
    #[serde(default)]
    jitter: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AyunisTomlProvider {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AyunisTomlModel {
    name: String,
    provider: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    can_stream: Option<bool>,
    #[serde(default)]
    is_reasoning: Option<bool>,
}

pub fn default_config_path() -> PathBuf {
    default_conf_dir().join(DEFAULT_CONFIG_FILE_NAME)
}

/// Loads `path`, or the default config file when none is given. A missing
/// default file yields the built-in defaults; a missing explicit file is an
/// error.
pub fn load_config(path: Option<&Path>) -> Result<AyunisConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (expand_path_with_home(path), true),
        None => (default_config_path(), false),
    };
    if !required && !path.exists() {
        return parse_config("");
    }
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AyunisConfig, ConfigError> {
    let parsed: AyunisTomlFile = toml::from_str(content)?;
    let retry = resolve_retry(&parsed.retry)?;
    let mut inference = InferenceSettings {
        retry,
        ..InferenceSettings::default()
    };
    for (name, provider) in &parsed.providers {
        let kind = name
            .parse::<ModelProvider>()
            .map_err(|_| ConfigError::Invalid(format!("unknown provider section '{name}'")))?;
        let Some(settings) = resolve_provider(kind, provider, &parsed.env)? else {
            continue;
        };
        match kind {
            ModelProvider::Mistral => inference.mistral = Some(settings),
            ModelProvider::OpenAi => inference.openai = Some(settings),
            ModelProvider::Anthropic => inference.anthropic = Some(settings),
        }
    }

    Ok(AyunisConfig {
        log: resolve_log(&parsed.log, &parsed.env),
        inference,
        models: resolve_models(&parsed.models)?,
    })
}

fn resolve_retry(retry: &AyunisTomlRetry) -> Result<RetryPolicy, ConfigError> {
    let defaults = RetryPolicy::default();
    let policy = RetryPolicy {
        max_retries: retry.max_retries.unwrap_or(defaults.max_retries),
        base_delay: retry
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
        max_delay: retry
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
        jitter: retry.jitter.unwrap_or(defaults.jitter),
    };
    if policy.base_delay > policy.max_delay {
        return Err(ConfigError::Invalid(format!(
            "retry base_delay_ms ({}) must not exceed max_delay_ms ({})",
            policy.base_delay.as_millis(),
            policy.max_delay.as_millis()
        )));
    }
    Ok(policy)
}

/// Returns `None` for disabled vendors and vendors whose API key does not
/// resolve. A missing `api_key` falls back to `$<PROVIDER>_API_KEY`.
fn resolve_provider(
    kind: ModelProvider,
    provider: &AyunisTomlProvider,
    env_map: &HashMap<String, String>,
) -> Result<Option<ProviderSettings>, ConfigError> {
    if provider.enabled == Some(false) {
        return Ok(None);
    }
    let fallback_key = format!("${}_API_KEY", kind.as_str().to_ascii_uppercase());
    let raw_key = provider.api_key.as_deref().unwrap_or(fallback_key.as_str());
    let Some(api_key) = resolve_config_value(raw_key, env_map) else {
        return Ok(None);
    };

    let timeout = match provider.timeout_ms {
        Some(0) => {
            return Err(ConfigError::Invalid(format!(
                "provider '{kind}' timeout_ms must be greater than 0"
            )))
        }
        Some(timeout_ms) => Duration::from_millis(timeout_ms),
        None => DEFAULT_REQUEST_TIMEOUT,
    };
    let mut settings = ProviderSettings::new(api_key).with_timeout(timeout);
    if let Some(base_url) = provider
        .base_url
        .as_deref()
        .and_then(|value| resolve_config_value(value, env_map))
    {
        settings = settings.with_base_url(base_url);
    }
    match provider.max_tokens {
        Some(0) => {
            return Err(ConfigError::Invalid(format!(
                "provider '{kind}' max_tokens must be greater than 0"
            )))
        }
        Some(max_tokens) => settings = settings.with_max_tokens(max_tokens),
        None => {}
    }
    Ok(Some(settings))
}

/// An empty `[[models]]` list serves the built-in catalog.
fn resolve_models(models: &[AyunisTomlModel]) -> Result<ModelRegistry, ConfigError> {
    if models.is_empty() {
        return Ok(ModelRegistry::builtin());
    }
    let mut resolved = Vec::with_capacity(models.len());
    for entry in models {
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid(
                "model entries require a non-empty name".to_string(),
            ));
        }
        let provider = entry.provider.parse::<ModelProvider>().map_err(|_| {
            ConfigError::Invalid(format!(
                "model '{name}' has unsupported provider '{}'",
                entry.provider.trim()
            ))
        })?;
        let display_name = entry
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(name)
            .to_string();
        resolved.push(ModelWithConfig {
            model: Model::new(name, provider),
            config: ModelConfig {
                display_name,
                can_stream: entry.can_stream.unwrap_or(provider != ModelProvider::Mistral),
                is_reasoning: entry.is_reasoning.unwrap_or(false),
            },
        });
    }
    Ok(ModelRegistry::new(resolved))
}

fn resolve_log(log: &AyunisTomlLog, env_map: &HashMap<String, String>) -> LogConfig {
    let defaults = LogConfig::default();
    let level = log
        .level
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_string();
    let file_path = if log.enabled == Some(false) {
        None
    } else {
        log.path
            .as_deref()
            .and_then(|value| resolve_config_value(value, env_map))
            .map(|value| expand_path_with_home(Path::new(&value)))
            .or(defaults.file_path)
    };
    LogConfig {
        level,
        file_path,
        stderr: log.stderr.unwrap_or(defaults.stderr),
    }
}

fn resolve_config_value(value: &str, env_map: &HashMap<String, String>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(env_key) = trimmed.strip_prefix('$') {
        return env_map
            .get(env_key)
            .cloned()
            .or_else(|| std::env::var(env_key).ok())
            .filter(|resolved| !resolved.trim().is_empty());
    }
    Some(trimmed.to_string())
}

fn default_conf_dir() -> PathBuf {
    home_dir().join(DEFAULT_CONF_DIR_NAME)
}

fn expand_path_with_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" {
        return home_dir();
    }
    if let Some(suffix) = raw.strip_prefix("~/") {
        return home_dir().join(suffix);
    }
    path.to_path_buf()
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
