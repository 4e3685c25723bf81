use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use crate::models::RuleWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Where the learned model comes from
///
/// `local_path` wins when set. Otherwise the artifact is looked up in
/// `cache_dir` and, failing that, downloaded from
/// `{endpoint}/{repo_id}/resolve/{revision}/{filename}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub local_path: Option<String>,
    pub repo_id: Option<String>,
    #[serde(default = "default_model_filename")]
    pub filename: String,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default = "default_registry_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    pub auth_token: Option<String>,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            local_path: None,
            repo_id: None,
            filename: default_model_filename(),
            revision: default_revision(),
            endpoint: default_registry_endpoint(),
            cache_dir: default_cache_dir(),
            auth_token: None,
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl ModelSettings {
    /// Identifier reported by the health endpoint
    pub fn model_id(&self) -> Option<String> {
        self.repo_id.clone().or_else(|| self.local_path.clone())
    }
}

fn default_true() -> bool { true }
fn default_model_filename() -> String { "blood_match_model.json".to_string() }
fn default_revision() -> String { "main".to_string() }
fn default_registry_endpoint() -> String { "https://huggingface.co".to_string() }
fn default_cache_dir() -> String { ".model-cache".to_string() }
fn default_download_timeout() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_max_donors")]
    pub max_donors: usize,
    pub default_limit: Option<usize>,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            max_donors: default_max_donors(),
            default_limit: None,
        }
    }
}

fn default_max_donors() -> usize { 10_000 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_base_weight")]
    pub base: f64,
    #[serde(default = "default_exact_match_weight")]
    pub exact_match: f64,
    #[serde(default = "default_antigen_match_weight")]
    pub antigen_match: f64,
    #[serde(default = "default_experience_weight")]
    pub experience: f64,
    #[serde(default = "default_emergency_weight")]
    pub emergency: f64,
    #[serde(default = "default_experience_threshold")]
    pub experience_threshold: u32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            exact_match: default_exact_match_weight(),
            antigen_match: default_antigen_match_weight(),
            experience: default_experience_weight(),
            emergency: default_emergency_weight(),
            experience_threshold: default_experience_threshold(),
        }
    }
}

impl From<&WeightsConfig> for RuleWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            base: config.base,
            exact_match: config.exact_match,
            antigen_match: config.antigen_match,
            experience: config.experience,
            emergency: config.emergency,
            experience_threshold: config.experience_threshold,
        }
    }
}

fn default_base_weight() -> f64 { 50.0 }
fn default_exact_match_weight() -> f64 { 20.0 }
fn default_antigen_match_weight() -> f64 { 3.0 }
fn default_experience_weight() -> f64 { 5.0 }
fn default_emergency_weight() -> f64 { 10.0 }
fn default_experience_threshold() -> u32 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with BLOOD_MATCH__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., BLOOD_MATCH__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("BLOOD_MATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("BLOOD_MATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Pull well-known variables into the config
///
/// `HF_TOKEN` authenticates registry downloads and `MODEL_PATH` points at a
/// local artifact, matching the variables the model tooling already uses.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(token) = env::var("HF_TOKEN") {
        builder = builder.set_override("model.auth_token", token)?;
    }
    if let Ok(path) = env::var("MODEL_PATH") {
        builder = builder.set_override("model.local_path", path)?;
    }

    builder.build()
}
