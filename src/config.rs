//! Configuration for the reception agent.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RECEPTION_DB, GEMINI_MODEL, GEMINI_STT_MODEL)
//! 2. Config file (.reception/config.yaml)
//! 3. Defaults
//!
//! The API credential is read from GOOGLE_GEMINI_API_KEY only and never
//! stored in the resolved config.
//!
//! Config file discovery:
//! - Searches current directory and parents for .reception/config.yaml
//! - A relative database path is resolved against the directory holding .reception/

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::gemini::DEFAULT_BASE_URL;
use crate::core::extraction::DEFAULT_TEMPERATURE;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const API_KEY_ENV: &str = "GOOGLE_GEMINI_API_KEY";
pub const DATABASE_ENV: &str = "RECEPTION_DB";
pub const MODEL_ENV: &str = "GEMINI_MODEL";
pub const STT_MODEL_ENV: &str = "GEMINI_STT_MODEL";

pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash";
pub const DEFAULT_DATABASE: &str = "reception_agent.db";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_RECENT_LIMIT: usize = 20;

const CONFIG_DIR: &str = ".reception";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfig {
    /// Extraction model
    pub model: Option<String>,
    /// Transcription model
    pub stt_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite file (relative to the project root)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardConfig {
    pub recent_limit: Option<usize>,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub model: String,
    pub stt_model: String,
    pub base_url: String,
    /// Ceiling for every hosted-model call
    pub timeout: Duration,
    pub temperature: f32,
    pub database: PathBuf,
    /// Default size of the recent-tickets listing
    pub recent_limit: usize,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            stt_model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            temperature: DEFAULT_TEMPERATURE,
            database: PathBuf::from(DEFAULT_DATABASE),
            recent_limit: DEFAULT_RECENT_LIMIT,
            config_file: None,
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file is a valid (all-defaults) config
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge defaults, the config file and environment overrides
fn resolve<F>(file: Option<(PathBuf, ConfigFile)>, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let defaults = ResolvedConfig::default();

    let (config_file, file) = match file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };

    // Project root is the parent of .reception/
    let project_root = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent);

    let database = if let Some(db) = env(DATABASE_ENV) {
        PathBuf::from(db)
    } else {
        let db = file
            .storage
            .database
            .map(PathBuf::from)
            .unwrap_or(defaults.database);
        match project_root {
            Some(root) if db.is_relative() => root.join(db),
            _ => db,
        }
    };

    let temperature = file.gemini.temperature.unwrap_or(defaults.temperature);
    if !(0.0..=2.0).contains(&temperature) {
        anyhow::bail!("gemini.temperature must be between 0 and 2, got {}", temperature);
    }

    let timeout_seconds = file
        .gemini
        .timeout_seconds
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
    if timeout_seconds == 0 {
        anyhow::bail!("gemini.timeout_seconds must be greater than zero");
    }

    Ok(ResolvedConfig {
        model: env(MODEL_ENV)
            .or(file.gemini.model)
            .unwrap_or(defaults.model),
        stt_model: env(STT_MODEL_ENV)
            .or(file.gemini.stt_model)
            .unwrap_or(defaults.stt_model),
        base_url: file.gemini.base_url.unwrap_or(defaults.base_url),
        timeout: Duration::from_secs(timeout_seconds),
        temperature,
        database,
        recent_limit: file
            .dashboard
            .recent_limit
            .unwrap_or(defaults.recent_limit),
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let file = match find_config_file(&cwd) {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve(file, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Read the API credential from the environment
pub fn api_key() -> Result<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .with_context(|| format!("{} is not set", API_KEY_ENV))
}
