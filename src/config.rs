use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("app_state.json")
    }

    pub fn reports_path(&self) -> PathBuf {
        self.data_dir.join("reports.json")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Substitute a fixed deterministic result for the model call.
    #[serde(default)]
    pub mock: bool,
    /// Credential override; the `OPENAI_API_KEY` environment variable is
    /// the usual way to supply it.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            mock: false,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl VisionConfig {
    pub fn mock_enabled(&self) -> bool {
        self.mock || std::env::var("MOCK_VISION").map(|v| v == "1").unwrap_or(false)
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist. Recognized environment overrides: `PORT` (listen
/// port), `MOCK_VISION=1` and `OPENAI_API_KEY` (read at call time).
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("PORT must be an integer, got '{}'", port))?;
        let host = match config.server.bind.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => config.server.bind.clone(),
        };
        config.server.bind = format!("{}:{}", host, port);
    }

    if config.vision.model.is_empty() {
        anyhow::bail!("vision.model must not be empty");
    }
    if config.vision.timeout_secs == 0 {
        anyhow::bail!("vision.timeout_secs must be > 0");
    }

    Ok(config)
}
