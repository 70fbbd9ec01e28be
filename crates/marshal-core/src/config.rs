// ABOUTME: Configuration loading and management for marshal
// ABOUTME: TOML config with sensible defaults plus an interactive setup flow

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Controller backend selected at startup: "manual", "ollama", "gemini"
    pub default_provider: String,
    /// Ollama model name
    pub ollama_model: String,
    /// Ollama server base URL
    pub ollama_url: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Gemini API key
    pub gemini_api_key: String,
    /// Human-in-the-loop approval before tool execution
    pub human_in_loop: bool,
    /// Maximum tool iterations per user turn
    pub turn_limit: usize,
    /// Additional worker processes to launch at startup
    pub workers: Vec<WorkerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: "manual".to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_api_key: String::new(),
            human_in_loop: true,
            turn_limit: 5,
            workers: Vec::new(),
        }
    }
}

impl Config {
    /// XDG config directory for marshal (~/.config/marshal).
    pub fn config_dir() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("marshal")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from the XDG config directory, defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(Self::config_path(), content).context("Failed to write config")?;
        Ok(())
    }

    /// Flip the enabled flag for a named worker and persist. Returns false
    /// when no worker by that name is configured.
    pub fn toggle_worker(&mut self, name: &str) -> Result<bool> {
        let Some(worker) = self.workers.iter_mut().find(|w| w.name == name) else {
            return Ok(false);
        };
        worker.enabled = !worker.enabled;
        self.save()?;
        Ok(true)
    }

    /// Interactive preferences flow: provider, model/key, approval gate.
    pub fn interactive_setup() -> Result<Config> {
        use dialoguer::{Confirm, Input, Password};

        let mut config = Self::load()?;

        crate::term::print_header("marshal configuration", crate::term::CYAN);

        config.default_provider = Input::new()
            .with_prompt("Default provider (manual/ollama/gemini)")
            .default(config.default_provider.clone())
            .interact_text()?;

        match config.default_provider.as_str() {
            "ollama" => {
                config.ollama_model = Input::new()
                    .with_prompt("Ollama model")
                    .default(config.ollama_model.clone())
                    .interact_text()?;
            }
            "gemini" => {
                let key: String = Password::new()
                    .with_prompt("Gemini API key (empty keeps current)")
                    .allow_empty_password(true)
                    .interact()?;
                if !key.is_empty() {
                    config.gemini_api_key = key;
                }
            }
            _ => {}
        }

        config.human_in_loop = Confirm::new()
            .with_prompt("Require approval before tool execution")
            .default(config.human_in_loop)
            .interact()?;

        config.save()?;
        println!(
            "{}✓ Configuration saved to {}{}",
            crate::term::GREEN,
            Self::config_path().display(),
            crate::term::RESET
        );
        Ok(config)
    }
}
