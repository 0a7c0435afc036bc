use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::instructions::InstructionTable;

pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_TYPING_DELAY_MS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client settings, stored as JSON under the user's config directory.
///
/// Environment variables win over the file: `BANTER_RELAY_URL`, `BANTER_MODEL`,
/// `BANTER_INSTRUCTION`, and `BANTER_INSTRUCTION_<MODEL>` for per-model text.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub relay_url: Option<String>,
    pub default_model: Option<String>,
    pub models: Option<Vec<String>>,
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub instructions: BTreeMap<String, String>,
    pub typing_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// File config with environment overrides applied.
    pub fn load_with_env() -> Self {
        let mut config = Self::load().unwrap_or_else(|e| {
            log::warn!("[config] ignoring unreadable config file: {e}");
            Self::new()
        });
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("BANTER_RELAY_URL") {
            self.relay_url = Some(url);
        }
        if let Some(model) = var("BANTER_MODEL") {
            self.default_model = Some(model);
        }
        if let Some(instruction) = var("BANTER_INSTRUCTION") {
            self.system_instruction = Some(instruction);
        }
        for model in self.models() {
            if let Some(text) = var(&instruction_env_key(&model)) {
                self.instructions.insert(model, text);
            }
        }
    }

    pub fn relay_url(&self) -> &str {
        self.relay_url.as_deref().unwrap_or(DEFAULT_RELAY_URL)
    }

    pub fn default_model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn models(&self) -> Vec<String> {
        self.models.clone().unwrap_or_else(|| {
            ["llama3", "codellama", "gemma", "mistral"]
                .iter()
                .map(|m| m.to_string())
                .collect()
        })
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction.as_deref().unwrap_or("")
    }

    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms.unwrap_or(DEFAULT_TYPING_DELAY_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Built-in instructions overlaid with the configured ones. `system_instruction`
    /// only replaces the fallback for models the table doesn't know.
    pub fn instruction_table(&self) -> InstructionTable {
        let mut table = InstructionTable::default();
        table.extend(self.instructions.clone());
        if !self.system_instruction().trim().is_empty() {
            table.set_fallback(self.system_instruction());
        }
        table
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("banter").join("config.json"))
    }
}

/// `codellama:7b` -> `BANTER_INSTRUCTION_CODELLAMA_7B`
fn instruction_env_key(model: &str) -> String {
    let suffix: String = model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("BANTER_INSTRUCTION_{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.relay_url(), DEFAULT_RELAY_URL);
        assert_eq!(config.default_model(), "llama3");
        assert_eq!(config.typing_delay(), Duration::from_millis(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.models().len(), 4);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("banter").join("config.json");

        let mut config = Config::new();
        config.default_model = Some("mistral".into());
        config.instructions.insert("mistral".into(), "Answer in French.".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.instruction_table().lookup("mistral").starts_with("Answer in French."));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BANTER_RELAY_URL", "http://relay.local:9000"),
            ("BANTER_MODEL", "gemma"),
            ("BANTER_INSTRUCTION_CODELLAMA", "Only reply in Rust."),
        ]);

        let mut config = Config::new();
        config.relay_url = Some("http://old:1".into());
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.relay_url(), "http://relay.local:9000");
        assert_eq!(config.default_model(), "gemma");
        assert_eq!(config.system_instruction(), "");
        assert!(config
            .instruction_table()
            .lookup("codellama")
            .starts_with("Only reply in Rust."));
    }

    #[test]
    fn test_system_instruction_is_fallback_only() {
        let mut config = Config::new();
        config.apply_env(|key| (key == "BANTER_INSTRUCTION").then(|| "Be terse.".to_string()));

        let table = config.instruction_table();
        assert!(table.lookup("phi3").starts_with("Be terse."));
        assert!(table.lookup("codellama").starts_with("You are an expert programmer."));
    }

    #[test]
    fn test_instruction_env_key() {
        assert_eq!(instruction_env_key("codellama:7b"), "BANTER_INSTRUCTION_CODELLAMA_7B");
    }
}
