use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/sources.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// `"gemini"` or `"disabled"`. When disabled, the engine runs the local
    /// keyword strategy only.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Trailing conversation turns included in each request.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            history_turns: default_history_turns(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.95
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_history_turns() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    /// `"gemini"` or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_tts_model(),
            api_key_env: default_api_key_env(),
            voice: default_voice(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TtsConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_voice() -> String {
    "Kore".to_string()
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
    "127.0.0.1:8740".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    /// Static passphrase gating the admin surface. Compared in plaintext;
    /// acceptable for the intended internal-demo deployment.
    #[serde(default = "default_passphrase")]
    pub passphrase: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            passphrase: default_passphrase(),
        }
    }
}

fn default_passphrase() -> String {
    "murshid2025".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config file if present, otherwise fall back to defaults.
/// Commands that only touch the local store work without a config file.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    match config.model.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    match config.tts.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown tts provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.model.temperature) {
        anyhow::bail!("model.temperature must be in [0.0, 2.0]");
    }
    if !(0.0..=1.0).contains(&config.model.top_p) {
        anyhow::bail!("model.top_p must be in [0.0, 1.0]");
    }
    if config.model.history_turns == 0 || config.model.history_turns > 20 {
        anyhow::bail!("model.history_turns must be in [1, 20]");
    }
    if config.model.max_output_tokens == 0 {
        anyhow::bail!("model.max_output_tokens must be > 0");
    }
    if config.admin.passphrase.is_empty() {
        anyhow::bail!("admin.passphrase must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn empty_file_yields_defaults() {
        let f = write_config("");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.model.provider, "disabled");
        assert!(!cfg.model.is_enabled());
        assert_eq!(cfg.model.history_turns, 5);
        assert_eq!(cfg.server.bind, "127.0.0.1:8740");
    }

    #[test]
    fn unknown_provider_rejected() {
        let f = write_config("[model]\nprovider = \"openai\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let f = write_config("[model]\ntemperature = 3.5\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn zero_history_turns_rejected() {
        let f = write_config("[model]\nhistory_turns = 0\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn gemini_provider_accepted() {
        let f = write_config("[model]\nprovider = \"gemini\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert!(cfg.model.is_enabled());
        assert_eq!(cfg.model.model, "gemini-2.5-flash");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_or_default(Path::new("/nonexistent/murshid.toml")).unwrap();
        assert_eq!(cfg.tts.voice, "Kore");
    }
}
