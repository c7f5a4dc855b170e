use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::SceneloopError;
use crate::host::HostConfig;
use crate::llm::{GeminiConfig, OpenAiConfig};
use crate::pipeline::PipelineConfig;
use crate::runner::LoopControllerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: HostConfig,
    pub models: ModelsConfig,
    #[serde(rename = "loop")]
    pub runner: LoopControllerConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Name used when `--model` is not given
    pub default_model: String,
    pub qwen: OpenAiConfig,
    pub gemini: GeminiConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default_model: "qwen3-vl-30b".to_string(),
            qwen: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            models: ModelsConfig::default(),
            runner: LoopControllerConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("BLENDER_HOST") {
            self.host.host = host;
        }
        parse_into(get("BLENDER_PORT"), "BLENDER_PORT", &mut self.host.port);

        let qwen = &mut self.models.qwen;
        if let Some(endpoint) = get("QWEN3_VL_ENDPOINT").or_else(|| get("VISION_MODEL_ENDPOINT")) {
            qwen.endpoint = endpoint;
        }
        if let Some(model) = get("QWEN3_VL_MODEL") {
            qwen.model = Some(model);
        }
        if let Some(size) = get("QWEN3_VL_SIZE") {
            qwen.default_size = size.to_uppercase();
        }
        parse_into(get("QWEN3_VL_TIMEOUT"), "QWEN3_VL_TIMEOUT", &mut qwen.timeout_secs);
        parse_into(get("QWEN3_VL_TEMPERATURE"), "QWEN3_VL_TEMPERATURE", &mut qwen.temperature);
        parse_into(get("QWEN3_VL_MAX_TOKENS"), "QWEN3_VL_MAX_TOKENS", &mut qwen.max_tokens);

        let gemini = &mut self.models.gemini;
        if let Some(key) = get("GOOGLE_AI_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            gemini.api_key = Some(key);
        }
        if let Some(endpoint) = get("GEMINI_ENDPOINT") {
            gemini.endpoint = endpoint;
        }
        parse_into(get("GEMINI_TIMEOUT"), "GEMINI_TIMEOUT", &mut gemini.timeout_secs);
        parse_into(get("GEMINI_TEMPERATURE"), "GEMINI_TEMPERATURE", &mut gemini.temperature);
        parse_into(get("GEMINI_MAX_TOKENS"), "GEMINI_MAX_TOKENS", &mut gemini.max_tokens);
    }

    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Reject settings no run can succeed with
    pub fn validate(&self) -> std::result::Result<(), SceneloopError> {
        let invalid = |msg: &str| Err(SceneloopError::Config(msg.to_string()));

        if self.runner.window_size == 0 {
            return invalid("loop.window_size must be > 0");
        }
        if self.runner.max_iterations == 0 {
            return invalid("loop.max_iterations must be > 0");
        }
        if self.pipeline.max_iterations == 0 {
            return invalid("pipeline.max_iterations must be > 0");
        }
        if !(0.0..=1.0).contains(&self.pipeline.satisfaction_threshold) {
            return invalid("pipeline.satisfaction_threshold must be within 0..=1");
        }
        if self.host.port == 0 {
            return invalid("host.port must be > 0");
        }
        Ok(())
    }
}

fn parse_into<T: FromStr>(value: Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = value {
        match raw.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => log::warn!("Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| env.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host.port, 9876);
        assert_eq!(config.models.default_model, "qwen3-vl-30b");
        assert_eq!(config.runner.max_iterations, 5);
        assert_eq!(config.runner.window_size, 3);
        assert_eq!(config.pipeline.max_iterations, 3);
        assert_eq!(config.pipeline.satisfaction_threshold, 0.75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sceneloop.yml");
        fs::write(
            &path,
            "host:\n  port: 9999\nloop:\n  max_iterations: 7\nmodels:\n  qwen:\n    default_size: 8B\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.host.port, 9999);
        assert_eq!(config.host.host, "localhost");
        assert_eq!(config.runner.max_iterations, 7);
        assert_eq!(config.runner.window_size, 3);
        assert_eq!(config.models.qwen.default_size, "8B");
    }

    #[test]
    fn test_load_explicit_path_missing_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config.apply_env(lookup(&[
            ("BLENDER_HOST", "blender.local"),
            ("BLENDER_PORT", "9000"),
            ("VISION_MODEL_ENDPOINT", "http://gpu:8000"),
            ("QWEN3_VL_SIZE", "8b"),
            ("QWEN3_VL_TEMPERATURE", "0.1"),
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MAX_TOKENS", "4096"),
        ]));

        assert_eq!(config.host.host, "blender.local");
        assert_eq!(config.host.port, 9000);
        assert_eq!(config.models.qwen.endpoint, "http://gpu:8000");
        assert_eq!(config.models.qwen.default_size, "8B");
        assert_eq!(config.models.qwen.temperature, 0.1);
        assert_eq!(config.models.gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(config.models.gemini.max_tokens, 4096);
    }

    #[test]
    fn test_apply_env_precedence_and_bad_values() {
        let mut config = Config::default();
        config.apply_env(lookup(&[
            ("QWEN3_VL_ENDPOINT", "http://primary:8000/v1"),
            ("VISION_MODEL_ENDPOINT", "http://secondary:8000/v1"),
            ("GOOGLE_AI_API_KEY", "google"),
            ("GEMINI_API_KEY", "gemini"),
            ("BLENDER_PORT", "not-a-port"),
            ("QWEN3_VL_MODEL", ""),
        ]));

        assert_eq!(config.models.qwen.endpoint, "http://primary:8000/v1");
        assert_eq!(config.models.gemini.api_key.as_deref(), Some("google"));
        assert_eq!(config.host.port, 9876);
        assert_eq!(config.models.qwen.model, None);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = Config::default();
        config.runner.window_size = 0;
        assert!(matches!(config.validate(), Err(SceneloopError::Config(_))));

        let mut config = Config::default();
        config.runner.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.satisfaction_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
