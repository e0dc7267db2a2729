use crate::models::ConverterConfig;
use crate::services::FileUsageCounter;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Default configuration directory, relative to the working directory
pub const DEFAULT_CONFIG_DIR: &str = "arcpack Data";

const CONFIG_FILE: &str = "arcpack.yaml";
const COUNTER_FILE: &str = "usage_count";
const ENV_PREFIX: &str = "ARCPACK";

/// Configuration manager for the converter settings file.
///
/// Settings are layered: compiled-in defaults, then `arcpack.yaml` in the
/// config directory (optional), then `ARCPACK_*` environment variables.
/// Nested keys use `__`, e.g. `ARCPACK_BACKGROUND__PROMPT=false`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `arcpack.yaml` and the usage counter
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE),
            config_dir,
            env_prefix: ENV_PREFIX.to_string(),
        })
    }

    /// Read environment overrides under a different prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load the converter configuration.
    ///
    /// # Returns
    /// The layered configuration; defaults if neither file nor environment set anything
    pub fn load_config(&self) -> Result<ConverterConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: ConverterConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!(
            "Loaded config: user_id={}, max_input_bytes={}, prompts(overrides={}, background={})",
            config.user_id,
            config.max_input_bytes,
            config.prompt_for_overrides,
            config.background.prompt
        );
        Ok(config)
    }

    /// Save the converter configuration file.
    ///
    /// # Arguments
    /// * `config` - The configuration to save
    pub fn save_config(&self, config: &ConverterConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// Path of the usage counter file
    pub fn counter_path(&self) -> Utf8PathBuf {
        self.config_dir.join(COUNTER_FILE)
    }

    /// File-backed usage counter in the config directory
    pub fn usage_counter(&self) -> FileUsageCounter {
        FileUsageCounter::new(self.counter_path())
    }
}
