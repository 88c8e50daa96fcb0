use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::core::constants::*;
use crate::core::rules::EngineRules;
use crate::utils::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub energy_max: u32,
    pub regen_interval_ms: u64,
    pub regen_idle_threshold_ms: u64,
    pub booster_multiplier: u64,
    pub booster_duration_secs: u64,
    pub daily_boosts: u8,
    pub allow_overlapping_boosters: bool,
    pub energy_low_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    pub theme: String,
    pub text_width: usize,
    pub show_rank: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                energy_max: ENERGY_MAX,
                regen_interval_ms: REGEN_INTERVAL_MS,
                regen_idle_threshold_ms: REGEN_IDLE_THRESHOLD_MS,
                booster_multiplier: BOOSTER_MULTIPLIER,
                booster_duration_secs: BOOSTER_DURATION_SECS,
                daily_boosts: DAILY_BOOSTS,
                allow_overlapping_boosters: true,
                energy_low_threshold: ENERGY_LOW_THRESHOLD,
            },
            storage: StorageConfig {
                backend: StorageBackend::File,
                path: PathBuf::from("./data/sandy-store.json"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            ui: UiConfig {
                theme: "default".to_string(),
                text_width: 60,
                show_rank: true,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| EngineError::configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Defaults, then the TOML file if present, then `SANDY__SECTION__KEY`
    /// environment variables.
    pub fn load_layered(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let layered = builder
            .add_source(
                config::Environment::with_prefix("SANDY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(layered.try_deserialize()?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| EngineError::configuration(format!("Failed to create config directory: {}", e)))?;
            }
        }

        let toml_content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_content)
            .map_err(|e| EngineError::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(EngineError::configuration("Invalid logging level")),
        }

        self.rules().validate()?;

        if self.storage.backend == StorageBackend::File && self.storage.path.as_os_str().is_empty() {
            return Err(EngineError::configuration("Storage path cannot be empty"));
        }
        if self.ui.text_width < 30 {
            return Err(EngineError::configuration("Text width must be at least 30"));
        }

        Ok(())
    }

    pub fn merge_with_cli(&mut self, cli_config: CliConfig) {
        if let Some(store_path) = cli_config.store_path {
            self.storage.path = store_path;
            self.storage.backend = StorageBackend::File;
        }
        if cli_config.in_memory {
            self.storage.backend = StorageBackend::Memory;
        }
        if let Some(log_level) = cli_config.log_level {
            self.logging.level = log_level;
        }
        if cli_config.debug {
            self.logging.level = "debug".to_string();
        }
        if let Some(theme) = cli_config.theme {
            self.ui.theme = theme;
        }
    }

    pub fn rules(&self) -> EngineRules {
        EngineRules {
            energy_max: self.engine.energy_max,
            regen_interval_ms: self.engine.regen_interval_ms,
            regen_idle_threshold_ms: self.engine.regen_idle_threshold_ms,
            booster_multiplier: self.engine.booster_multiplier,
            booster_duration_secs: self.engine.booster_duration_secs,
            daily_boosts: self.engine.daily_boosts,
            allow_overlapping_boosters: self.engine.allow_overlapping_boosters,
            energy_low_threshold: self.engine.energy_low_threshold,
        }
    }

    pub fn get_store_path(&self) -> &Path {
        &self.storage.path
    }
}

// Configuration that can be overridden by CLI arguments
#[derive(Debug, Default)]
pub struct CliConfig {
    pub store_path: Option<PathBuf>,
    pub in_memory: bool,
    pub log_level: Option<String>,
    pub debug: bool,
    pub theme: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.engine.energy_max, 5000);
        assert_eq!(config.engine.regen_interval_ms, 500);
        assert_eq!(config.engine.booster_multiplier, 10);
        assert_eq!(config.engine.daily_boosts, 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rules(), EngineRules::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.engine.regen_interval_ms = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.engine.booster_multiplier = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_durations() {
        let mut config = Config::default();
        config.engine.booster_duration_secs = u64::MAX / 2;
        assert!(matches!(config.validate(), Err(EngineError::Configuration { .. })));

        config = Config::default();
        config.engine.regen_interval_ms = MAX_INTERVAL_MS + 1;
        assert!(config.validate().is_err());

        config = Config::default();
        config.engine.regen_idle_threshold_ms = u64::MAX;
        assert!(config.validate().is_err());

        config = Config::default();
        config.engine.booster_duration_secs = MAX_BOOSTER_DURATION_SECS;
        config.engine.regen_interval_ms = MAX_INTERVAL_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layered_load_env_override() {
        let temp_dir = tempdir().unwrap();
        std::env::set_var("SANDY__ENGINE__DAILY_BOOSTS", "5");
        let loaded = Config::load_layered(Some(&temp_dir.path().join("absent.toml")));
        std::env::remove_var("SANDY__ENGINE__DAILY_BOOSTS");

        let config = loaded.unwrap();
        assert_eq!(config.engine.daily_boosts, 5);
        assert_eq!(config.engine.energy_max, 5000);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.engine.booster_duration_secs = 45;
        original_config.storage.backend = StorageBackend::Memory;
        original_config.save_to_file(&config_path).unwrap();

        let loaded_config = Config::from_file(&config_path).unwrap();

        assert_eq!(loaded_config.engine.booster_duration_secs, 45);
        assert_eq!(loaded_config.storage.backend, StorageBackend::Memory);
        assert_eq!(original_config.ui.theme, loaded_config.ui.theme);
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("conf").join("sandy.toml");

        let config = Config::from_file(&config_path).unwrap();
        assert!(config_path.exists());
        assert_eq!(config.engine.energy_max, 5000);
    }

    #[test]
    fn test_layered_load_reads_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("sandy.toml");

        let mut on_disk = Config::default();
        on_disk.engine.energy_max = 1000;
        on_disk.ui.theme = "ocean".to_string();
        on_disk.save_to_file(&config_path).unwrap();

        let config = Config::load_layered(Some(&config_path)).unwrap();
        assert_eq!(config.engine.energy_max, 1000);
        assert_eq!(config.ui.theme, "ocean");
    }

    #[test]
    fn test_layered_load_without_file() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load_layered(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.engine.booster_duration_secs, 30);
    }

    #[test]
    fn test_cli_config_merge() {
        let mut config = Config::default();
        let cli_config = CliConfig {
            log_level: Some("debug".to_string()),
            theme: Some("ocean".to_string()),
            in_memory: true,
            ..Default::default()
        };

        config.merge_with_cli(cli_config);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.ui.theme, "ocean");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }
}
