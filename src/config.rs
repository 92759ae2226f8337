// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use chrono_tz::Tz;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_languages() -> Vec<String> {
    ["fi", "sv", "en", "ru", "zh_hans", "ar"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timezone() -> String {
    "Europe/Helsinki".to_string()
}

fn default_api_base_url() -> String {
    "http://localhost:8000/v1/".to_string()
}

fn default_page_size() -> usize {
    20
}
fn default_max_page_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// Directory holding the `<importer>/...xml` exports.
    #[serde(default)]
    pub import_file_path: Option<PathBuf>,

    /// Site languages. Languages not natively supported by an importer are
    /// candidates for script detection.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import_file_path: None,
            languages: default_languages(),
            timezone: default_timezone(),
            api_base_url: default_api_base_url(),
            default_page_size: 20,
            max_page_size: 100,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Result<Self> {
        match Self::load(ctx) {
            Ok(config) => Ok(config),
            Err(e) if Self::is_missing_config_error(&e) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Detects whether an error means the config file was missing, either
    /// through our explicit message or an IO NotFound anywhere in the chain.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    pub fn import_dir(&self, ctx: &dyn AppContext) -> Result<PathBuf> {
        match &self.import_file_path {
            Some(p) => Ok(p.clone()),
            None => ctx.get_import_dir(),
        }
    }

    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Unknown level names fall back to `info`.
    pub fn log_filter(&self) -> LevelFilter {
        self.log_level.trim().parse().unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));

        let config = Config::load_or_default(&ctx).unwrap();
        assert_eq!(config.timezone, "Europe/Helsinki");
        assert_eq!(config.languages.len(), 6);
    }

    #[test]
    fn test_save_and_reload() {
        let ctx = TestContext::new();
        let mut config = Config::default();
        config.default_page_size = 7;
        config.import_file_path = Some(PathBuf::from("/srv/import"));
        config.save(&ctx).unwrap();

        let loaded = Config::load(&ctx).unwrap();
        assert_eq!(loaded.default_page_size, 7);
        assert_eq!(loaded.import_dir(&ctx).unwrap(), PathBuf::from("/srv/import"));
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), LevelFilter::Info);
        config.log_level = "WARN".into();
        assert_eq!(config.log_filter(), LevelFilter::Warn);
        config.log_level = "trace".into();
        assert_eq!(config.log_filter(), LevelFilter::Trace);
        config.log_level = "chatty".into();
        assert_eq!(config.log_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_partial_file_uses_serde_defaults() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        fs::write(&path, "languages = [\"fi\", \"ru\"]\n").unwrap();

        let config = Config::load(&ctx).unwrap();
        assert_eq!(config.languages, vec!["fi", "ru"]);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Helsinki);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config = Config::default();
        assert_eq!(config.page_size(None), 20);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(5000)), 100);
    }
}
