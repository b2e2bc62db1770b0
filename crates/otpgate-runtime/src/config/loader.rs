//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Config file (`otpgate.toml` / `config.toml`)
//! 3. Environment variables (`OTPGATE_*`)
//! 4. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Variables use the `OTPGATE_` prefix with `__` as section separator:
//!
//! - `OTPGATE_SESSION_ID=Ice~abc123` → `session_id = "Ice~abc123"`
//! - `OTPGATE_HTTP__PORT=8080` → `http.port = 8080`
//! - `OTPGATE_OTP__TTL_SECS=300` → `otp.ttl_secs = 300`

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::GatewayConfig;
use super::validation::validate_config;

/// Configuration loader with figment-based multi-source support.
///
/// # Example
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("otpgate.toml")
///     .load()?;
/// ```
pub struct ConfigLoader {
    figment: Figment,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: GatewayConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<GatewayConfig> {
        let figment = self.build_figment()?;

        let config: GatewayConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        validate_config(&config)?;

        debug!(
            mode = ?config.mode,
            http_port = config.http.port,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            figment = figment.merge(
                Env::prefixed("OTPGATE_")
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    /// Searches for `otpgate.toml` / `config.toml` in the search paths.
    fn search_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = if self.search_paths.is_empty() {
            std::env::current_dir().into_iter().collect()
        } else {
            self.search_paths.clone()
        };

        for search_path in &search_paths {
            for name in ["otpgate.toml", "config.toml"] {
                let path = search_path.join(name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    figment = figment.merge(Toml::file(&path));
                    return figment;
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use otpgate_framework::Mode;

    #[test]
    fn test_default_config() {
        let config = ConfigLoader::new().without_env().load().unwrap();

        assert_eq!(config.prefix, ".");
        assert_eq!(config.mode, Mode::Private);
        assert_eq!(config.http.port, 7860);
        assert_eq!(config.otp.ttl_secs, 600);
        assert_eq!(config.reconnect_delay_secs, 5);
    }

    #[test]
    fn test_programmatic_merge_overrides_defaults() {
        let config = ConfigLoader::new()
            .without_env()
            .merge(GatewayConfig {
                prefix: "!".to_string(),
                owner_numbers: vec!["263719647303".to_string()],
                ..Default::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.prefix, "!");
        assert_eq!(config.owner_numbers, vec!["263719647303"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.otp.max_attempts, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/otpgate.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
