//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homestead.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Server location, used for solar time calculations.
    pub location: LocationConfig,
    /// Automation system settings.
    pub automation: AutomationConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Geographic location of the server.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Automation and script execution settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// System-wide automation toggle.
    pub enabled: bool,
    /// Per-script execution budget in seconds.
    pub script_budget_secs: u64,
}

impl Config {
    /// Load configuration from `homestead.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or the
    /// configured coordinates are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homestead.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMESTEAD_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("HOMESTEAD_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("HOMESTEAD_LATITUDE") {
            if let Ok(latitude) = val.parse() {
                self.location.latitude = latitude;
            }
        }
        if let Ok(val) = std::env::var("HOMESTEAD_LONGITUDE") {
            if let Ok(longitude) = val.parse() {
                self.location.longitude = longitude;
            }
        }
        if let Ok(val) = std::env::var("HOMESTEAD_AUTOMATION_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.automation.enabled = enabled;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(ConfigError::Validation(
                "latitude must be within -90..=90".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(ConfigError::Validation(
                "longitude must be within -180..=180".to_string(),
            ));
        }
        if self.automation.script_budget_secs == 0 {
            return Err(ConfigError::Validation(
                "script budget must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:homestead.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homesteadd=info,homestead=info".to_string(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_budget_secs: 10,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:homestead.db?mode=rwc");
        assert!(config.automation.enabled);
        assert_eq!(config.automation.script_budget_secs, 10);
        assert_eq!(config.location.latitude, 0.0);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.automation.enabled);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [location]
            latitude = 52.52
            longitude = 13.405

            [automation]
            enabled = false
            script_budget_secs = 30
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.location.latitude, 52.52);
        assert!(!config.automation.enabled);
        assert_eq!(config.automation.script_budget_secs, 30);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert!(config.automation.enabled);
    }

    #[test]
    fn should_reject_out_of_range_latitude() {
        let mut config = Config::default();
        config.location.latitude = 95.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_script_budget() {
        let mut config = Config::default();
        config.automation.script_budget_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [location]
            latitude = 48.1
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.location.latitude, 48.1);
        assert_eq!(config.location.longitude, 0.0);
        assert_eq!(config.database.url, "sqlite:homestead.db?mode=rwc");
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
