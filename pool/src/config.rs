//! Pool configuration with TOML file support.

use serde::{Deserialize, Serialize};
use stakepool_types::AccountAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for one pool instance.
///
/// Can be loaded from a TOML file via [`PoolConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// The pool's own account on both asset ledgers.
    #[serde(default = "default_address")]
    pub address: AccountAddress,

    /// Account allowed to appoint the reward distributor.
    #[serde(default = "default_owner")]
    pub owner: AccountAddress,

    /// Length of each emission period in seconds.
    #[serde(default = "default_rewards_duration")]
    pub rewards_duration_secs: u64,

    /// Reject reward notifications the pool's reward balance cannot cover.
    /// Off by default: under-funding then surfaces at claim time.
    #[serde(default)]
    pub require_funded_rewards: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_address() -> AccountAddress {
    AccountAddress::new("stakepool")
}

fn default_owner() -> AccountAddress {
    AccountAddress::new("owner")
}

fn default_rewards_duration() -> u64 {
    7 * 86_400
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PoolConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rewards_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "rewards_duration_secs must be positive".into(),
            ));
        }
        if self.address == self.owner {
            return Err(ConfigError::Invalid(
                "pool address must differ from the owner".into(),
            ));
        }
        if !matches!(self.log_format.as_str(), "human" | "json") {
            return Err(ConfigError::Invalid(format!(
                "unknown log_format {:?}",
                self.log_format
            )));
        }
        Ok(())
    }

    /// A config for tests: the given duration, everything else default.
    pub fn with_duration(rewards_duration_secs: u64) -> Self {
        Self {
            rewards_duration_secs,
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            owner: default_owner(),
            rewards_duration_secs: default_rewards_duration(),
            require_funded_rewards: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PoolConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = PoolConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.rewards_duration_secs, config.rewards_duration_secs);
        assert_eq!(parsed.address, config.address);
        assert!(!parsed.require_funded_rewards);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = PoolConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rewards_duration_secs, 604_800);
        assert_eq!(config.owner.as_str(), "owner");
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            owner = "deployer"
            rewards_duration_secs = 86400
            require_funded_rewards = true
        "#;
        let config = PoolConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.owner.as_str(), "deployer");
        assert_eq!(config.rewards_duration_secs, 86_400);
        assert!(config.require_funded_rewards);
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = PoolConfig::from_toml_str("rewards_duration_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_address_fails_to_parse() {
        let err = PoolConfig::from_toml_str(r#"owner = """#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"pool-1\"\nlog_format = \"json\"").unwrap();
        let config = PoolConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.address.as_str(), "pool-1");
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = PoolConfig::from_toml_file("/nonexistent/stakepool.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
