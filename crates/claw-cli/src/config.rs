//! CLI Configuration
//!
//! Sources, lowest priority first: `config/default`, `config/local`, the
//! file named by `--config`, then `CLAW__SECTION__KEY` environment variables.
//! A `.env` file in the working directory is loaded before any of them.

use anyhow::Context;
use claw_ledger::AccountId;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Custodial account settings
    #[serde(default)]
    pub custody: CustodySettings,

    /// Audit journal settings
    #[serde(default)]
    pub audit: AuditSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodySettings {
    /// Identity that holds all voucher-backing funds
    #[serde(default = "default_custody_account")]
    pub account: String,
}

impl Default for CustodySettings {
    fn default() -> Self {
        Self {
            account: default_custody_account(),
        }
    }
}

impl CustodySettings {
    pub fn account_id(&self) -> AccountId {
        AccountId::from_string(self.account.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Record every event in a hash-chained journal
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_custody_account() -> String {
    AccountId::custody().as_str().to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl LedgerConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CLAW")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config = builder.build().context("failed to read configuration")?;
        config
            .try_deserialize()
            .context("configuration does not match the expected layout")
    }

    /// Reject settings the ledger cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.custody.account.trim().is_empty() {
            anyhow::bail!("custody.account must not be empty");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> anyhow::Result<LedgerConfig> {
        LedgerConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.custody.account_id(), AccountId::custody());
        assert!(config.audit.enabled);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = parse(
            r#"
            [custody]
            account = "vault"

            [audit]
            enabled = false

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.custody.account, "vault");
        assert!(!config.audit.enabled);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LedgerConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.custody.account = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
