//! Checker configuration

use anyhow::{bail, Context, Result};
use reserve_lib::{AccountSpec, MatchPolicy, EXPIRY_NOTICE_DAYS};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Checker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerConfig {
    /// Accounts to reconcile, pooled into one report
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,

    /// List reservations expiring within this many days
    #[serde(default = "default_expiry_horizon")]
    pub expiry_horizon_days: u32,

    /// Directory holding `<account>.json` record snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Reservation matching policy
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Mail the report after printing it
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS, usually port 465)
    #[default]
    Wrapper,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    Starttls,
    /// Unencrypted, for local relays only
    None,
}

/// SMTP delivery settings
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: SmtpTls,

    /// From address, e.g. `"Cost Reports <reports@example.com>"`
    pub sender: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    /// SMTP login; usually supplied as `RI_EMAIL__USERNAME`
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password; usually supplied as `RI_EMAIL__PASSWORD`
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_expiry_horizon() -> u32 {
    EXPIRY_NOTICE_DAYS
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

impl CheckerConfig {
    /// Load configuration from a file, overridden by `RI_`-prefixed environment variables
    pub fn load(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("RI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: CheckerConfig = config
            .try_deserialize()
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            bail!("No accounts configured");
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            let name = account.name.trim();
            if name.is_empty() {
                bail!("Account name must not be empty");
            }
            if name.contains(['/', '\\']) {
                bail!("Account name {:?} must not contain path separators", account.name);
            }
            if account.region.trim().is_empty() {
                bail!("Account {} has no region", account.name);
            }
            if !seen.insert(name) {
                bail!("Account {} is configured more than once", account.name);
            }
        }

        if let Some(email) = &self.email {
            email.validate()?;
        }

        Ok(())
    }
}

impl EmailConfig {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("Email host must not be empty");
        }
        if self.recipients.is_empty() {
            bail!("Email has no recipients");
        }
        if self.username.is_some() != self.password.is_some() {
            bail!("Email username and password must be set together");
        }
        Ok(())
    }
}
