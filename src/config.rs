// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;
use std::time::Duration;

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::SmtpSettings;
use crate::imap::Credentials;
use crate::pool::PoolConfig;
use crate::sync::SyncAccount;

fn default_imap_port() -> u16 {
    993
}

fn default_months_to_sync() -> u32 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Actix worker count; the number of cores when unset.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl ImapConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub idle_timeout_secs: u64,
    pub sweep_interval_ms: u64,
}

impl PoolSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Newest messages considered per folder and pass.
    pub max_per_folder: u32,
    /// How long a sync waits for the store while another account commits.
    pub store_wait_secs: u64,
}

/// One mailbox the sync binary replicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_months_to_sync")]
    pub months_to_sync: u32,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

impl AccountConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.host, self.port, &self.username, &self.password)
    }

    pub fn sync_account(&self) -> SyncAccount {
        SyncAccount {
            name: self.name.clone(),
            credentials: self.credentials(),
            months_to_sync: self.months_to_sync,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log: LogConfig,
    pub server: ServerConfig,
    pub imap: ImapConfig,
    pub pool: PoolSettings,
    pub sync: SyncSettings,
    pub database_url: String,
    /// Remote `mailbridge-server` the sync binary talks to instead of IMAP.
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            .set_default("log.level", "info")?
            // Server defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            // IMAP timeouts
            .set_default("imap.connect_timeout_secs", 5)?
            .set_default("imap.read_timeout_secs", 7)?
            // Pool timings
            .set_default("pool.idle_timeout_secs", 30)?
            .set_default("pool.sweep_interval_ms", 1000)?
            // Sync
            .set_default("sync.max_per_folder", 50)?
            .set_default("sync.store_wait_secs", 600)?
            .set_default("database_url", "sqlite:data/mailbridge.db")?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `MAILBRIDGE_SERVER__PORT=9000` overrides `server.port`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILBRIDGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .ignore_empty(true),
        );

        // Conventional unprefixed variables
        let env_vars = [
            ("DATABASE_URL", "database_url"),
            ("GATEWAY_URL", "gateway_url"),
            ("PORT", "server.port"),
        ];
        for (env_var, config_path) in &env_vars {
            if let Ok(value) = env::var(env_var) {
                if *env_var == "PORT" {
                    if let Ok(port) = value.parse::<u16>() {
                        config_builder = config_builder.set_override(config_path, port)?;
                    } else {
                        warn!("Invalid port value in {}: {}", env_var, value);
                    }
                } else {
                    config_builder = config_builder.set_override(config_path, value)?;
                }
            }
        }

        let settings: Settings = config_builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.sync.max_per_folder == 0 {
            return Err(SettingsError::Invalid("sync.max_per_folder must be at least 1".to_string()));
        }
        if self.pool.sweep_interval_ms == 0 {
            return Err(SettingsError::Invalid("pool.sweep_interval_ms must be at least 1".to_string()));
        }
        for (i, account) in self.accounts.iter().enumerate() {
            if self.accounts[..i].iter().any(|a| a.name == account.name) {
                return Err(SettingsError::Invalid(format!("duplicate account name '{}'", account.name)));
            }
        }
        Ok(())
    }

    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.pool.pool_config(), PoolConfig::default());
        assert_eq!(settings.imap.connect_timeout(), Duration::from_secs(5));
        assert_eq!(settings.imap.read_timeout(), Duration::from_secs(7));
        assert_eq!(settings.sync.max_per_folder, 50);
        assert!(settings.accounts.is_empty());
    }

    #[test]
    #[serial]
    fn test_file_and_environment_layers() {
        let file = write_config(
            r#"
            database_url = "sqlite::memory:"

            [server]
            host = "0.0.0.0"
            port = 8081

            [[accounts]]
            name = "work"
            host = "imap.example.com"
            username = "alice@example.com"
            password = "secret"

            [accounts.smtp]
            host = "smtp.example.com"
            port = 587
            username = "alice@example.com"
            "#,
        );

        env::set_var("MAILBRIDGE_SERVER__PORT", "9090");
        let settings = Settings::new(file.path().to_str());
        env::remove_var("MAILBRIDGE_SERVER__PORT");
        let settings = settings.unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.database_url, "sqlite::memory:");

        let work = settings.account("work").unwrap();
        assert_eq!(work.port, 993);
        assert_eq!(work.months_to_sync, 6);
        assert_eq!(work.credentials().to_string(), "alice@example.com@imap.example.com:993");
        let smtp = work.smtp.as_ref().unwrap();
        assert!(smtp.starttls);
        assert!(smtp.password.is_empty());
    }

    #[test]
    #[serial]
    fn test_rejects_zero_page_size() {
        let file = write_config("[sync]\nmax_per_folder = 0\n");
        assert!(matches!(
            Settings::new(file.path().to_str()),
            Err(SettingsError::Invalid(_))
        ));
    }
}
