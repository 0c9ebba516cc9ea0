//! # Runtime Configuration
//!
//! Configuration management for the audit runtime.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     RECOUNT_BRANCH=12                                                  │
//! │     RECOUNT_ROLE=master                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/recount/recount.toml (Linux)                             │
//! │     ~/Library/Application Support/com.recount.recount/recount.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Operator role, 30 s refresh, strict midnight expiry                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # recount.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! operator_name = "Ana"
//! role = "master"  # master | operator
//!
//! [store]
//! company = "Drogaria Exemplo"
//! branch = "12"
//!
//! [audit]
//! refresh_interval_secs = 30
//! expiry_grace_minutes = 0
//! run_expiry_on_load = true
//!
//! [database]
//! path = "/var/lib/recount/recount.db"
//! ```
//!
//! ## Environment Variables
//! | Variable                        | Field                          |
//! |---------------------------------|--------------------------------|
//! | `RECOUNT_DEVICE_ID`             | `device.id`                    |
//! | `RECOUNT_OPERATOR`              | `device.operator_name`         |
//! | `RECOUNT_ROLE`                  | `device.role`                  |
//! | `RECOUNT_COMPANY`               | `store.company`                |
//! | `RECOUNT_BRANCH`                | `store.branch`                 |
//! | `RECOUNT_REFRESH_SECS`          | `audit.refresh_interval_secs`  |
//! | `RECOUNT_EXPIRY_GRACE_MINUTES`  | `audit.expiry_grace_minutes`   |
//! | `RECOUNT_DB_PATH`               | `database.path`                |

use std::path::PathBuf;
use std::time::Duration;

use recount_core::validation::validate_branch;
use recount_core::{Actor, ExpiryPolicy, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Who is operating this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Name shown in logs and on certificate drafts.
    #[serde(default)]
    pub operator_name: String,

    /// Master may finalize, reopen and reset; operators only start and pause.
    #[serde(default)]
    pub role: Role,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            operator_name: String::new(),
            role: Role::default(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// The branch being audited. An empty branch means "not configured yet".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub company: String,

    #[serde(default)]
    pub branch: String,
}

// =============================================================================
// Audit Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Interval between remote revision checks (seconds).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Partial starts younger than this survive midnight. 0 = strict.
    #[serde(default)]
    pub expiry_grace_minutes: u32,

    /// Expire stale partial starts right after a session is loaded.
    #[serde(default = "default_true")]
    pub run_expiry_on_load: bool,
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for AuditSettings {
    fn default() -> Self {
        AuditSettings {
            refresh_interval_secs: default_refresh_interval(),
            expiry_grace_minutes: 0,
            run_expiry_on_load: true,
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `recount.db` in the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecountConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl RecountConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (recount.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if !self.store.branch.is_empty() {
            validate_branch(&self.store.branch)?;
        }

        if self.audit.refresh_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `RECOUNT_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("RECOUNT_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = var("RECOUNT_OPERATOR") {
            self.device.operator_name = name;
        }

        if let Some(role) = var("RECOUNT_ROLE") {
            match role.parse() {
                Ok(parsed) => {
                    debug!(role = %role, "Overriding role from environment");
                    self.device.role = parsed;
                }
                Err(_) => warn!(role = %role, "Unknown role in environment"),
            }
        }

        if let Some(company) = var("RECOUNT_COMPANY") {
            self.store.company = company;
        }

        if let Some(branch) = var("RECOUNT_BRANCH") {
            debug!(branch = %branch, "Overriding branch from environment");
            self.store.branch = branch.trim().to_string();
        }

        if let Some(secs) = var("RECOUNT_REFRESH_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.audit.refresh_interval_secs = s;
            }
        }

        if let Some(minutes) = var("RECOUNT_EXPIRY_GRACE_MINUTES") {
            if let Ok(m) = minutes.parse::<u32>() {
                self.audit.expiry_grace_minutes = m;
            }
        }

        if let Some(path) = var("RECOUNT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "recount", "recount")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("recount.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn branch(&self) -> &str {
        &self.store.branch
    }

    /// The actor every master-only transition is checked against.
    pub fn actor(&self) -> Actor {
        Actor {
            name: self.device.operator_name.clone(),
            role: self.device.role,
        }
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::with_grace_minutes(self.audit.expiry_grace_minutes)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.audit.refresh_interval_secs)
    }

    /// Configured database file, or `recount.db` in the platform data dir.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("recount.db"))
            .ok_or_else(|| SyncError::InvalidConfig("No database path available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RecountConfig::default();
        assert!(!config.device.id.is_empty()); // Auto-generated
        assert_eq!(config.device.role, Role::Operator);
        assert_eq!(config.audit.refresh_interval_secs, 30);
        assert!(config.audit.run_expiry_on_load);
        assert_eq!(config.expiry_policy(), ExpiryPolicy::strict());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RecountConfig::default();
        assert!(config.validate().is_ok());

        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));

        config.device.id = "test".to_string();
        config.store.branch = "12a".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.store.branch = "12".to_string();
        assert!(config.validate().is_ok());

        config.audit.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RecountConfig = toml::from_str(
            r#"
            [device]
            id = "dev-1"
            role = "master"

            [store]
            branch = "12"
            "#,
        )
        .unwrap();

        assert!(config.actor().is_master());
        assert_eq!(config.branch(), "12");
        assert_eq!(config.audit.refresh_interval_secs, 30);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RECOUNT_ROLE", "MASTER"),
            ("RECOUNT_BRANCH", " 7 "),
            ("RECOUNT_REFRESH_SECS", "5"),
            ("RECOUNT_EXPIRY_GRACE_MINUTES", "90"),
            ("RECOUNT_DB_PATH", "/tmp/audit.db"),
        ]
        .into_iter()
        .collect();

        let mut config = RecountConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.device.role, Role::Master);
        assert_eq!(config.branch(), "7");
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.expiry_policy(), ExpiryPolicy::with_grace_minutes(90));
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/audit.db"));
    }

    #[test]
    fn test_unknown_role_is_ignored() {
        let mut config = RecountConfig::default();
        config.apply_overrides(|key| (key == "RECOUNT_ROLE").then(|| "admin".to_string()));
        assert_eq!(config.device.role, Role::Operator);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RecountConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[audit]"));
        assert!(toml_str.contains("role = \"operator\""));
    }
}
