mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use defaults::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ListenEndpoint, Secret};

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct AuthHttpConfig {
    #[serde(default = "_default_auth_listen")]
    #[schemars(with = "String")]
    pub listen: ListenEndpoint,

    #[serde(default)]
    pub external_port: Option<u16>,

    /// Trust X-Forwarded-For when resolving the client address. Only enable
    /// behind a reverse proxy that strips the header from client requests.
    #[serde(default = "_default_false")]
    pub trust_x_forwarded_headers: bool,
}

impl Default for AuthHttpConfig {
    fn default() -> Self {
        Self {
            listen: _default_auth_listen(),
            external_port: None,
            trust_x_forwarded_headers: false,
        }
    }
}

impl AuthHttpConfig {
    pub fn external_port(&self) -> u16 {
        self.external_port.unwrap_or(self.listen.port())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct AdminConfig {
    #[serde(default = "_default_true")]
    pub enable: bool,

    #[serde(default = "_default_admin_listen")]
    #[schemars(with = "String")]
    pub listen: ListenEndpoint,

    /// Token required in the X-Lockgate-Token header for every admin call.
    /// When unset the admin API is open; bind it to localhost in that case.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub token: Option<Secret<String>>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enable: true,
            listen: _default_admin_listen(),
            token: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct ProtectionConfig {
    #[serde(default = "_default_true")]
    pub enabled: bool,

    /// Consecutive failures within the window that trigger an automatic block.
    #[serde(default = "_default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "_default_failure_window", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub failure_window: Duration,

    /// Lifetime of automatically created blocks.
    #[serde(default = "_default_block_duration", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub block_duration: Duration,

    /// Counters at or above this count show up in the penalized-identities
    /// listing before the block threshold is reached.
    #[serde(default = "_default_report_threshold")]
    pub report_threshold: u32,

    #[serde(default = "_default_increment_retries")]
    pub increment_retries: u32,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: _default_failure_threshold(),
            failure_window: _default_failure_window(),
            block_duration: _default_block_duration(),
            report_threshold: _default_report_threshold(),
            increment_retries: _default_increment_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct StaticUserConfig {
    pub identity: String,
    /// Argon2 password hash.
    #[schemars(with = "String")]
    pub password_hash: Secret<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum CredentialStoreConfig {
    /// Out-of-process identity store reached over HTTP.
    #[serde(rename = "http")]
    Http {
        url: String,
        #[serde(default = "_default_credential_store_timeout", with = "humantime_serde")]
        #[schemars(with = "String")]
        timeout: Duration,
    },
    /// Identities defined directly in the config file.
    #[serde(rename = "static")]
    Static { users: Vec<StaticUserConfig> },
}

impl Default for CredentialStoreConfig {
    fn default() -> Self {
        Self::Static { users: vec![] }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct LogConfig {
    /// How long login log entries are kept before the cleanup sweep prunes
    /// them. Audit entries are never pruned.
    #[serde(default = "_default_login_log_retention", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub retention: Duration,

    /// How long deactivated block records are kept for history before being
    /// physically deleted.
    #[serde(default = "_default_block_history_retention", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub block_history_retention: Duration,

    #[serde(default = "_default_cleanup_interval", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub cleanup_interval: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention: _default_login_log_retention(),
            block_history_retention: _default_block_history_retention(),
            cleanup_interval: _default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, JsonSchema)]
pub struct LockgateConfigStore {
    #[serde(default = "_default_database_url")]
    #[schemars(with = "String")]
    pub database_url: Secret<String>,

    #[serde(default)]
    pub http: AuthHttpConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub protection: ProtectionConfig,

    #[serde(default)]
    pub credential_store: CredentialStoreConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for LockgateConfigStore {
    fn default() -> Self {
        Self {
            database_url: _default_database_url(),
            http: <_>::default(),
            admin: <_>::default(),
            protection: <_>::default(),
            credential_store: <_>::default(),
            log: <_>::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockgateConfig {
    pub store: LockgateConfigStore,
    pub paths_relative_to: PathBuf,
}

impl LockgateConfig {
    pub fn validate(&self) {
        use tracing::warn;
        if self.store.protection.failure_threshold == 0 {
            warn!("`protection.failure_threshold` is 0 - every failed login will block its address");
        }
        if self.store.admin.enable
            && self.store.admin.token.is_none()
            && !self.store.admin.listen.ip().is_loopback()
        {
            warn!("The admin API has no token configured and is not bound to localhost");
        }
    }
}
