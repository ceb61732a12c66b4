use serde::{Deserialize, Serialize};

/// Top-level application configuration, loaded from a TOML file with
/// environment overrides for secrets. Every section has usable defaults so
/// a missing file still yields a runnable (if degraded) service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub watcher: WatcherConfig,
    pub smtp: Option<SmtpConfig>,
    /// Path to the persona descriptor JSON. Absence degrades to the
    /// built-in fallback persona.
    pub persona_path: Option<String>,
    /// IANA timezone used for user-facing timestamps.
    pub display_timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "ember.db3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    /// Candidate API keys; blanks are filtered before rotation. Usually
    /// populated from the environment rather than the config file.
    pub api_keys: Vec<String>,
    /// Per-request timeout for model invocations.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_keys: Vec::new(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Seconds between inactivity checks.
    pub check_interval_secs: u64,
    /// Hours of silence before a check-in notification is considered.
    pub idle_threshold_hours: i64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            idle_threshold_hours: 24,
        }
    }
}

/// Outbound mail settings. The notifier is only constructed when this
/// section is present and complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Recipient of inactivity check-ins.
    pub recipient: String,
}
