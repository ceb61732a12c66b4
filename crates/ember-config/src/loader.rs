use std::path::Path;

use tracing::{info, warn};

use ember_common::{Error, Result};

use crate::model::{AppConfig, SmtpConfig};

/// Highest numbered `GEMINI_KEY_<n>` environment slot scanned at startup.
const MAX_ENV_KEY_SLOTS: usize = 8;

/// Load the application config from a TOML file, then fold in environment
/// overrides for secrets. A missing file degrades to defaults; a present
/// but unparsable file is a hard startup error (a typo in config should
/// not silently run with defaults).
pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config at {}: {e}", path.display())))?,
        Err(e) => {
            warn!("config file {} unreadable: {e}; using defaults", path.display());
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config);

    info!(
        keys = config.provider.api_keys.len(),
        smtp = config.smtp.is_some(),
        "configuration loaded"
    );
    Ok(config)
}

/// Secrets come from the environment when present: numbered `GEMINI_KEY_<n>`
/// slots for provider credentials, and `EMAIL_USER`/`EMAIL_PASS`/`USER_EMAIL`
/// for the mail sink.
fn apply_env_overrides(config: &mut AppConfig) {
    for n in 1..=MAX_ENV_KEY_SLOTS {
        if let Ok(key) = std::env::var(format!("GEMINI_KEY_{n}")) {
            config.provider.api_keys.push(key);
        }
    }

    let user = std::env::var("EMAIL_USER").ok();
    let pass = std::env::var("EMAIL_PASS").ok();
    let recipient = std::env::var("USER_EMAIL").ok();
    if let (Some(username), Some(password), Some(recipient)) = (user, pass, recipient) {
        let host = config
            .smtp
            .as_ref()
            .map(|s| s.host.clone())
            .unwrap_or_else(|| "smtp.gmail.com".to_string());
        config.smtp = Some(SmtpConfig {
            host,
            username,
            password,
            recipient,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_degrades_to_defaults() {
        let config = load_app_config(Path::new("/nonexistent/ember.toml"))
            .expect("missing config should not error");
        assert_eq!(config.gateway.port, 7860);
    }

    #[test]
    fn malformed_file_is_a_hard_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"gateway = not toml [").expect("write");
        let err = load_app_config(file.path()).expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn toml_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(
            br#"
            display_timezone = "Asia/Kolkata"

            [provider]
            model = "gemini-1.5-pro"
            "#,
        )
        .expect("write");

        let config = load_app_config(file.path()).expect("should load");
        assert_eq!(config.provider.model, "gemini-1.5-pro");
        assert_eq!(config.display_timezone.as_deref(), Some("Asia/Kolkata"));
    }
}
