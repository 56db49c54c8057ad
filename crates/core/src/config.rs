use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub hubspot: HubSpotConfig,
    pub email: EmailConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct HubSpotConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: SecretString,
    pub notification_recipient: Option<String>,
}

impl EmailConfig {
    /// Outcome mails go to the configured recipient, defaulting to the sender.
    pub fn recipient(&self) -> &str {
        self.notification_recipient.as_deref().unwrap_or(&self.sender_email)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub hubspot_api_key: Option<String>,
    pub hubspot_base_url: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub sender_email: Option<String>,
    pub sender_password: Option<String>,
    pub notification_recipient: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("missing `{field}` in `{section}` section")]
    MissingField { section: &'static str, field: &'static str },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: String::new().into(),
                model: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                timeout_secs: 30,
            },
            hubspot: HubSpotConfig { api_key: String::new().into(), base_url: String::new() },
            email: EmailConfig {
                smtp_server: String::new(),
                smtp_port: 587,
                sender_email: String::new(),
                sender_password: String::new().into(),
                notification_recipient: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    /// Layered load: defaults, then the JSON config file, then `HUBCAP_*`
    /// environment variables, then programmatic overrides, then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("config.json"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(openai) = patch.openai {
            if let Some(openai_api_key_value) = openai.api_key {
                self.openai.api_key = secret_value(openai_api_key_value);
            }
            if let Some(model) = openai.model {
                self.openai.model = model;
            }
            if let Some(base_url) = openai.base_url {
                self.openai.base_url = base_url;
            }
            if let Some(timeout_secs) = openai.timeout_secs {
                self.openai.timeout_secs = timeout_secs;
            }
        }

        if let Some(hubspot) = patch.hubspot {
            if let Some(hubspot_api_key_value) = hubspot.api_key {
                self.hubspot.api_key = secret_value(hubspot_api_key_value);
            }
            if let Some(base_url) = hubspot.base_url {
                self.hubspot.base_url = base_url;
            }
        }

        if let Some(email) = patch.email {
            if let Some(smtp_server) = email.smtp_server {
                self.email.smtp_server = smtp_server;
            }
            if let Some(smtp_port) = email.smtp_port {
                self.email.smtp_port = smtp_port;
            }
            if let Some(sender_email) = email.sender_email {
                self.email.sender_email = sender_email;
            }
            if let Some(sender_password_value) = email.sender_password {
                self.email.sender_password = secret_value(sender_password_value);
            }
            if let Some(recipient) = email.notification_recipient {
                self.email.notification_recipient = Some(recipient);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HUBCAP_OPENAI_API_KEY") {
            self.openai.api_key = secret_value(value);
        }
        if let Some(value) = read_env("HUBCAP_OPENAI_MODEL") {
            self.openai.model = value;
        }
        if let Some(value) = read_env("HUBCAP_OPENAI_BASE_URL") {
            self.openai.base_url = value;
        }
        if let Some(value) = read_env("HUBCAP_OPENAI_TIMEOUT_SECS") {
            self.openai.timeout_secs = parse_u64("HUBCAP_OPENAI_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HUBCAP_HUBSPOT_API_KEY") {
            self.hubspot.api_key = secret_value(value);
        }
        if let Some(value) = read_env("HUBCAP_HUBSPOT_BASE_URL") {
            self.hubspot.base_url = value;
        }

        if let Some(value) = read_env("HUBCAP_EMAIL_SMTP_SERVER") {
            self.email.smtp_server = value;
        }
        if let Some(value) = read_env("HUBCAP_EMAIL_SMTP_PORT") {
            self.email.smtp_port = parse_u16("HUBCAP_EMAIL_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("HUBCAP_EMAIL_SENDER") {
            self.email.sender_email = value;
        }
        if let Some(value) = read_env("HUBCAP_EMAIL_PASSWORD") {
            self.email.sender_password = secret_value(value);
        }
        if let Some(value) = read_env("HUBCAP_EMAIL_RECIPIENT") {
            self.email.notification_recipient = Some(value);
        }

        if let Some(value) = read_env("HUBCAP_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("HUBCAP_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(openai_api_key) = overrides.openai_api_key {
            self.openai.api_key = secret_value(openai_api_key);
        }
        if let Some(openai_model) = overrides.openai_model {
            self.openai.model = openai_model;
        }
        if let Some(openai_base_url) = overrides.openai_base_url {
            self.openai.base_url = openai_base_url;
        }
        if let Some(hubspot_api_key) = overrides.hubspot_api_key {
            self.hubspot.api_key = secret_value(hubspot_api_key);
        }
        if let Some(hubspot_base_url) = overrides.hubspot_base_url {
            self.hubspot.base_url = hubspot_base_url;
        }
        if let Some(smtp_server) = overrides.smtp_server {
            self.email.smtp_server = smtp_server;
        }
        if let Some(smtp_port) = overrides.smtp_port {
            self.email.smtp_port = smtp_port;
        }
        if let Some(sender_email) = overrides.sender_email {
            self.email.sender_email = sender_email;
        }
        if let Some(sender_password) = overrides.sender_password {
            self.email.sender_password = secret_value(sender_password);
        }
        if let Some(recipient) = overrides.notification_recipient {
            self.email.notification_recipient = Some(recipient);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_openai(&self.openai)?;
        validate_hubspot(&self.hubspot)?;
        validate_email(&self.email)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("config.json"), PathBuf::from("hubcap.json")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    serde_json::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_openai(openai: &OpenAiConfig) -> Result<(), ConfigError> {
    if openai.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::MissingField { section: "openai", field: "api_key" });
    }
    if openai.model.trim().is_empty() {
        return Err(ConfigError::MissingField { section: "openai", field: "model" });
    }
    if !openai.base_url.starts_with("http://") && !openai.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "openai.base_url must start with http:// or https://".to_string(),
        ));
    }
    if openai.timeout_secs == 0 || openai.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "openai.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_hubspot(hubspot: &HubSpotConfig) -> Result<(), ConfigError> {
    if hubspot.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::MissingField { section: "hubspot", field: "api_key" });
    }
    if hubspot.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField { section: "hubspot", field: "base_url" });
    }
    if !hubspot.base_url.starts_with("http://") && !hubspot.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "hubspot.base_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if email.smtp_server.trim().is_empty() {
        return Err(ConfigError::MissingField { section: "email", field: "smtp_server" });
    }
    if email.smtp_port == 0 {
        return Err(ConfigError::Validation(
            "email.smtp_port must be greater than zero".to_string(),
        ));
    }
    if email.sender_email.trim().is_empty() {
        return Err(ConfigError::MissingField { section: "email", field: "sender_email" });
    }
    if !email.sender_email.contains('@') {
        return Err(ConfigError::Validation(
            "email.sender_email must be a mail address".to_string(),
        ));
    }
    if email.sender_password.expose_secret().trim().is_empty() {
        return Err(ConfigError::MissingField { section: "email", field: "sender_password" });
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    openai: Option<OpenAiPatch>,
    hubspot: Option<HubSpotPatch>,
    email: Option<EmailPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiPatch {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HubSpotPatch {
    api_key: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
    sender_email: Option<String>,
    sender_password: Option<String>,
    notification_recipient: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn full_config_json() -> &'static str {
        r#"{
            "openai": { "api_key": "sk-test", "model": "gpt-4o-mini" },
            "hubspot": { "api_key": "pat-na1-test", "base_url": "https://api.hubapi.com" },
            "email": {
                "smtp_server": "smtp.gmail.com",
                "smtp_port": 587,
                "sender_email": "crm-bot@example.com",
                "sender_password": "app-password"
            }
        }"#
    }

    fn write_config(dir: &TempDir, contents: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).map_err(|err: io::Error| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn loads_complete_config_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(&dir, full_config_json())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        if config.openai.model != "gpt-4o-mini" {
            return Err("model should come from file".to_string());
        }
        if config.hubspot.base_url != "https://api.hubapi.com" {
            return Err("hubspot base_url should come from file".to_string());
        }
        if config.email.recipient() != "crm-bot@example.com" {
            return Err("recipient should default to sender".to_string());
        }
        if config.openai.timeout_secs != 30 {
            return Err("timeout should default to 30".to_string());
        }
        Ok(())
    }

    #[test]
    fn missing_required_field_names_section_and_field() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"{
                "openai": { "model": "gpt-4o-mini" },
                "hubspot": { "api_key": "pat", "base_url": "https://api.hubapi.com" },
                "email": {
                    "smtp_server": "smtp.test",
                    "smtp_port": 587,
                    "sender_email": "a@b.c",
                    "sender_password": "pw"
                }
            }"#,
        )?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };

        match error {
            ConfigError::MissingField { section: "openai", field: "api_key" } => Ok(()),
            other => Err(format!("unexpected error: {other}")),
        }
    }

    #[test]
    fn missing_required_file_is_fatal() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let absent = dir.path().join("absent.json");

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(absent.clone()),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected missing-file failure".to_string()),
            Err(error) => error,
        };

        match error {
            ConfigError::MissingConfigFile(path) if path == absent => Ok(()),
            other => Err(format!("unexpected error: {other}")),
        }
    }

    #[test]
    fn env_overrides_win_over_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HUBCAP_OPENAI_MODEL", "gpt-from-env");
        env::set_var("HUBCAP_EMAIL_RECIPIENT", "ops@example.com");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(&dir, full_config_json())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            if config.openai.model != "gpt-from-env" {
                return Err("env model should win over file".to_string());
            }
            if config.email.recipient() != "ops@example.com" {
                return Err("env recipient should win".to_string());
            }
            Ok(())
        })();

        clear_vars(&["HUBCAP_OPENAI_MODEL", "HUBCAP_EMAIL_RECIPIENT"]);
        result
    }

    #[test]
    fn invalid_port_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HUBCAP_EMAIL_SMTP_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(&dir, full_config_json())?;

            let error = match AppConfig::load(LoadOptions {
                config_path: Some(path),
                ..LoadOptions::default()
            }) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };

            match error {
                ConfigError::InvalidEnvOverride { key, .. }
                    if key == "HUBCAP_EMAIL_SMTP_PORT" =>
                {
                    Ok(())
                }
                other => Err(format!("unexpected error: {other}")),
            }
        })();

        clear_vars(&["HUBCAP_EMAIL_SMTP_PORT"]);
        result
    }

    #[test]
    fn programmatic_overrides_win_and_secrets_do_not_leak() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                openai_api_key: Some("sk-secret-value".to_string()),
                openai_model: Some("gpt-4o-mini".to_string()),
                hubspot_api_key: Some("pat-secret-value".to_string()),
                hubspot_base_url: Some("https://api.hubapi.com".to_string()),
                smtp_server: Some("smtp.test".to_string()),
                sender_email: Some("bot@example.com".to_string()),
                sender_password: Some("mail-secret-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        if config.openai.api_key.expose_secret() != "sk-secret-value" {
            return Err("override api key should be applied".to_string());
        }

        let debug = format!("{config:?}");
        for secret in ["sk-secret-value", "pat-secret-value", "mail-secret-value"] {
            if debug.contains(secret) {
                return Err(format!("debug output leaked `{secret}`"));
            }
        }
        if !matches!(config.logging.format, LogFormat::Compact) {
            return Err("default log format should be compact".to_string());
        }
        Ok(())
    }
}
