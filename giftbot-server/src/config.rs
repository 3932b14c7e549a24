//! YAML configuration, environment overrides and startup validation.

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::info;

use giftbot_core::captcha::OcrProviderConfig;
use giftbot_core::giftcode::GameApiConfig;
use giftbot_core::notification::WxPusherConfig;
use giftbot_core::services::{ResponseSentinels, DEFAULT_BATCH_CONCURRENCY};
use giftbot_core::tasks::DEFAULT_FALLBACK_PLAYER_IDS;
use giftbot_core::Error;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: &[&str] = &["json", "text"];
const MIN_TOKEN_SECRET_LEN: usize = 32;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Upper bound for session and token lifetimes (30 days).
const MAX_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub captcha: CaptchaConfig,
    pub game: GameConfig,
    pub job: JobConfig,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 10999 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "./giftcode.db".to_string(), max_connections: 25 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub providers: Vec<OcrProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub api_base: String,
    pub sign_secret: String,
    pub session_ttl_secs: i64,
    pub request_timeout_secs: u64,
    pub fallback_player_ids: Vec<String>,
    pub sentinels: ResponseSentinels,
}

impl Default for GameConfig {
    fn default() -> Self {
        let api = GameApiConfig::default();
        Self {
            api_base: api.api_base,
            sign_secret: api.sign_secret,
            session_ttl_secs: 600,
            request_timeout_secs: api.request_timeout_secs,
            fallback_player_ids: DEFAULT_FALLBACK_PLAYER_IDS.iter().map(|s| s.to_string()).collect(),
            sentinels: ResponseSentinels::default(),
        }
    }
}

impl GameConfig {
    pub fn api_config(&self) -> GameApiConfig {
        GameApiConfig {
            api_base: self.api_base.clone(),
            sign_secret: self.sign_secret.clone(),
            request_timeout_secs: self.request_timeout_secs,
            ..GameApiConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub delay_secs: u64,
    pub period_secs: u64,
    pub worker_pool_size: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { delay_secs: 2, period_secs: 30, worker_pool_size: DEFAULT_BATCH_CONCURRENCY }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "json".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    /// bcrypt hash. The admin API is only mounted when this is set.
    pub password_hash: String,
    pub token_secret: String,
    pub token_duration_secs: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password_hash: String::new(),
            token_secret: String::new(),
            token_duration_secs: 86400,
        }
    }
}

impl AdminConfig {
    pub fn is_enabled(&self) -> bool {
        !self.password_hash.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub wxpusher: WxPusherConfig,
}

impl Config {
    /// Read `path` (defaults when the file does not exist), apply the process
    /// environment on top and validate.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            Self::from_yaml(&raw)?
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Error> {
        serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid config file: {}", e)))
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = get("SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.database.path = v;
        }

        if let (Some(key), Some(secret)) = (get("ACCESS_KEY"), get("ACCESS_SECRET")) {
            self.captcha.providers.push(OcrProviderConfig {
                kind: "ali".to_string(),
                access_key: key,
                secret_key: secret,
                ..Default::default()
            });
        }
        if let (Some(id), Some(key)) = (get("TENCENT_SECRET_ID"), get("TENCENT_SECRET_KEY")) {
            self.captcha.providers.push(OcrProviderConfig {
                kind: "tencent".to_string(),
                access_key: id,
                secret_key: key,
                ..Default::default()
            });
        }
        if let Some(json) = get("GOOGLE_CREDENTIALS_JSON") {
            self.captcha.providers.push(OcrProviderConfig {
                kind: "google".to_string(),
                credentials_json: json,
                ..Default::default()
            });
        }

        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.logging.format = v.to_ascii_lowercase();
        }

        if let Some(v) = get("ADMIN_USERNAME") {
            self.admin.username = v;
        }
        if let Some(v) = get("ADMIN_PASSWORD_HASH") {
            self.admin.password_hash = v;
        }
        if let Some(v) = get("ADMIN_TOKEN_SECRET") {
            self.admin.token_secret = v;
        }
        if let Some(secs) = get("ADMIN_TOKEN_DURATION_SECS").and_then(|v| v.parse().ok()) {
            self.admin.token_duration_secs = secs;
        }

        if let Some(v) = get("WXPUSHER_APP_TOKEN") {
            self.notification.wxpusher.app_token = v;
        }
        if let Some(v) = get("WXPUSHER_UID") {
            self.notification.wxpusher.uid = v;
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".into()));
        }
        if self.job.period_secs == 0 {
            return Err(Error::Config("job.period_secs must be greater than zero".into()));
        }
        if self.job.worker_pool_size == 0 {
            return Err(Error::Config("job.worker_pool_size must be greater than zero".into()));
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "logging.level '{}' must be one of {:?}",
                self.logging.level, VALID_LOG_LEVELS
            )));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(Error::Config(format!(
                "logging.format '{}' must be one of {:?}",
                self.logging.format, VALID_LOG_FORMATS
            )));
        }
        if self.game.api_base.trim().is_empty() || self.game.sign_secret.is_empty() {
            return Err(Error::Config("game.api_base and game.sign_secret are required".into()));
        }
        if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&self.game.request_timeout_secs) {
            return Err(Error::Config(format!(
                "game.request_timeout_secs must be between 1 and {}",
                MAX_REQUEST_TIMEOUT_SECS
            )));
        }
        if !(1..=MAX_LIFETIME_SECS).contains(&self.game.session_ttl_secs) {
            return Err(Error::Config(format!(
                "game.session_ttl_secs must be between 1 and {}",
                MAX_LIFETIME_SECS
            )));
        }
        if !(1..=MAX_LIFETIME_SECS).contains(&self.admin.token_duration_secs) {
            return Err(Error::Config(format!(
                "admin.token_duration_secs must be between 1 and {}",
                MAX_LIFETIME_SECS
            )));
        }
        if self.captcha.providers.is_empty() {
            return Err(Error::Config("at least one captcha provider must be configured".into()));
        }
        if self.admin.username.trim().is_empty() {
            return Err(Error::Config("admin.username must not be empty".into()));
        }
        if self.admin.is_enabled() && self.admin.token_secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(Error::Config(format!(
                "admin.token_secret must be at least {} characters",
                MIN_TOKEN_SECRET_LEN
            )));
        }
        Ok(())
    }
}
