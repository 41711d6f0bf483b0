//! Environment configuration.
//!
//! Every setting has a documented default except the three credentials,
//! whose absence is a fatal startup error.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::Secret;

use crate::error::ConfigError;
use crate::queue::{BrokerSettings, ConnectRetry};

pub const DEFAULT_QUEUE: &str = "drive_tasks";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TELEGRAM_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Variable lookup; `std::env::var` in production, a map in tests.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<Secret<String>, ConfigError> {
        self.get(name)
            .map(Secret::new)
            .ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
        }
    }

    fn secs(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse(name, default).map(Duration::from_secs)
    }

    fn broker(&self) -> Result<BrokerSettings, ConfigError> {
        Ok(BrokerSettings {
            host: self.string("RABBITMQ_HOST", "rabbitmq"),
            port: self.parse("RABBITMQ_PORT", 5672)?,
            user: self.string("RABBITMQ_USER", "guest"),
            password: Secret::new(self.string("RABBITMQ_PASS", "guest")),
            vhost: self.string("RABBITMQ_VHOST", "/"),
            queue: self.string("QUEUE_NAME", DEFAULT_QUEUE),
        })
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker: BrokerSettings,
    pub retry: ConnectRetry,

    pub gemini_api_key: Secret<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Replaces the built-in file-type hint table.
    pub type_hints_file: Option<PathBuf>,

    pub telegram_bot_token: Secret<String>,
    pub telegram_api_base: String,

    pub drive_access_token: Secret<String>,
    pub drive_api_base: String,
    pub drive_folder_id: Option<String>,
    pub search_page_size: usize,

    pub http_timeout: Duration,
    pub notify_timeout: Duration,
    pub stage_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let attempts = env.parse("CONNECT_ATTEMPTS", 10u32)?;
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "CONNECT_ATTEMPTS",
                value: "0".into(),
            });
        }
        let page_size = env.parse("SEARCH_PAGE_SIZE", 10usize)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "SEARCH_PAGE_SIZE",
                value: "0".into(),
            });
        }

        Ok(Self {
            broker: env.broker()?,
            retry: ConnectRetry::fixed(attempts, env.secs("CONNECT_DELAY_SECS", 5)?)
                .with_attempt_timeout(env.secs("CONNECT_TIMEOUT_SECS", 10)?),
            gemini_api_key: env.required("GEMINI_API_KEY")?,
            gemini_model: env.string("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            gemini_base_url: env.string("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE),
            type_hints_file: env.get("TYPE_HINTS_FILE").map(PathBuf::from),
            telegram_bot_token: env.required("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base: env.string("TELEGRAM_API_BASE", DEFAULT_TELEGRAM_BASE),
            drive_access_token: env.required("DRIVE_ACCESS_TOKEN")?,
            drive_api_base: env.string("DRIVE_API_BASE", DEFAULT_DRIVE_BASE),
            drive_folder_id: env.get("DRIVE_FOLDER_ID"),
            search_page_size: page_size,
            http_timeout: env.secs("HTTP_TIMEOUT_SECS", 30)?,
            notify_timeout: env.secs("NOTIFY_TIMEOUT_SECS", 10)?,
            stage_timeout: env.secs("STAGE_TIMEOUT_SECS", 60)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub broker: BrokerSettings,
    pub telegram_bot_token: Secret<String>,
    pub bind: SocketAddr,
    pub connect_timeout: Duration,
    /// Envelopes allowed to wait for the publisher before new ones are dropped.
    pub publish_backlog: usize,
}

impl IngressConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };
        Ok(Self {
            broker: env.broker()?,
            telegram_bot_token: env.required("TELEGRAM_BOT_TOKEN")?,
            bind: env.parse("INGRESS_BIND", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            connect_timeout: env.secs("CONNECT_TIMEOUT_SECS", 10)?,
            publish_backlog: env.parse("PUBLISH_BACKLOG", 100usize)?,
        })
    }
}
